use std::future::Future;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;

pub use auth::{AccessToken, OAuth, TokenGrant};
pub use credentials::Credentials;
pub use response::CurrentlyPlaying;

use crate::error::{Error, Result};
use crate::logging::ResponseLogger;

pub mod auth;
mod credentials;
pub mod response;

pub use credentials::preview;

pub static ACCOUNTS_URL: &str = "https://accounts.spotify.com";
pub static API_BASE_URL: &str = "https://api.spotify.com/v1";

/// The music service side of the synchronizer
pub trait MusicService {
    /// Exchange the long lived refresh token for a new access token
    fn refresh_access_token(&self, refresh_token: &str) -> impl Future<Output = Result<TokenGrant>>;

    /// What the user is listening to right now, `None` when nothing is playing.
    ///
    /// A rejected access token is reported as [`Error::InvalidToken`].
    fn currently_playing(&self, token: &AccessToken) -> impl Future<Output = Result<Option<CurrentlyPlaying>>>;
}

/// Spotify web api client for the few endpoints this app needs
#[derive(Debug, Clone)]
pub struct Spotify {
    client: reqwest::Client,
    credentials: Credentials,
    accounts_url: String,
    api_url: String,
}

impl Spotify {
    pub fn new(credentials: Credentials, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            credentials,
            accounts_url: ACCOUNTS_URL.to_string(),
            api_url: API_BASE_URL.to_string(),
        })
    }

    pub fn authorization_url(&self, oauth: &OAuth) -> Result<String> {
        oauth.authorization_url(&self.accounts_url, &self.credentials.client_id, true)
    }

    /// Exchange an authorization code for an access and refresh token
    pub async fn request_access_token(&self, auth_code: &str, redirect: &str) -> Result<TokenGrant> {
        let response = self
            .client
            .post(format!("{}/api/token", self.accounts_url))
            .header(AUTHORIZATION, format!("Basic {}", self.credentials))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", auth_code),
                ("redirect_uri", redirect),
            ])
            .send()
            .await?;

        TokenGrant::from_response(response).await
    }
}

impl MusicService for Spotify {
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenGrant> {
        let response = self
            .client
            .post(format!("{}/api/token", self.accounts_url))
            .header(AUTHORIZATION, format!("Basic {}", self.credentials))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.credentials.client_id.as_str()),
            ])
            .send()
            .await?;

        TokenGrant::from_response(response).await
    }

    async fn currently_playing(&self, token: &AccessToken) -> Result<Option<CurrentlyPlaying>> {
        let response = self
            .client
            .get(format!("{}/me/player/currently-playing", self.api_url))
            .header(AUTHORIZATION, token.to_header())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        parse_playback(status, &body)
    }
}

/// Map a currently playing response to the playback. No content, or an empty
/// body, means nothing is playing.
pub fn parse_playback(status: StatusCode, body: &str) -> Result<Option<CurrentlyPlaying>> {
    match status {
        StatusCode::NO_CONTENT => Ok(None),
        StatusCode::UNAUTHORIZED => Err(Error::InvalidToken),
        StatusCode::OK if body.trim().is_empty() => Ok(None),
        StatusCode::OK => {
            let jd = &mut serde_json::Deserializer::from_str(body);
            serde_path_to_error::deserialize(jd)
                .map(Some)
                .map_err(|e| Error::unexpected(status.as_u16(), e))
        }
        _ => {
            ResponseLogger::log_error("spotify", status, body);
            Err(Error::unexpected(
                status.as_u16(),
                "spotify returned an unexpected status for currently playing",
            ))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn no_content_is_nothing_playing() {
        assert_eq!(parse_playback(StatusCode::NO_CONTENT, "").unwrap(), None);
        assert_eq!(parse_playback(StatusCode::OK, "  \n").unwrap(), None);
    }

    #[test]
    fn unauthorized_is_invalid_token() {
        let err = parse_playback(StatusCode::UNAUTHORIZED, r#"{"error":{"status":401}}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidToken));
    }

    #[test]
    fn playing_body() {
        let playing = parse_playback(
            StatusCode::OK,
            r#"{"is_playing":true,"progress_ms":0,"item":{"name":"Song A","duration_ms":1000,"artists":[{"name":"Artist X"}]}}"#,
        )
        .unwrap()
        .unwrap();
        assert!(playing.playing);
        assert_eq!(playing.item.unwrap().name, "Song A");
    }

    #[test]
    fn malformed_body_is_unexpected() {
        let err = parse_playback(StatusCode::OK, r#"{"is_playing":"yes"}"#).unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse { code: 200, .. }));
    }

    #[test]
    fn other_status_is_unexpected() {
        for status in [StatusCode::TOO_MANY_REQUESTS, StatusCode::SERVICE_UNAVAILABLE] {
            let err = parse_playback(status, "slow down").unwrap_err();
            assert!(matches!(err, Error::UnexpectedResponse { code, .. } if code == status.as_u16()));
        }
    }
}

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Local};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::logging::ResponseLogger;

pub use callback::{capture_code, loopback_addr};

mod callback;

/// Scopes needed to read what the user is currently listening to
pub static SCOPES: [&str; 2] = ["user-read-currently-playing", "user-read-playback-state"];

/// Seconds before the real expiry where a token is already treated as expired
const EXPIRY_LEEWAY: i64 = 60;

/// OAuth2 authorization code request parameters
#[derive(Debug, Clone)]
pub struct OAuth {
    pub redirect: String,
    pub state: String,
    pub scopes: BTreeSet<String>,
}

impl OAuth {
    pub fn new<S: Into<String>>(redirect: S) -> Self {
        Self {
            redirect: redirect.into(),
            state: Uuid::new_v4().simple().to_string(),
            scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Url of the spotify login/consent page for this request
    pub fn authorization_url(&self, base: &str, client_id: &str, show_dialog: bool) -> Result<String> {
        Ok(format!(
            "{base}/authorize?{}",
            serde_urlencoded::to_string([
                ("client_id", client_id.to_string()),
                ("response_type", "code".to_string()),
                ("redirect_uri", self.redirect.clone()),
                ("scope", self.scopes.iter().cloned().collect::<Vec<_>>().join(" ")),
                ("state", self.state.clone()),
                ("show_dialog", show_dialog.to_string()),
            ])?
        ))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthCodeResponse {
    pub code: Option<String>,
    pub error: Option<String>,
    pub state: Option<String>,
}

impl AuthCodeResponse {
    /// Validate the redirect query and pull the authorization code out of it
    pub(crate) fn into_code(self, state: &str) -> Result<String> {
        if let Some(error) = self.error {
            return Err(Error::Input(format!("spotify denied the authorization: {error}")));
        }

        // Validate state for cross-site request forgery. A pasted url may have been
        // trimmed of it which is accepted since the user copied it by hand.
        if let Some(received) = &self.state {
            if received != state {
                return Err(Error::Input("the state parameter does not match this login attempt".into()));
            }
        }

        match self.code {
            Some(code) if !code.is_empty() => Ok(code),
            _ => Err(Error::Input("no 'code' parameter found in the url".into())),
        }
    }
}

/// Parse the full url spotify redirected the browser to and return the authorization code
pub fn parse_callback(url: &str, state: &str) -> Result<String> {
    let url = Url::parse(url.trim()).map_err(|e| Error::Input(format!("not a valid url: {e}")))?;
    let query = url
        .query()
        .ok_or_else(|| Error::Input("no 'code' parameter found in the url".into()))?;

    let response: AuthCodeResponse =
        serde_qs::from_str(query).map_err(|e| Error::Input(e.to_string()))?;
    response.into_code(state)
}

#[derive(Debug, Deserialize)]
struct AuthErrorBody {
    error: String,
    error_description: Option<String>,
}

fn default_token_type() -> String {
    String::from("Bearer")
}

fn default_expires_in() -> i64 {
    3600
}

/// Body of a successful token endpoint response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    /// Only present on the first exchange, or when spotify rotates it
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl TokenGrant {
    pub async fn from_response(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let body = response.text().await?;
        Self::parse(status, &body)
    }

    pub fn parse(status: StatusCode, body: &str) -> Result<Self> {
        if !status.is_success() {
            ResponseLogger::log_error("spotify accounts", status, body);
            return Err(match serde_json::from_str::<AuthErrorBody>(body) {
                Ok(err) => Error::Auth {
                    code: status.as_u16(),
                    error: err.error,
                    message: err.error_description.unwrap_or_default(),
                },
                Err(_) => Error::Auth {
                    code: status.as_u16(),
                    error: status.canonical_reason().unwrap_or("unknown").to_string(),
                    message: body.to_string(),
                },
            });
        }

        let jd = &mut serde_json::Deserializer::from_str(body);
        serde_path_to_error::deserialize(jd)
            .map_err(|e| Error::unexpected(status.as_u16(), format!("invalid token response: {e}")))
    }

    pub fn access_token(&self) -> AccessToken {
        AccessToken {
            token_type: self.token_type.clone(),
            access_token: self.access_token.clone(),
            expires: expires_at(Local::now(), self.expires_in),
        }
    }
}

/// Expiry for a token issued at `now`. Lifetimes that can't be represented get the default one hour.
fn expires_at(now: DateTime<Local>, expires_in: i64) -> DateTime<Local> {
    Duration::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .unwrap_or_else(|| now + Duration::seconds(default_expires_in()))
}

/// Short lived bearer token, only ever kept in memory
#[derive(Debug, Clone)]
pub struct AccessToken {
    token_type: String,
    access_token: String,
    expires: DateTime<Local>,
}

impl AccessToken {
    /// Check if the token is expired, with leeway so it doesn't expire mid request
    pub fn is_expired(&self) -> bool {
        self.expires
            .checked_sub_signed(Duration::seconds(EXPIRY_LEEWAY))
            .map_or(true, |expires| expires <= Local::now())
    }

    pub fn expires(&self) -> DateTime<Local> {
        self.expires
    }

    /// Get the auth header for the token
    ///
    /// # Example
    ///
    /// `Bearer 1POdFZRZbvb...qqillRxMr2z`
    pub fn to_header(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

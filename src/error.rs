use color_eyre::{Report, Section};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or invalid configuration. Only raised at startup.
    #[error("configuration error: {0}")]
    Config(String),
    /// The user supplied something that could not be used, e.g. a callback url without a code.
    #[error("invalid input: {0}")]
    Input(String),
    /// An OAuth token exchange was rejected by the accounts service.
    #[error("authorization failed [{code}] {error}: {message}")]
    Auth {
        code: u16,
        error: String,
        message: String,
    },
    /// The access token was rejected by the api even though it should be valid.
    #[error("access token was rejected")]
    InvalidToken,
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),
    #[error("request timed out")]
    Timeout,
    /// The remote api answered with a status or body that is not understood.
    #[error("unexpected response [{code}]: {message}")]
    UnexpectedResponse { code: u16, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    UrlEncode(#[from] serde_urlencoded::ser::Error),
}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(value)
        }
    }
}

impl Error {
    pub fn unexpected<S: ToString>(code: u16, message: S) -> Self {
        Error::UnexpectedResponse {
            code,
            message: message.to_string(),
        }
    }

    /// Whether the error means the stored refresh token can no longer be used.
    pub fn is_revoked_grant(&self) -> bool {
        matches!(self, Error::Auth { error, .. } if error == "invalid_grant")
    }

    /// Convert into a report with a hint on how to fix the problem, used at the
    /// binary boundary where errors are shown to the user.
    pub fn into_report(self) -> Report {
        let suggestion = match &self {
            Error::Config(_) => Some(
                "Add the missing keys to your .env file or export them in the environment",
            ),
            Error::Auth { error, .. } => match error.as_str() {
                "invalid_grant" => Some(
                    "The authorization code or refresh token expired or was already used, run `tunestatus auth` again and paste the url quickly",
                ),
                "invalid_client" => Some(
                    "Your client id or client secret is incorrect, check SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET",
                ),
                "redirect_uri_mismatch" => Some(
                    "Add the redirect uri to the Redirect URIs of your app at https://developer.spotify.com/dashboard",
                ),
                _ => None,
            },
            Error::Input(_) => Some(
                "Copy the entire url from the browser address bar, including the ?code=... part",
            ),
            Error::InvalidToken => Some("The token is invalid or expired, try `tunestatus auth`"),
            _ => None,
        };

        let report = Report::new(self);
        match suggestion {
            Some(suggestion) => report.suggestion(suggestion),
            None => report,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn revoked_grant_is_detected() {
        let err = Error::Auth {
            code: 400,
            error: "invalid_grant".into(),
            message: "Refresh token revoked".into(),
        };
        assert!(err.is_revoked_grant());
        assert!(!Error::Timeout.is_revoked_grant());
    }

    #[test]
    fn auth_error_shows_body() {
        let err = Error::Auth {
            code: 400,
            error: "invalid_client".into(),
            message: "Invalid client secret".into(),
        };
        assert_eq!(
            err.to_string(),
            "authorization failed [400] invalid_client: Invalid client secret"
        );
    }
}

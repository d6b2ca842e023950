use std::fmt::{Display, Formatter};

use base64::Engine;

/// Spotify app client id and secret
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new<S1: Into<String>, S2: Into<String>>(client_id: S1, client_secret: S2) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Value for a `Basic` authorization header
    pub fn auth(&self) -> String {
        let auth = format!("{}:{}", self.client_id, self.client_secret);
        base64::engine::general_purpose::STANDARD.encode(auth.as_bytes())
    }
}

/// Formats as the base64 encoded `id:secret` pair so it can be dropped into a header
impl Display for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.auth())
    }
}

/// First few characters of a secret followed by an ellipsis, safe to print
pub fn preview(secret: &str) -> String {
    let head: String = secret.chars().take(8).collect();
    format!("{head}...")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn basic_auth_header() {
        let creds = Credentials::new("id", "secret");
        // base64("id:secret")
        assert_eq!(creds.to_string(), "aWQ6c2VjcmV0");
    }

    #[test]
    fn preview_truncates() {
        assert_eq!(preview("0123456789abcdef"), "01234567...");
        assert_eq!(preview("abc"), "abc...");
    }
}

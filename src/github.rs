use std::future::Future;
use std::time::Duration;

use chrono::SecondsFormat;
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Error, Result};
use crate::logging::ResponseLogger;
use crate::status::StatusUpdate;

pub static GRAPHQL_URL: &str = "https://api.github.com/graphql";

static CHANGE_USER_STATUS: &str = r#"
mutation($message: String!, $expiresAt: DateTime) {
  changeUserStatus(input: { message: $message, expiresAt: $expiresAt }) {
    status { message expiresAt }
  }
}
"#;

/// The profile side of the synchronizer
pub trait ProfileService {
    fn set_status(&self, update: &StatusUpdate) -> impl Future<Output = Result<()>>;
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

/// GitHub GraphQL client holding a personal access token with the `user` scope
#[derive(Debug, Clone)]
pub struct GitHub {
    client: reqwest::Client,
    token: String,
    graphql_url: String,
}

impl GitHub {
    pub fn new<S: Into<String>>(token: S, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            token: token.into(),
            graphql_url: GRAPHQL_URL.to_string(),
        })
    }
}

/// Request body for the `changeUserStatus` mutation
pub fn change_status_body(update: &StatusUpdate) -> Value {
    json!({
        "query": CHANGE_USER_STATUS,
        "variables": {
            "message": update.message.clone().unwrap_or_default(),
            "expiresAt": update.expires_at.map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    })
}

/// Check a GraphQL response, which reports failures in the body with a 200 status
fn check_response(status: StatusCode, body: &str) -> Result<()> {
    if status == StatusCode::UNAUTHORIZED {
        ResponseLogger::log_error("github", status, body);
        return Err(Error::Auth {
            code: status.as_u16(),
            error: "bad_credentials".into(),
            message: "GITHUB_TOKEN was rejected".into(),
        });
    }

    if !status.is_success() {
        ResponseLogger::log_error("github", status, body);
        return Err(Error::unexpected(status.as_u16(), "github rejected the status update"));
    }

    let response: GraphQlResponse = serde_json::from_str(body)?;
    if !response.errors.is_empty() {
        let messages = response
            .errors
            .into_iter()
            .map(|e| e.message)
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::unexpected(status.as_u16(), format!("graphql errors: {messages}")));
    }
    Ok(())
}

impl ProfileService for GitHub {
    async fn set_status(&self, update: &StatusUpdate) -> Result<()> {
        let response = self
            .client
            .post(&self.graphql_url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(USER_AGENT, concat!("tunestatus/", env!("CARGO_PKG_VERSION")))
            .json(&change_status_body(update))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        check_response(status, &body)
    }
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn body_for_playing_status() {
        let update = StatusUpdate {
            message: Some("Listening to Song A by Artist X".into()),
            expires_at: Some(Utc.with_ymd_and_hms(2024, 4, 1, 12, 3, 20).unwrap()),
        };
        let body = change_status_body(&update);
        assert_eq!(body["variables"]["message"], "Listening to Song A by Artist X");
        assert_eq!(body["variables"]["expiresAt"], "2024-04-01T12:03:20Z");
        assert!(body["query"].as_str().unwrap().contains("changeUserStatus"));
    }

    #[test]
    fn body_for_clear() {
        let body = change_status_body(&StatusUpdate::clear());
        assert_eq!(body["variables"]["message"], "");
        assert!(body["variables"]["expiresAt"].is_null());
    }

    #[test]
    fn graphql_success() {
        let body = r#"{"data":{"changeUserStatus":{"status":{"message":"hi","expiresAt":null}}}}"#;
        assert!(check_response(StatusCode::OK, body).is_ok());
    }

    #[test]
    fn graphql_errors_fail_the_write() {
        let body = r#"{"errors":[{"type":"FORBIDDEN","message":"Resource not accessible by integration"}]}"#;
        let err = check_response(StatusCode::OK, body).unwrap_err();
        assert!(matches!(err, Error::UnexpectedResponse { code: 200, message } if message.contains("not accessible")));
    }

    #[test]
    fn http_failures() {
        assert!(matches!(
            check_response(StatusCode::UNAUTHORIZED, r#"{"message":"Bad credentials"}"#),
            Err(Error::Auth { code: 401, .. })
        ));
        assert!(matches!(
            check_response(StatusCode::BAD_GATEWAY, "oops"),
            Err(Error::UnexpectedResponse { code: 502, .. })
        ));
    }
}

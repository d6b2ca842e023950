use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::LevelFilter;
use serde::Deserialize;

pub use env_file::update_env_file;

use crate::error::{Error, Result};
use crate::spotify::Credentials;

mod env_file;

pub static DEFAULT_ENV_FILE: &str = ".env";
pub static DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8888/callback";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub static REFRESH_TOKEN_KEY: &str = "SPOTIFY_REFRESH_TOKEN";

/// Which command the configuration is loaded for, decides the required keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Bootstrap,
    Sync,
}

/// Raw key/values as found in the environment, keys lowercased by envy
#[derive(Debug, Default, Deserialize)]
struct Env {
    spotify_client_id: Option<String>,
    spotify_client_secret: Option<String>,
    spotify_refresh_token: Option<String>,
    spotify_redirect_uri: Option<String>,
    github_token: Option<String>,
    poll_interval: Option<String>,
    status_prefix: Option<String>,
    clear_status_when_idle: Option<String>,
    http_timeout: Option<String>,
    log_level: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// File the configuration was read from and rotated refresh tokens are written to
    pub env_file: PathBuf,
    pub credentials: Credentials,
    pub redirect_uri: String,
    pub refresh_token: Option<String>,
    pub github_token: Option<String>,
    pub poll_interval: Duration,
    pub status_prefix: String,
    pub clear_when_idle: bool,
    pub http_timeout: Duration,
    pub log_level: LevelFilter,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn seconds(key: &str, value: &str) -> Result<Duration> {
    let secs = value
        .trim()
        .parse::<f64>()
        .map_err(|_| Error::Config(format!("{key} must be a number of seconds, got '{value}'")))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(Error::Config(format!("{key} must be greater than zero, got '{value}'")));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|_| Error::Config(format!("{key} is out of range, got '{value}'")))
}

fn flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

impl Config {
    /// Load the `.env` file, if there is one, then read the configuration from the
    /// process environment. Variables already set in the environment win over the file.
    pub fn load(env_file: &Path, mode: Mode) -> Result<Self> {
        if env_file.exists() {
            dotenvy::from_path(env_file)
                .map_err(|e| Error::Config(format!("failed to read {}: {e}", env_file.display())))?;
        }
        Self::from_vars(std::env::vars(), env_file, mode)
    }

    pub fn from_vars<I>(vars: I, env_file: &Path, mode: Mode) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let env: Env = envy::from_iter(vars).map_err(|e| Error::Config(e.to_string()))?;

        let mut missing = Vec::new();
        let mut required = |value: Option<String>, key: &'static str| {
            let value = present(value);
            if value.is_none() {
                missing.push(key);
            }
            value.unwrap_or_default()
        };

        let client_id = required(env.spotify_client_id, "SPOTIFY_CLIENT_ID");
        let client_secret = required(env.spotify_client_secret, "SPOTIFY_CLIENT_SECRET");
        let (refresh_token, github_token) = match mode {
            Mode::Bootstrap => (present(env.spotify_refresh_token), present(env.github_token)),
            Mode::Sync => (
                Some(required(env.spotify_refresh_token, "SPOTIFY_REFRESH_TOKEN")),
                Some(required(env.github_token, "GITHUB_TOKEN")),
            ),
        };

        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing required variables: {}",
                missing.join(", ")
            )));
        }

        let log_level = match present(env.log_level) {
            Some(level) => LevelFilter::from_str(level.trim())
                .map_err(|_| Error::Config(format!("LOG_LEVEL '{level}' is not a log level")))?,
            None => LevelFilter::Info,
        };

        Ok(Self {
            env_file: env_file.to_path_buf(),
            credentials: Credentials::new(client_id, client_secret),
            redirect_uri: present(env.spotify_redirect_uri)
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
            refresh_token,
            github_token,
            poll_interval: match present(env.poll_interval) {
                Some(value) => seconds("POLL_INTERVAL", &value)?,
                None => DEFAULT_POLL_INTERVAL,
            },
            status_prefix: env.status_prefix.unwrap_or_default(),
            clear_when_idle: env.clear_status_when_idle.as_deref().map(flag).unwrap_or(false),
            http_timeout: match present(env.http_timeout) {
                Some(value) => seconds("HTTP_TIMEOUT", &value)?,
                None => DEFAULT_HTTP_TIMEOUT,
            },
            log_level,
        })
    }

    /// Override the poll interval from the command line
    pub fn with_poll_interval(mut self, secs: Option<f64>) -> Result<Self> {
        if let Some(secs) = secs {
            self.poll_interval = seconds("--interval", &secs.to_string())?;
        }
        Ok(self)
    }

    pub fn with_redirect_uri(mut self, redirect: Option<String>) -> Self {
        if let Some(redirect) = redirect {
            self.redirect_uri = redirect;
        }
        self
    }
}

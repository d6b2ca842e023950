use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::github::ProfileService;
use crate::spotify::{AccessToken, CurrentlyPlaying, MusicService};
use crate::status::{Status, StatusUpdate};

/// Called with the new refresh token when spotify rotates it
pub struct TokenCallback(Box<dyn Fn(&str) -> Result<()>>);

impl Debug for TokenCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fn<TokenCallback>()")
    }
}

impl TokenCallback {
    pub fn new<F: Fn(&str) -> Result<()> + 'static>(f: F) -> Self {
        Self(Box::new(f))
    }

    pub fn call(&self, refresh_token: &str) -> Result<()> {
        (self.0)(refresh_token)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub poll_interval: Duration,
    pub status_prefix: String,
    pub clear_when_idle: bool,
}

/// Outcome of a single poll tick
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// The status already says this, nothing was written
    Unchanged(String),
    /// The profile status was written
    Updated(String),
}

/// Polls the music service and mirrors what is playing into the profile status.
///
/// Everything that changes between ticks lives here: the cached access token,
/// the possibly rotated refresh token and the last status that was written.
#[derive(Debug)]
pub struct Synchronizer<M, P> {
    music: M,
    profile: P,
    settings: Settings,
    refresh_token: String,
    token: Option<AccessToken>,
    last_sent: Option<String>,
    token_callback: Option<TokenCallback>,
}

impl<M: MusicService, P: ProfileService> Synchronizer<M, P> {
    pub fn new<S: Into<String>>(music: M, profile: P, refresh_token: S, settings: Settings) -> Self {
        Self {
            music,
            profile,
            settings,
            refresh_token: refresh_token.into(),
            token: None,
            last_sent: None,
            token_callback: None,
        }
    }

    pub fn with_token_callback<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> Result<()> + 'static,
    {
        self.token_callback = Some(TokenCallback::new(f));
        self
    }

    /// The last status that was written successfully
    pub fn last_sent(&self) -> Option<&str> {
        self.last_sent.as_deref()
    }

    /// Poll once and write the status if it changed
    pub async fn tick(&mut self) -> Result<Tick> {
        let playback = self.playback().await?;
        let status = Status::from_playback(playback.as_ref(), Utc::now());
        let target = status.display(&self.settings.status_prefix);

        if self.last_sent.as_deref() == Some(target.as_str()) {
            return Ok(Tick::Unchanged(target));
        }

        let update = status.update(&self.settings.status_prefix, self.settings.clear_when_idle);
        // last_sent stays as is on failure so the next tick tries again
        self.profile.set_status(&update).await?;
        self.last_sent = Some(target.clone());
        Ok(Tick::Updated(target))
    }

    /// Poll until `shutdown` resolves, usually `tokio::signal::ctrl_c()`. Errors only end the current tick.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        info!("Polling spotify every {:?}", self.settings.poll_interval);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                result = &mut shutdown => {
                    result?;
                    info!("Received shutdown signal, stopping");
                    break;
                }
                _ = self.cycle() => {}
            }
        }

        if self.settings.clear_when_idle {
            info!("Clearing GitHub status");
            if let Err(err) = self.profile.set_status(&StatusUpdate::clear()).await {
                warn!("Failed to clear GitHub status: {err}");
            }
        }
        Ok(())
    }

    async fn cycle(&mut self) {
        match self.tick().await {
            Ok(Tick::Updated(status)) => info!("GitHub status updated to: {status}"),
            Ok(Tick::Unchanged(status)) => debug!("Status unchanged: {status}"),
            Err(err) => report(&err),
        }
        tokio::time::sleep(self.settings.poll_interval).await;
    }

    /// Fetch the playback, retrying once with a fresh token if the current one is rejected
    async fn playback(&mut self) -> Result<Option<CurrentlyPlaying>> {
        let token = self.access_token().await?;
        let result = self.music.currently_playing(&token).await;
        match result {
            Err(Error::InvalidToken) => {
                warn!("Access token expired or invalid, forcing refresh");
                self.token = None;
                let token = self.refresh().await?;
                let retried = self.music.currently_playing(&token).await;
                if matches!(retried, Err(Error::InvalidToken)) {
                    self.token = None;
                }
                retried
            }
            result => result,
        }
    }

    async fn access_token(&mut self) -> Result<AccessToken> {
        match &self.token {
            Some(token) if !token.is_expired() => Ok(token.clone()),
            _ => self.refresh().await,
        }
    }

    async fn refresh(&mut self) -> Result<AccessToken> {
        debug!("Refreshing spotify access token");
        let grant = self.music.refresh_access_token(&self.refresh_token).await?;

        if let Some(rotated) = grant.refresh_token.as_deref() {
            if rotated != self.refresh_token {
                info!("Spotify provided a new refresh token");
                self.refresh_token = rotated.to_string();
                if let Some(callback) = &self.token_callback {
                    if let Err(err) = callback.call(rotated) {
                        warn!("Failed to store the new refresh token, using it for this session only: {err}");
                    }
                }
            }
        }

        let token = grant.access_token();
        debug!("Access token valid until {}", token.expires());
        self.token = Some(token.clone());
        Ok(token)
    }
}

fn report(err: &Error) {
    match err {
        err if err.is_revoked_grant() => {
            error!("Refresh token was rejected: {err}");
            error!("Run `tunestatus auth` to get a new refresh token");
        }
        Error::Auth { .. } | Error::InvalidToken => error!("Skipping tick: {err}"),
        err => warn!("Skipping tick: {err}"),
    }
}

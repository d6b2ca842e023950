use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::eyre;
use color_eyre::Result;

use tunestatus::config::{update_env_file, Config, Mode, DEFAULT_ENV_FILE, REFRESH_TOKEN_KEY};
use tunestatus::github::GitHub;
use tunestatus::spotify::Spotify;
use tunestatus::sync::{Settings, Synchronizer, Tick};
use tunestatus::{bootstrap, logging, Error};

/// Mirror the track playing on Spotify into your GitHub profile status
#[derive(Debug, Parser)]
#[command(name = "tunestatus", version, about)]
struct Cli {
    /// File to read configuration from and store the refresh token in
    #[arg(long, global = true, default_value = DEFAULT_ENV_FILE)]
    env_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Authorize with Spotify once and save the refresh token
    Auth {
        /// Redirect URI registered in the Spotify app
        #[arg(long)]
        redirect_uri: Option<String>,
        /// Only print the authorization url
        #[arg(long)]
        no_browser: bool,
    },
    /// Keep the GitHub status in sync with Spotify
    Run {
        /// Seconds between polls
        #[arg(long)]
        interval: Option<f64>,
        /// Poll a single time and exit
        #[arg(long)]
        once: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let mode = match cli.command {
        Command::Auth { .. } => Mode::Bootstrap,
        Command::Run { .. } => Mode::Sync,
    };
    let config = Config::load(&cli.env_file, mode).map_err(Error::into_report)?;
    logging::init(config.log_level);

    match cli.command {
        Command::Auth { redirect_uri, no_browser } => {
            let config = config.with_redirect_uri(redirect_uri);
            bootstrap::run(&config, !no_browser)
                .await
                .map_err(Error::into_report)
        }
        Command::Run { interval, once } => {
            let config = config.with_poll_interval(interval).map_err(Error::into_report)?;
            run(config, once).await
        }
    }
}

async fn run(config: Config, once: bool) -> Result<()> {
    let refresh_token = config
        .refresh_token
        .clone()
        .ok_or_else(|| eyre!("SPOTIFY_REFRESH_TOKEN is not set"))?;
    let github_token = config
        .github_token
        .clone()
        .ok_or_else(|| eyre!("GITHUB_TOKEN is not set"))?;

    let spotify = Spotify::new(config.credentials.clone(), config.http_timeout).map_err(Error::into_report)?;
    let github = GitHub::new(github_token, config.http_timeout).map_err(Error::into_report)?;

    let env_file = config.env_file.clone();
    let settings = Settings {
        poll_interval: config.poll_interval,
        status_prefix: config.status_prefix.clone(),
        clear_when_idle: config.clear_when_idle,
    };

    log::info!("Starting Spotify to GitHub status sync");
    log::info!("Using .env file at: {}", env_file.display());

    let mut sync = Synchronizer::new(spotify, github, refresh_token, settings).with_token_callback(
        move |token: &str| {
            update_env_file(&env_file, REFRESH_TOKEN_KEY, token)?;
            log::info!("Updated {REFRESH_TOKEN_KEY} in {}", env_file.display());
            Ok(())
        },
    );

    if once {
        return match sync.tick().await.map_err(Error::into_report)? {
            Tick::Updated(status) => {
                log::info!("GitHub status updated to: {status}");
                Ok(())
            }
            Tick::Unchanged(_) => Ok(()),
        };
    }

    sync.run(tokio::signal::ctrl_c()).await.map_err(Error::into_report)
}

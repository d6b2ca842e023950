use dialoguer::Input;
use log::{info, warn};

use crate::config::{update_env_file, Config, REFRESH_TOKEN_KEY};
use crate::error::{Error, Result};
use crate::spotify::auth::{capture_code, loopback_addr, parse_callback};
use crate::spotify::{preview, OAuth, Spotify};

/// Run the one time authorization code flow and store the refresh token in the `.env` file
pub async fn run(config: &Config, open_browser: bool) -> Result<()> {
    println!("Client ID: {}", preview(&config.credentials.client_id));
    println!("Client Secret: {}", preview(&config.credentials.client_secret));
    println!("Redirect URI: {}", config.redirect_uri);
    println!("  (must be listed in your app settings at https://developer.spotify.com/dashboard)");

    let spotify = Spotify::new(config.credentials.clone(), config.http_timeout)?;
    let oauth = OAuth::new(config.redirect_uri.clone());
    let url = spotify.authorization_url(&oauth)?;

    println!("\nOpen this url to authorize tunestatus if the browser doesn't open:\n\n{url}\n");
    if open_browser {
        if let Err(err) = open::that(&url) {
            warn!("Failed to open the browser: {err}");
        }
    }

    let code = authorization_code(&oauth).await?;

    info!("Exchanging the authorization code for tokens");
    let grant = spotify.request_access_token(&code, &oauth.redirect).await?;
    let refresh_token = grant.refresh_token.ok_or_else(|| Error::Auth {
        code: 200,
        error: "missing_refresh_token".into(),
        message: "no refresh token received, run `tunestatus auth` again with a fresh authorization".into(),
    })?;

    if let Err(err) = update_env_file(&config.env_file, REFRESH_TOKEN_KEY, &refresh_token) {
        eprintln!("Couldn't update {}: {err}", config.env_file.display());
        eprintln!("Add this line to your .env file manually:\n\n{REFRESH_TOKEN_KEY}={refresh_token}\n");
        return Err(err.into());
    }

    println!("Saved {REFRESH_TOKEN_KEY} to {}", config.env_file.display());
    println!("You can now run `tunestatus run`");
    Ok(())
}

/// Capture the redirect when it comes back to this machine, otherwise ask the user to paste it
async fn authorization_code(oauth: &OAuth) -> Result<String> {
    let Some(addr) = loopback_addr(&oauth.redirect) else {
        return prompt_code(oauth);
    };

    println!("Waiting for spotify to redirect to http://{addr} ...");
    match capture_code(&oauth.redirect, &oauth.state).await {
        Err(Error::Io(err)) => {
            warn!("Couldn't listen on {addr}: {err}");
            prompt_code(oauth)
        }
        result => result,
    }
}

fn prompt_code(oauth: &OAuth) -> Result<String> {
    println!("After clicking 'Agree' you will be redirected, the page may not load and that's OK.");
    println!("Copy the ENTIRE url from the address bar, it should start with {}?code=...", oauth.redirect);

    loop {
        let url: String = Input::<String>::new()
            .with_prompt("Paste the complete url")
            .interact_text()
            .map_err(|e| Error::Input(e.to_string()))?;

        match parse_callback(&url, &oauth.state) {
            Ok(code) => return Ok(code),
            Err(Error::Input(message)) => eprintln!("{message}, try again"),
            Err(err) => return Err(err),
        }
    }
}

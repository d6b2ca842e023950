use std::convert::Infallible;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use futures::future::{ready, Ready};
use html_to_string_macro::html;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::Service;
use hyper::{header, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use reqwest::Url;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedSender;

use super::AuthCodeResponse;
use crate::error::{Error, Result};

/// Serves the oauth redirect and forwards the parsed authorization code
#[derive(Clone)]
pub struct Callback {
    path: String,
    state: String,
    tx: UnboundedSender<Result<String>>,
}

macro_rules! layout {
    ($($html: tt)*) => {
        layout(html! { $($html)*})
    };
}

impl Callback {
    pub fn new<S1: Into<String>, S2: Into<String>>(path: S1, state: S2, tx: UnboundedSender<Result<String>>) -> Self {
        Self {
            path: path.into(),
            state: state.into(),
            tx,
        }
    }

    fn respond(&self, method: &Method, path: &str, query: Option<&str>) -> Response<Full<Bytes>> {
        if *method != Method::GET || path != self.path {
            return page(StatusCode::NOT_FOUND, layout! {
                <h1>"404 Page not found"</h1>
            });
        }

        let result = match query {
            Some(query) => serde_qs::from_str::<AuthCodeResponse>(query)
                .map_err(|e| Error::Input(e.to_string()))
                .and_then(|response| response.into_code(&self.state)),
            None => Err(Error::Input("spotify did not send a response".into())),
        };

        let response = match &result {
            Ok(_) => page(StatusCode::OK, layout! {
                <h1>
                    "Successfully authenticated tunestatus with "
                    <span class="green">"Spotify"</span>
                </h1>
                <h3>"This tab may now be closed"</h3>
            }),
            Err(_) => page(StatusCode::BAD_REQUEST, layout! {
                <h1>"Authorization failed"</h1>
                <h3>"Check the terminal for details"</h3>
            }),
        };

        // Receiver is gone once a result was accepted
        let _ = self.tx.send(result);
        response
    }
}

impl Service<Request<Incoming>> for Callback {
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Ready<std::result::Result<Self::Response, Self::Error>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        ready(Ok(self.respond(req.method(), req.uri().path(), req.uri().query())))
    }
}

fn page(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/html; charset=utf-8"),
    );
    response
}

fn layout(body: String) -> String {
    html! {
        <html>
            <head>
                <title>"tunestatus"</title>
                <style>"
                * {
                    box-sizing: border-box
                }
                html {
                    font-family: Arial;
                    background-color: #191414;
                    color: #FFFFFF
                }
                :is(h1, h3) {
                    text-align: center;
                }
                body {
                    padding: 1.5rem;
                }
                .green {
                    color: #1DB954
                }
                "</style>
            </head>
            <body>
                {body}
            </body>
        </html>
    }
}

/// Socket address to listen on when the redirect uri points back at this machine over plain http
pub fn loopback_addr(redirect: &str) -> Option<SocketAddr> {
    let url = Url::parse(redirect).ok()?;
    if url.scheme() != "http" {
        return None;
    }

    let host = url.host_str()?;
    let ip = match host.trim_start_matches('[').trim_end_matches(']') {
        "localhost" => IpAddr::V4(Ipv4Addr::LOCALHOST),
        other => other.parse::<IpAddr>().ok()?,
    };

    if !ip.is_loopback() {
        return None;
    }
    Some(SocketAddr::new(ip, url.port_or_known_default()?))
}

/// Start a mini http server on the redirect address and wait for spotify to
/// redirect the browser to it with the authorization code.
pub async fn capture_code(redirect: &str, state: &str) -> Result<String> {
    let addr = loopback_addr(redirect)
        .ok_or_else(|| Error::Input(format!("{redirect} is not a loopback http address")))?;
    let path = Url::parse(redirect)
        .map_err(|e| Error::Input(e.to_string()))?
        .path()
        .to_string();

    let listener = TcpListener::bind(addr).await?;
    log::debug!("Listening for the spotify callback on {addr}");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let callback = Callback::new(path, state, tx);
    let handle = tokio::task::spawn(async move {
        loop {
            let stream = match listener.accept().await {
                Ok((stream, _)) => stream,
                Err(err) => {
                    log::warn!("Failed to accept callback connection: {err}");
                    continue;
                }
            };
            let io = TokioIo::new(stream);

            let handler = callback.clone();
            tokio::task::spawn(async move {
                if let Err(err) = http1::Builder::new().serve_connection(io, handler).await {
                    log::warn!("Error serving connection to spotify callback: {err:?}");
                }
            });
        }
    });

    let result = rx.recv().await;
    handle.abort();
    result.ok_or_else(|| Error::Input("spotify did not send a response".into()))?
}

#[cfg(test)]
mod test {
    use super::*;

    fn callback() -> (Callback, tokio::sync::mpsc::UnboundedReceiver<Result<String>>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Callback::new("/callback", "state", tx), rx)
    }

    #[test]
    fn loopback_addresses() {
        assert_eq!(
            loopback_addr("http://127.0.0.1:8888/callback"),
            Some(SocketAddr::from(([127, 0, 0, 1], 8888)))
        );
        assert_eq!(
            loopback_addr("http://localhost:9000/cb"),
            Some(SocketAddr::from(([127, 0, 0, 1], 9000)))
        );
        assert!(loopback_addr("http://[::1]:8888/callback").is_some());
        assert_eq!(
            loopback_addr("http://127.0.0.1/callback"),
            Some(SocketAddr::from(([127, 0, 0, 1], 80)))
        );
    }

    #[test]
    fn remote_redirects_are_not_captured() {
        assert_eq!(loopback_addr("https://example.com/callback"), None);
        assert_eq!(loopback_addr("https://127.0.0.1:8888/callback"), None);
        assert_eq!(loopback_addr("http://192.168.1.2:8888/callback"), None);
        assert_eq!(loopback_addr("not a url"), None);
    }

    #[test]
    fn forwards_code() {
        let (callback, mut rx) = callback();
        let response = callback.respond(&Method::GET, "/callback", Some("code=abc&state=state"));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(rx.try_recv().unwrap().unwrap(), "abc");
    }

    #[test]
    fn forwards_failure() {
        let (callback, mut rx) = callback();
        let response = callback.respond(&Method::GET, "/callback", Some("error=access_denied&state=state"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(matches!(rx.try_recv().unwrap(), Err(Error::Input(_))));
    }

    #[test]
    fn ignores_other_paths() {
        let (callback, mut rx) = callback();
        let response = callback.respond(&Method::GET, "/favicon.ico", None);
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(rx.try_recv().is_err());
    }
}

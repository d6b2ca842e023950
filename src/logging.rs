use log::LevelFilter;
use reqwest::StatusCode;

/// Install `env_logger` as the logging backend.
///
/// `RUST_LOG` style filters still apply on top of the configured level so a
/// single module can be made more verbose.
pub fn init(level: LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    // Ignore a second initialization, e.g. from tests
    let _ = builder.try_init();
}

pub struct ResponseLogger;

impl ResponseLogger {
    /// Log the body of a failed response on a single line
    pub fn log_error(service: &str, status: StatusCode, body: &str) {
        log::warn!("[{service}] [{status}] {}", body.replace('\n', ""));
    }
}

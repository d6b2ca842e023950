pub mod bootstrap;
pub mod config;
pub mod error;
pub mod github;
pub mod logging;
pub mod spotify;
pub mod status;
pub mod sync;

pub use error::{Error, Result};

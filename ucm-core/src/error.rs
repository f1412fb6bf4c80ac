//! Common error types for the circle task crates

use thiserror::Error;

/// Common result type
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation not allowed in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

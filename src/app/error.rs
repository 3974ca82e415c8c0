use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum TidingsError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TidingsError>;

/// Failures surfaced by a [`Transport`](crate::transport::Transport).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
}

/// Failures raised while turning a response body into a page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The body is not JSON or a syndication feed at all.
    #[error("Malformed feed body: {0}")]
    Malformed(String),

    /// The body parsed but lacks required fields or has the wrong shape.
    #[error("Unexpected feed schema: {0}")]
    SchemaMismatch(String),
}

/// Requests the coordinator turned away. Neither is a failure.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("Another operation is already in flight")]
    AlreadyInFlight,

    #[error("Feed is already at its end")]
    AlreadyAtEnd,
}

/// Why a sync operation left its section in the `Failed` state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The sync task died before producing a result.
    #[error("Sync task interrupted: {0}")]
    Interrupted(String),
}

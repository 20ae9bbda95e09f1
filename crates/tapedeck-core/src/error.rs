//! Shared error type across tapedeck crates.

use thiserror::Error;

/// Stable error categories (used in logs, events and tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or HTTP failure while delivering a batch.
    Transport,
    /// Ingestion endpoint rejected the credential.
    Unauthorized,
    /// Malformed record payload.
    Decode,
    /// DOM / selector lookup failure.
    Layout,
    /// Invalid configuration.
    Config,
    /// Internal error.
    Internal,
}

impl ErrorKind {
    /// String representation used in logs and events.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transport => "TRANSPORT",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::Decode => "DECODE",
            ErrorKind::Layout => "LAYOUT",
            ErrorKind::Config => "CONFIG",
            ErrorKind::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, TapedeckError>;

/// Unified error type used by core, tracker and player.
#[derive(Debug, Error)]
pub enum TapedeckError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("decode: {0}")]
    Decode(String),
    #[error("layout: {0}")]
    Layout(String),
    #[error("config: {0}")]
    Config(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl TapedeckError {
    /// Map the error to its stable category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TapedeckError::Transport(_) => ErrorKind::Transport,
            TapedeckError::Unauthorized => ErrorKind::Unauthorized,
            TapedeckError::Decode(_) => ErrorKind::Decode,
            TapedeckError::Layout(_) => ErrorKind::Layout,
            TapedeckError::Config(_) => ErrorKind::Config,
            TapedeckError::Internal(_) => ErrorKind::Internal,
        }
    }
}

//! Centralized error types for mailbridge.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailbridge library.
#[derive(Error, Debug)]
pub enum MailError {
    /// No profile, archive or folder could be located.
    #[error("{0}")]
    NotFound(String),

    /// An archive or message could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Network or protocol failure talking to a remote store or relay.
    #[error("{0}")]
    Transport(String),

    /// Required settings are absent.
    #[error("{0}")]
    Configuration(String),

    /// The configured backend kind is not one we know how to serve.
    #[error("Unsupported client type: {0}")]
    UnsupportedBackend(String),

    /// A recipient or sender address could not be parsed.
    #[error("Invalid address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
}

/// Convenience alias for `Result<T, MailError>`.
pub type Result<T> = std::result::Result<T, MailError>;

impl MailError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable machine-readable name of the error class, rendered next to
    /// the human-readable message in every error result.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Parse(_) => "parse_failure",
            Self::Io { .. } => "io_error",
            Self::Transport(_) => "transport_failure",
            Self::Configuration(_) => "configuration_error",
            Self::UnsupportedBackend(_) => "unsupported_backend",
            Self::InvalidAddress { .. } => "invalid_address",
        }
    }
}

impl From<imap::Error> for MailError {
    fn from(source: imap::Error) -> Self {
        Self::Transport(source.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for MailError {
    fn from(source: lettre::transport::smtp::Error) -> Self {
        Self::Transport(source.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(MailError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(
            MailError::Configuration("x".into()).kind(),
            "configuration_error"
        );
        assert_eq!(
            MailError::UnsupportedBackend("pine".into()).kind(),
            "unsupported_backend"
        );
    }

    #[test]
    fn test_unsupported_message() {
        let err = MailError::UnsupportedBackend("apple_mail".into());
        assert_eq!(err.to_string(), "Unsupported client type: apple_mail");
    }
}

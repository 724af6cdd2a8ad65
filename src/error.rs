use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while syncing prefix lists or collecting metrics
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid input; always raised before any remote mutation
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Read from {target} failed: {reason}")]
    Read { target: String, reason: String },

    #[error("Write to {target} failed ({status}): {reason}")]
    Write {
        target: String,
        status: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub fn config<S: Into<String>>(reason: S) -> Self {
        Error::Config(reason.into())
    }

    pub fn read<T: ToString, R: ToString>(target: T, reason: R) -> Self {
        Error::Read {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Configuration and authentication problems abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_) | Error::Auth(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(Error::config("dry_run missing").is_fatal());
        assert!(Error::Auth("401".to_string()).is_fatal());
        assert!(!Error::read("prefixList/1", "timeout").is_fatal());
    }

    #[test]
    fn test_display() {
        let err = Error::Write {
            target: "prefixList/42".to_string(),
            status: "500 Internal Server Error".to_string(),
            reason: "boom".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Write to prefixList/42 failed (500 Internal Server Error): boom"
        );
    }
}

//! Error types for profsite.
//!
//! Library crates use [`ProfsiteError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all profsite operations.
#[derive(Debug, thiserror::Error)]
pub enum ProfsiteError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Transport-level HTTP failure (DNS, connect, timeout, body read).
    #[error("network error: {0}")]
    Network(String),

    /// A remote service answered with a non-success status.
    #[error("remote service returned HTTP {status} for {url}")]
    Remote { status: u16, url: String },

    /// Malformed response or document content.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad identifiers, invalid input, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Markdown-to-HTML conversion error (converter missing or failing).
    #[error("conversion error: {0}")]
    Conversion(String),

    /// A stored record was looked up but does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ProfsiteError>;

impl ProfsiteError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Record lookup miss.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = ProfsiteError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = ProfsiteError::Remote {
            status: 403,
            url: "https://api.zotero.org/users/1/items".into(),
        };
        assert!(err.to_string().contains("HTTP 403"));

        let err = ProfsiteError::not_found("library", "0190");
        assert_eq!(err.to_string(), "library not found: 0190");
    }

    #[test]
    fn io_error_keeps_path() {
        let err = ProfsiteError::io(
            "/srv/media/bibs",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/srv/media/bibs"));
    }
}

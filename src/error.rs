//! Crate-wide error type and its severity classification.
//!
//! # Severity
//! ```text
//! Fatal        → configuration mistakes and template programming defects.
//!                The dispatch boundary aborts on these.
//! Recoverable  → reported as an ordinary error response (minify rewrite,
//!                body encoding).
//! Ignorable    → the client went away mid-response; dropped silently.
//! ```
//!
//! # Design Decisions
//! - Operations never panic; they return `Error` and let the caller decide
//! - Severity is derived from the variant, never stored separately
//! - I/O errors are split by `io::ErrorKind` so disconnects stay quiet

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::template::{ExecError, ParseError};

/// Result alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// How the dispatch boundary must treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Abort: the program referenced something that does not exist or is
    /// misconfigured.
    Fatal,
    /// Report to the client as an error response.
    Recoverable,
    /// Drop silently.
    Ignorable,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("template {0} already exists")]
    DuplicateTemplate(String),

    #[error("component name must not be empty")]
    EmptyComponentName,

    #[error("component {0} already exists")]
    DuplicateComponent(String),

    #[error("root template {root} not found in {template}")]
    RootNotFound { template: String, root: String },

    #[error("template {0} not found")]
    TemplateNotFound(String),

    #[error("route {0} not found")]
    RouteNotFound(String),

    #[error("invalid header value {0:?}")]
    InvalidHeader(String),

    #[error("pattern {0} matches no files")]
    NoMatches(String),

    #[error("invalid glob pattern {pattern}: {message}")]
    Pattern { pattern: String, message: String },

    #[error("read {path}: {source}")]
    ReadSource {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parse {name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error("minify: {0}")]
    Minify(String),

    #[error("encode body: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("write response: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Severity of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Minify(_) | Error::Encode(_) => ErrorKind::Recoverable,
            Error::Io(e) if is_disconnect(e) => ErrorKind::Ignorable,
            Error::Io(_) => ErrorKind::Recoverable,
            Error::Exec(e) if e.is_disconnect() => ErrorKind::Ignorable,
            _ => ErrorKind::Fatal,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}

/// True for the I/O conditions a client produces by hanging up.
pub fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_classification() {
        let broken = Error::Io(io::Error::from(io::ErrorKind::BrokenPipe));
        assert_eq!(broken.kind(), ErrorKind::Ignorable);

        let reset = Error::Io(io::Error::from(io::ErrorKind::ConnectionReset));
        assert_eq!(reset.kind(), ErrorKind::Ignorable);

        let other = Error::Io(io::Error::other("disk full"));
        assert_eq!(other.kind(), ErrorKind::Recoverable);
    }

    #[test]
    fn test_configuration_errors_are_fatal() {
        assert!(Error::DuplicateTemplate("t".into()).is_fatal());
        assert!(Error::EmptyComponentName.is_fatal());
        assert!(Error::RouteNotFound("r".into()).is_fatal());
        assert!(!Error::Minify("bad".into()).is_fatal());
    }
}

//! Common error types for Filedrop.

use std::fmt;

use thiserror::Error;

/// Classification of a failed call against the remote object store or the
/// identity service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Credentials were rejected or lack the needed permission.
    PermissionDenied,
    /// Bucket, key, or identity does not exist.
    NotFound,
    /// The resource already exists (e.g. bucket creation).
    AlreadyExists,
    /// Throttling, timeouts, or server-side failures.
    Transient,
    /// Anything that could not be classified.
    Unknown,
}

impl RemoteErrorKind {
    /// Classify from an HTTP status and an optional service error code.
    ///
    /// Service codes take precedence because some services report
    /// throttling or missing entities with a generic 400.
    pub fn classify(status: Option<u16>, code: Option<&str>) -> Self {
        match code {
            Some("AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch") => {
                return Self::PermissionDenied
            }
            Some("NoSuchEntity" | "NoSuchBucket" | "NoSuchKey") => return Self::NotFound,
            Some("BucketAlreadyExists" | "BucketAlreadyOwnedByYou" | "EntityAlreadyExists") => {
                return Self::AlreadyExists
            }
            Some("Throttling" | "ThrottlingException" | "SlowDown" | "ServiceFailure") => {
                return Self::Transient
            }
            _ => {}
        }

        match status {
            Some(401 | 403) => Self::PermissionDenied,
            Some(404) => Self::NotFound,
            Some(409) => Self::AlreadyExists,
            Some(408 | 429) => Self::Transient,
            Some(s) if s >= 500 => Self::Transient,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PermissionDenied => "permission denied",
            Self::NotFound => "not found",
            Self::AlreadyExists => "already exists",
            Self::Transient => "transient",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Top-level error type for Filedrop operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Startup directory setup failed. The only fatal error kind.
    #[error("Process error: {0}")]
    Process(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be read or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Remote mirroring is disabled because no session could be opened.
    #[error("Remote storage unavailable: {0}")]
    Unavailable(String),

    /// A remote object-storage or identity call failed.
    #[error("Remote error ({kind}): {message}")]
    Remote {
        kind: RemoteErrorKind,
        message: String,
    },
}

impl Error {
    /// Shorthand for building a remote error.
    pub fn remote(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self::Remote {
            kind,
            message: message.into(),
        }
    }

    /// Remote error kind, if this is a remote failure.
    pub fn remote_kind(&self) -> Option<RemoteErrorKind> {
        match self {
            Self::Remote { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// HTTP status a web layer should answer with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidInput(_) => 400,
            Error::NotFound(_) => 404,
            Error::Remote {
                kind: RemoteErrorKind::NotFound,
                ..
            } => 404,
            _ => 500,
        }
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_code() {
        assert_eq!(
            RemoteErrorKind::classify(Some(400), Some("Throttling")),
            RemoteErrorKind::Transient
        );
        assert_eq!(
            RemoteErrorKind::classify(Some(404), Some("NoSuchEntity")),
            RemoteErrorKind::NotFound
        );
        assert_eq!(
            RemoteErrorKind::classify(Some(409), Some("BucketAlreadyOwnedByYou")),
            RemoteErrorKind::AlreadyExists
        );
    }

    #[test]
    fn test_classify_by_status() {
        assert_eq!(
            RemoteErrorKind::classify(Some(403), None),
            RemoteErrorKind::PermissionDenied
        );
        assert_eq!(
            RemoteErrorKind::classify(Some(503), None),
            RemoteErrorKind::Transient
        );
        assert_eq!(RemoteErrorKind::classify(None, None), RemoteErrorKind::Unknown);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::InvalidInput("x".into()).status_code(), 400);
        assert_eq!(Error::NotFound("x".into()).status_code(), 404);
        assert_eq!(Error::Process("x".into()).status_code(), 500);
        assert_eq!(
            Error::remote(RemoteErrorKind::Transient, "timeout").status_code(),
            500
        );
    }
}

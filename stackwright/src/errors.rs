//! Error types for stackwright.
//!
//! Remote collaborators report failures as [`ApiError`], classified by
//! [`ApiErrorKind`]. The engine lifts those into [`DeployError`] with the
//! name of the operation that failed. "Not found" is modelled as `None`
//! and throttling is retried internally, so neither normally reaches a
//! caller.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::document::DocumentError;

/// Classification of a remote API failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorKind {
    /// The addressed entity does not exist.
    NotFound,
    /// The provider asked the caller to slow down.
    Throttled,
    /// The request was rejected as invalid.
    Validation,
    /// The entity already exists (and is owned by the caller).
    AlreadyExists,
    /// Any other provider failure.
    Other,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not_found",
            Self::Throttled => "throttled",
            Self::Validation => "validation",
            Self::AlreadyExists => "already_exists",
            Self::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// An error returned by a remote API implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code}: {message}")]
pub struct ApiError {
    /// The failure class.
    pub kind: ApiErrorKind,
    /// The provider's error code (e.g. "ValidationError").
    pub code: String,
    /// The provider's message.
    pub message: String,
}

impl ApiError {
    /// Creates a new API error.
    #[must_use]
    pub fn new(kind: ApiErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::NotFound, "NotFound", message)
    }

    /// Creates a throttling error.
    #[must_use]
    pub fn throttled() -> Self {
        Self::new(ApiErrorKind::Throttled, "Throttling", "Rate exceeded")
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Validation, "ValidationError", message)
    }

    /// Returns true if this error is a throttling response.
    #[must_use]
    pub fn is_throttled(&self) -> bool {
        self.kind == ApiErrorKind::Throttled
    }

    /// Returns true if the addressed entity does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind == ApiErrorKind::NotFound
    }
}

/// The main error type for stackwright operations.
#[derive(Debug, Error)]
pub enum DeployError {
    /// A remote call failed.
    #[error("{operation} failed: {source}")]
    Api {
        /// The remote operation, e.g. "CreateChangeSet".
        operation: String,
        /// The underlying API error.
        #[source]
        source: ApiError,
    },

    /// The template document could not be processed.
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// A request was rejected locally before reaching the provider.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The change set contained no changes.
    #[error("Change set {change_set_id} contains no changes")]
    NoOpChangeSet {
        /// The change set that was found empty.
        change_set_id: String,
    },

    /// The change set failed for a reason other than "no changes".
    #[error("Change set {change_set_id} failed: {reason}")]
    ChangeSetFailed {
        /// The failed change set.
        change_set_id: String,
        /// The provider's status reason.
        reason: String,
    },

    /// A local filesystem operation failed.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Building an artifact archive failed.
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A background task panicked or was aborted.
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A prepared deployment record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The operation was cancelled.
    #[error("Deployment cancelled: {0}")]
    Cancelled(String),
}

impl DeployError {
    /// Creates an IO error for the given path.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the API error if this is a remote failure.
    #[must_use]
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::Api { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Attaches the name of the failing remote operation to an [`ApiError`].
pub trait ApiResultExt<T> {
    /// Wraps the error as [`DeployError::Api`] for `operation`.
    fn context(self, operation: &str) -> Result<T, DeployError>;
}

impl<T> ApiResultExt<T> for Result<T, ApiError> {
    fn context(self, operation: &str) -> Result<T, DeployError> {
        self.map_err(|source| DeployError::Api {
            operation: operation.to_string(),
            source,
        })
    }
}

/// A specialized Result type for stackwright operations.
pub type Result<T, E = DeployError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = ApiError::validation("Stack with id ghost does not exist");
        assert_eq!(
            err.to_string(),
            "ValidationError: Stack with id ghost does not exist"
        );
        assert!(!err.is_throttled());
    }

    #[test]
    fn test_context_wraps_operation() {
        let result: Result<(), ApiError> = Err(ApiError::throttled());
        let err = result.context("DescribeStacks").unwrap_err();

        assert!(err.to_string().starts_with("DescribeStacks failed"));
        assert!(err.api_error().is_some_and(ApiError::is_throttled));
    }

    #[test]
    fn test_io_error_mentions_path() {
        let err = DeployError::io(
            "/tmp/missing",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        );
        assert!(err.to_string().contains("/tmp/missing"));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ApiErrorKind::AlreadyExists.to_string(), "already_exists");
        assert_eq!(ApiErrorKind::NotFound.to_string(), "not_found");
    }
}

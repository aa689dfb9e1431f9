//! Error types for backstop-core
//!
//! Every failure carries an [`ErrorKind`] so that retry strategies can decide
//! whether an operation is worth attempting again without string matching.

use std::error::Error as StdError;
use std::fmt;

/// Result type alias using backstop-core's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed cause attached to an [`Error`]
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Classification of a failure
///
/// The kind drives retry decisions: [`ErrorKind::can_auto_retry`] tells the
/// error classifier whether another attempt may help.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The operation is still in progress on the remote side
    Pending,
    /// The resource is being modified by someone else
    Conflict,
    /// The resource is locked
    Locked,
    /// Another operation on the same resource is running
    RelatedOperationInProgress,
    /// A deadline or attempt budget was exceeded; never retried
    Timeout,
    /// The credentials or session grant expired
    InvalidGrant,
    /// The connection to the remote side failed
    Connection,
    /// A temporary failure that is safe to retry
    Transient,
    /// The caller supplied an invalid argument
    BadArgument,
    /// The requested resource does not exist
    NotFound,
    /// The caller is not permitted to perform the operation
    AccessDenied,
    /// The operation is not supported
    Unsupported,
    /// The remote side answered with a non-retryable HTTP status
    PermanentHttp,
    /// Configuration could not be loaded or is invalid
    Config,
    /// Local I/O failed
    Io,
    /// An internal invariant was violated
    Bug,
    /// The failure could not be classified
    Unidentified,
}

impl ErrorKind {
    /// Whether an operation failing with this kind may be retried automatically
    ///
    /// Unclassified failures are never retried.
    pub fn can_auto_retry(self) -> bool {
        matches!(
            self,
            ErrorKind::Pending
                | ErrorKind::Conflict
                | ErrorKind::Locked
                | ErrorKind::RelatedOperationInProgress
                | ErrorKind::InvalidGrant
                | ErrorKind::Connection
                | ErrorKind::Transient
        )
    }

    /// Whether this kind describes an expected, still-running state
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            ErrorKind::Pending
                | ErrorKind::Conflict
                | ErrorKind::Locked
                | ErrorKind::RelatedOperationInProgress
        )
    }

    /// Whether this kind is a systemic failure that a recovery strategy may repair
    pub fn is_recoverable(self) -> bool {
        matches!(self, ErrorKind::InvalidGrant | ErrorKind::Connection)
    }

    /// Map an HTTP status code onto an error kind
    ///
    /// Returns `None` for non-error statuses.
    pub fn from_http_status(status: u16) -> Option<Self> {
        let kind = match status {
            0..=399 => return None,
            400 | 422 => ErrorKind::BadArgument,
            401 => ErrorKind::InvalidGrant,
            403 => ErrorKind::AccessDenied,
            404 | 410 => ErrorKind::NotFound,
            405 | 501 => ErrorKind::Unsupported,
            409 => ErrorKind::Conflict,
            423 => ErrorKind::Locked,
            408 | 425 | 429 | 500 | 502 | 503 | 504 => ErrorKind::Transient,
            _ => ErrorKind::PermanentHttp,
        };
        Some(kind)
    }

    /// Short identifier used in logs
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Pending => "pending",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Locked => "locked",
            ErrorKind::RelatedOperationInProgress => "related_operation_in_progress",
            ErrorKind::Timeout => "timeout",
            ErrorKind::InvalidGrant => "invalid_grant",
            ErrorKind::Connection => "connection",
            ErrorKind::Transient => "transient",
            ErrorKind::BadArgument => "bad_argument",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AccessDenied => "access_denied",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::PermanentHttp => "permanent_http",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
            ErrorKind::Bug => "bug",
            ErrorKind::Unidentified => "unidentified",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core error type
///
/// The display form is the message followed by the cause, so a wrapped error
/// reads like `"timeout while creating disk: connection reset"`.
#[derive(Debug, thiserror::Error)]
#[error("{message}{}", .source.as_ref().map(|s| format!(": {}", s)).unwrap_or_default())]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    /// Create an error of the given kind
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a cause with a message and a kind
    pub fn wrap(kind: ErrorKind, cause: impl Into<BoxError>, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(cause.into()),
        }
    }

    /// The classification of this error
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Check the classification of this error
    pub fn has_kind(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// The message without the cause chain
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the retry engine may retry this error
    pub fn can_auto_retry(&self) -> bool {
        self.kind.can_auto_retry()
    }

    /// Create a pending error
    pub fn pending(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Pending, message)
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create a locked error
    pub fn locked(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Locked, message)
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Create an invalid grant error
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidGrant, message)
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    /// Create a transient error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    /// Create a bad argument error
    pub fn bad_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadArgument, message)
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// Create a bug error
    pub fn bug(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Bug, message)
    }

    /// Create an unidentified error
    pub fn unidentified(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unidentified, message)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::AccessDenied,
                        std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::BrokenPipe => ErrorKind::Connection,
            std::io::ErrorKind::Interrupted
            | std::io::ErrorKind::WouldBlock
            | std::io::ErrorKind::TimedOut => {
                ErrorKind::Transient
            }
            _ => ErrorKind::Io,
        };
        Self::wrap(kind, err, "IO error")
    }
}

impl From<serde_yaml_ng::Error> for Error {
    fn from(err: serde_yaml_ng::Error) -> Self {
        Self::wrap(ErrorKind::Config, err, "YAML parsing error")
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::wrap(ErrorKind::BadArgument, err, "JSON parsing error")
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::wrap(ErrorKind::BadArgument, err, "invalid URL")
    }
}

//! Unified application error types for ClaimGate.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested resource, claim, or ledger entry was not found.
    NotFound,
    /// Input validation failed.
    Validation,
    /// An optimistic version check failed; the caller should reload and retry.
    Conflict,
    /// A distributed lock could not be acquired within the wait time.
    LockTimeout,
    /// The resource's capacity is genuinely gone for this attempt.
    Exhausted,
    /// The resource is not active at the requested time.
    OutOfWindow,
    /// The claim has already been used.
    AlreadyUsed,
    /// The claim or ledger entry has already been cancelled/reversed.
    AlreadyCancelled,
    /// The requester's balance is smaller than the requested amount.
    InsufficientBalance,
    /// A database error occurred.
    Database,
    /// A cache error occurred.
    Cache,
    /// A lock provider error occurred (distinct from a timed-out acquire).
    Lock,
    /// A message broker error occurred.
    Broker,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An internal error occurred.
    Internal,
    /// The service is temporarily unavailable.
    ServiceUnavailable,
}

impl ErrorKind {
    /// Whether the caller may reasonably retry the operation.
    ///
    /// `LockTimeout` means "too busy, back off and try again shortly";
    /// `Conflict` means "reload the record and retry"; the infra kinds are
    /// transient by nature. Everything else is a definitive rejection.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LockTimeout
                | Self::Conflict
                | Self::Cache
                | Self::Lock
                | Self::Broker
                | Self::ServiceUnavailable
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::LockTimeout => write!(f, "LOCK_TIMEOUT"),
            Self::Exhausted => write!(f, "EXHAUSTED"),
            Self::OutOfWindow => write!(f, "OUT_OF_WINDOW"),
            Self::AlreadyUsed => write!(f, "ALREADY_USED"),
            Self::AlreadyCancelled => write!(f, "ALREADY_CANCELLED"),
            Self::InsufficientBalance => write!(f, "INSUFFICIENT_BALANCE"),
            Self::Database => write!(f, "DATABASE"),
            Self::Cache => write!(f, "CACHE"),
            Self::Lock => write!(f, "LOCK"),
            Self::Broker => write!(f, "BROKER"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::ServiceUnavailable => write!(f, "SERVICE_UNAVAILABLE"),
        }
    }
}

/// The unified application error used throughout ClaimGate.
///
/// All crate-specific errors are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls. This provides a single error type for
/// the entire application boundary.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a conflict error (optimistic version mismatch).
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create a lock-timeout error.
    pub fn lock_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LockTimeout, message)
    }

    /// Create an exhausted-capacity error.
    pub fn exhausted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Exhausted, message)
    }

    /// Create an out-of-window error.
    pub fn out_of_window(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::OutOfWindow, message)
    }

    /// Create an already-used error.
    pub fn already_used(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyUsed, message)
    }

    /// Create an already-cancelled error.
    pub fn already_cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyCancelled, message)
    }

    /// Create an insufficient-balance error.
    pub fn insufficient_balance(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InsufficientBalance, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cache, message)
    }

    /// Create a lock provider error.
    pub fn lock(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Lock, message)
    }

    /// Create a broker error.
    pub fn broker(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Broker, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a service-unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    /// Whether the caller may reasonably retry this error.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Internal, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

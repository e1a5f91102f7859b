//! Domain error model.

use serde::Serialize;
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Each variant is one kind of the public failure taxonomy. The message is
/// meant for callers and must not carry internal detail. Infrastructure
/// failures (store down, driver errors) belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed input, or an operation attempted against an invalid state.
    #[error("{0}")]
    BadRequest(String),

    /// Caller identity missing, invalid or expired.
    #[error("{0}")]
    Unauthorized(String),

    /// Caller is authenticated but lacks rights over the target.
    #[error("{0}")]
    Forbidden(String),

    /// Referenced entity does not exist within the caller's scope.
    #[error("{0}")]
    NotFound(String),

    /// A collaborator (AI, billing) failed or timed out.
    #[error("{0}")]
    ExternalService(String),
}

/// Stable, machine-readable name of a failure kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    ExternalServiceFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ExternalServiceFailure => "external_service_failure",
        }
    }
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::BadRequest(format!("invalid identifier: {}", msg.into()))
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn external(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::BadRequest(_) => ErrorKind::BadRequest,
            DomainError::Unauthorized(_) => ErrorKind::Unauthorized,
            DomainError::Forbidden(_) => ErrorKind::Forbidden,
            DomainError::NotFound(_) => ErrorKind::NotFound,
            DomainError::ExternalService(_) => ErrorKind::ExternalServiceFailure,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            DomainError::BadRequest(m)
            | DomainError::Unauthorized(m)
            | DomainError::Forbidden(m)
            | DomainError::NotFound(m)
            | DomainError::ExternalService(m) => m,
        }
    }
}

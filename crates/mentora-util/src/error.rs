//! Error types for mentora

use thiserror::Error;

/// Core error type for mentora operations
///
/// The first four variants are the caller-facing kinds: each carries the
/// specific reason so that a rejected transition is never silently coerced
/// into a different state. Failures of live-access collaborators never
/// appear here; they surface as the join gate's Error state.
#[derive(Debug, Error)]
pub enum MentoraError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl MentoraError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Short machine-readable tag for structured logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Config(_) => "config",
            Self::Store(_) => "store",
        }
    }
}

pub type Result<T> = std::result::Result<T, MentoraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_reason() {
        let err = MentoraError::conflict("booking status changed");
        assert_eq!(err.to_string(), "Conflict: booking status changed");
        assert_eq!(err.code(), "conflict");
    }
}

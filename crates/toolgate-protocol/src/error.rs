//! Error types for the tool coordinator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a tool definition is rejected at registration time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("tool already registered: {0}")]
    DuplicateName(String),
    #[error("tool name must not be empty")]
    EmptyName,
    #[error("invalid tool name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },
    #[error("tool {0} has an empty description")]
    EmptyDescription(String),
    #[error("tool {0} has no handler")]
    MissingHandler(String),
    #[error("tool {name} has an invalid input schema: {reason}")]
    InvalidSchema { name: String, reason: String },
    #[error("tool {0} cannot depend on itself")]
    SelfDependency(String),
    #[error("tool {name} declares dependency group #{index} without dependencies")]
    EmptyDependencyGroup { name: String, index: usize },
}

/// Errors surfaced synchronously by coordinator operations.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("tool not found: {0}")]
    UnknownTool(String),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error("pending call not found: {0}")]
    PendingCallNotFound(String),
    #[error("pending call already resolved: {0}")]
    PendingCallAlreadyResolved(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl From<serde_json::Error> for CoordinatorError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

/// Convenience result type for coordinator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Failure captured inside an [`crate::ExecutionResult`].
///
/// Everything downstream of handler invocation ends up here instead of being
/// returned as `Err`, so callers never abort on a tool failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionError {
    #[error("input validation failed: {message}")]
    Validation { message: String },
    #[error("handler failed: {message}")]
    Handler { message: String },
    #[error("execution timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
    #[error("tool not found: {name}")]
    UnknownTool { name: String },
    /// `missing` is empty when only a group condition failed; `reason`
    /// always says what blocked the call.
    #[error("dependencies not satisfied: {reason}")]
    DependencyUnmet {
        missing: Vec<String>,
        reason: String,
    },
    #[error("external result not received within {after_ms}ms")]
    ExternalTimeout { after_ms: u64 },
    #[error("external execution failed: {message}")]
    External { message: String },
}

impl ExecutionError {
    /// Whether the engine may retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Handler { .. } | Self::Timeout { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::ExternalTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_handler_and_timeout_errors_are_retryable() {
        assert!(
            ExecutionError::Handler {
                message: "boom".into()
            }
            .is_retryable()
        );
        assert!(ExecutionError::Timeout { after_ms: 10 }.is_retryable());
        assert!(
            !ExecutionError::Validation {
                message: "bad".into()
            }
            .is_retryable()
        );
        assert!(!ExecutionError::ExternalTimeout { after_ms: 10 }.is_retryable());
    }

    #[test]
    fn execution_error_is_tagged_by_kind() {
        let json = serde_json::to_string(&ExecutionError::Timeout { after_ms: 250 }).unwrap();
        assert_eq!(json, r#"{"kind":"timeout","after_ms":250}"#);
    }

    #[test]
    fn dependency_unmet_carries_the_blocking_reason() {
        let error = ExecutionError::DependencyUnmet {
            missing: vec!["a".into(), "b".into()],
            reason: "requires a, b".into(),
        };
        assert_eq!(error.to_string(), "dependencies not satisfied: requires a, b");
    }

    #[test]
    fn registration_error_converts_into_coordinator_error() {
        let error: CoordinatorError = RegistrationError::DuplicateName("echo".into()).into();
        assert_eq!(error.to_string(), "tool already registered: echo");
    }
}

//! Core error types.

use thiserror::Error;

/// Malformed trigger specification.
///
/// Raised at registration time so bad jobs never enter the live scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerSpecError {
    /// Cron expression failed to parse.
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    /// Fixed interval of zero duration.
    #[error("interval must be greater than zero")]
    ZeroInterval,
}

/// Invocation target resolution failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    /// Target string is not of the form `module:function`.
    #[error("invalid invocation target '{0}': expected 'module:function'")]
    BadTarget(String),

    /// No module with this name has been registered.
    #[error("module '{0}' is not registered")]
    ModuleNotFound(String),

    /// The module exists but does not export this function.
    #[error("function '{function}' not found in module '{module}'")]
    FunctionNotFound { module: String, function: String },
}

/// Failure raised by the invoked callable itself.
///
/// Caught at the dispatch boundary and converted into a FAILURE log entry;
/// never propagated out of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ExecutionError(pub String);

impl ExecutionError {
    /// Create an execution error from any displayable value.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<String> for ExecutionError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for ExecutionError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

//! Execution requests and results.

use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Per-call overrides. Unset fields fall back to the engine defaults.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
    pub retry_base_delay: Option<Duration>,
    pub context: Option<ExecutionContext>,
    /// `Some(false)` bypasses cache reads and writes for this call.
    pub use_cache: Option<bool>,
}

impl ExecutionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = Some(delay);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = Some(false);
        self
    }

    pub fn context_or_default(&self) -> ExecutionContext {
        self.context.clone().unwrap_or_default()
    }
}

/// Outcome of one execution, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub tool_name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ExecutionError>,
    pub execution_time_ms: u64,
    #[serde(default)]
    pub from_cache: bool,
    /// Handler invocations made, including retries.
    #[serde(default)]
    pub attempts: u32,
}

impl ExecutionResult {
    pub fn success(tool_name: impl Into<String>, data: Value, execution_time_ms: u64) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            data: Some(data),
            error: None,
            execution_time_ms,
            from_cache: false,
            attempts: 1,
        }
    }

    pub fn failure(
        tool_name: impl Into<String>,
        error: ExecutionError,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            data: None,
            error: Some(error),
            execution_time_ms,
            from_cache: false,
            attempts: 0,
        }
    }

    pub fn cached(tool_name: impl Into<String>, data: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            data: Some(data),
            error: None,
            execution_time_ms: 0,
            from_cache: true,
            attempts: 0,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Short description of the failure, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

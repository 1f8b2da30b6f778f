//! Tool calls handed to an external actor.

use crate::context::ExecutionContext;
use crate::ids::PendingCallId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    Pending,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingToolCall {
    pub id: PendingCallId,
    pub tool_name: String,
    pub args: Value,
    pub status: PendingStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub context: ExecutionContext,
}

impl PendingToolCall {
    pub fn new(tool_name: impl Into<String>, args: Value, context: ExecutionContext) -> Self {
        Self {
            id: PendingCallId::default(),
            tool_name: tool_name.into(),
            args,
            status: PendingStatus::Pending,
            created_at: Utc::now(),
            context,
        }
    }
}

/// Result reported back by the external actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExternalResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_pending_call_starts_pending_with_fresh_id() {
        let a = PendingToolCall::new("deploy", json!({}), ExecutionContext::new());
        let b = PendingToolCall::new("deploy", json!({}), ExecutionContext::new());
        assert_eq!(a.status, PendingStatus::Pending);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn external_result_parses_minimal_failure() {
        let result: ExternalResult =
            serde_json::from_value(json!({ "success": false, "error": "denied" })).unwrap();
        assert_eq!(result, ExternalResult::err("denied"));
    }
}

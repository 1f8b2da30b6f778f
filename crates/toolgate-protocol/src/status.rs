//! Failure-tracking status, independent of dependency availability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    #[default]
    Available,
    Unavailable,
    Failed,
    Maintenance,
}

impl ToolStatus {
    pub fn is_usable(self) -> bool {
        matches!(self, Self::Available)
    }
}

impl fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Available => "available",
            Self::Unavailable => "unavailable",
            Self::Failed => "failed",
            Self::Maintenance => "maintenance",
        };
        f.write_str(name)
    }
}

/// Status entry for one tool, exported verbatim for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolStatusInfo {
    pub tool_name: String,
    pub status: ToolStatus,
    pub consecutive_failures: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_success_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failure_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub should_rebind: bool,
    #[serde(default)]
    pub reason: String,
}

impl ToolStatusInfo {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            status: ToolStatus::Available,
            consecutive_failures: 0,
            last_success_time: None,
            last_failure_time: None,
            should_rebind: false,
            reason: String::new(),
        }
    }
}

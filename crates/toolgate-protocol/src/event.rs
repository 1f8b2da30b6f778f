//! Event taxonomy published on every coordinator state change.

use crate::context::ExecutionContext;
use crate::error::ExecutionError;
use crate::ids::{EventId, PendingCallId};
use crate::pending::PendingToolCall;
use crate::status::ToolStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Envelope around every published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEvent {
    pub event_id: EventId,
    pub timestamp: DateTime<Utc>,
    pub kind: ToolEventKind,
}

impl ToolEvent {
    pub fn new(kind: ToolEventKind) -> Self {
        Self {
            event_id: EventId::default(),
            timestamp: Utc::now(),
            kind,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    /// Tool the event concerns.
    pub fn tool_name(&self) -> &str {
        self.kind.tool_name()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolEventKind {
    #[serde(rename = "tool.registered")]
    Registered {
        tool_name: String,
        dependencies: Vec<String>,
        available: bool,
    },
    #[serde(rename = "tool.unregistered")]
    Unregistered { tool_name: String },
    #[serde(rename = "tool.executed")]
    Executed {
        tool_name: String,
        execution_time_ms: u64,
        from_cache: bool,
        attempts: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<ExecutionContext>,
    },
    #[serde(rename = "tool.failed")]
    Failed {
        tool_name: String,
        error: ExecutionError,
        attempts: u32,
    },
    #[serde(rename = "tool.availability.changed")]
    AvailabilityChanged {
        tool_name: String,
        available: bool,
        reason: String,
        #[serde(default)]
        missing_dependencies: Vec<String>,
    },
    #[serde(rename = "tool.status.changed")]
    StatusChanged {
        tool_name: String,
        previous: ToolStatus,
        status: ToolStatus,
        reason: String,
        consecutive_failures: u32,
    },
    #[serde(rename = "tool.rebind.scheduled")]
    RebindScheduled { tool_name: String, delay_ms: u64 },
    #[serde(rename = "tool.rebind.completed")]
    RebindCompleted { tool_name: String },
    #[serde(rename = "tool.call.pending")]
    CallPending { call: PendingToolCall },
    #[serde(rename = "tool.call.resolved")]
    CallResolved {
        call_id: PendingCallId,
        tool_name: String,
        success: bool,
    },
}

impl ToolEventKind {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Registered { .. } => EventType::Registered,
            Self::Unregistered { .. } => EventType::Unregistered,
            Self::Executed { .. } => EventType::Executed,
            Self::Failed { .. } => EventType::Failed,
            Self::AvailabilityChanged { .. } => EventType::AvailabilityChanged,
            Self::StatusChanged { .. } => EventType::StatusChanged,
            Self::RebindScheduled { .. } => EventType::RebindScheduled,
            Self::RebindCompleted { .. } => EventType::RebindCompleted,
            Self::CallPending { .. } => EventType::CallPending,
            Self::CallResolved { .. } => EventType::CallResolved,
        }
    }

    pub fn tool_name(&self) -> &str {
        match self {
            Self::Registered { tool_name, .. }
            | Self::Unregistered { tool_name }
            | Self::Executed { tool_name, .. }
            | Self::Failed { tool_name, .. }
            | Self::AvailabilityChanged { tool_name, .. }
            | Self::StatusChanged { tool_name, .. }
            | Self::RebindScheduled { tool_name, .. }
            | Self::RebindCompleted { tool_name }
            | Self::CallResolved { tool_name, .. } => tool_name,
            Self::CallPending { call } => &call.tool_name,
        }
    }
}

/// Discriminant used to subscribe to one kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "tool.registered")]
    Registered,
    #[serde(rename = "tool.unregistered")]
    Unregistered,
    #[serde(rename = "tool.executed")]
    Executed,
    #[serde(rename = "tool.failed")]
    Failed,
    #[serde(rename = "tool.availability.changed")]
    AvailabilityChanged,
    #[serde(rename = "tool.status.changed")]
    StatusChanged,
    #[serde(rename = "tool.rebind.scheduled")]
    RebindScheduled,
    #[serde(rename = "tool.rebind.completed")]
    RebindCompleted,
    #[serde(rename = "tool.call.pending")]
    CallPending,
    #[serde(rename = "tool.call.resolved")]
    CallResolved,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registered => "tool.registered",
            Self::Unregistered => "tool.unregistered",
            Self::Executed => "tool.executed",
            Self::Failed => "tool.failed",
            Self::AvailabilityChanged => "tool.availability.changed",
            Self::StatusChanged => "tool.status.changed",
            Self::RebindScheduled => "tool.rebind.scheduled",
            Self::RebindCompleted => "tool.rebind.completed",
            Self::CallPending => "tool.call.pending",
            Self::CallResolved => "tool.call.resolved",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

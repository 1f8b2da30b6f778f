//! # toolgate-protocol: shared contract for the tool coordinator
//!
//! Data model, error taxonomy, event taxonomy and configuration shared by
//! every toolgate crate.
//!
//! Carries no async runtime dependency.
//!
//! ## Module Overview
//!
//! - [`ids`]: Typed ID wrappers (ExecutionId, SessionId, PendingCallId, etc.)
//! - [`tool`]: ToolDefinition, ToolHandler, handler_fn
//! - [`dependency`]: DependencyGroup, Dependency, ContextCondition
//! - [`context`]: ExecutionContext
//! - [`execution`]: ExecutionOptions, ExecutionResult
//! - [`status`]: ToolStatus, ToolStatusInfo
//! - [`pending`]: PendingToolCall, ExternalResult
//! - [`event`]: ToolEvent + ToolEventKind taxonomy
//! - [`config`]: CoordinatorConfig and its sections
//! - [`error`]: RegistrationError, CoordinatorError, ExecutionError

pub mod config;
pub mod context;
pub mod dependency;
pub mod error;
pub mod event;
pub mod execution;
pub mod ids;
pub mod pending;
pub mod status;
pub mod tool;

// Re-export the most commonly used types at the crate root.
pub use config::{
    CacheConfig, CoordinatorConfig, ExecutionDefaults, OutsideConfig, StatusConfig, StrategyKind,
};
pub use context::ExecutionContext;
pub use dependency::{
    ContextCondition, Dependency, DependencyGroup, DependencyGroupSummary, DependencyKind,
    DependencySummary, GroupType,
};
pub use error::{CoordinatorError, CoordinatorResult, ExecutionError, RegistrationError};
pub use event::{EventType, ToolEvent, ToolEventKind};
pub use execution::{ExecutionOptions, ExecutionResult};
pub use ids::{EventId, ExecutionId, ListenerId, PendingCallId, SessionId, ThreadId};
pub use pending::{ExternalResult, PendingStatus, PendingToolCall};
pub use status::{ToolStatus, ToolStatusInfo};
pub use tool::{ToolDefinition, ToolDefinitionBuilder, ToolHandler, ToolSummary, handler_fn};

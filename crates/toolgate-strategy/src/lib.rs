//! Execution strategies.
//!
//! A strategy decides *where* a tool call runs. [`InternalStrategy`] runs the
//! handler in-process through the [`ExecutionEngine`]; [`OutsideStrategy`]
//! hands the call to an external actor and waits for it to report back.
//! Both feed outcomes through the same [`OutcomeReporter`].

pub mod outside;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use toolgate_engine::ExecutionEngine;
use toolgate_events::EventBus;
use toolgate_protocol::{
    ExecutionContext, ExecutionError, ExecutionOptions, ExecutionResult, PendingToolCall,
    StrategyKind, ToolDefinition, ToolEventKind,
};
use toolgate_status::StatusManager;
use tracing::{instrument, warn};

pub use outside::OutsideStrategy;

/// What a strategy produced for one call.
#[derive(Debug, Clone)]
pub enum StrategyOutcome {
    Completed(ExecutionResult),
    /// Dispatched externally without waiting for the result.
    Pending(PendingToolCall),
}

impl StrategyOutcome {
    pub fn result(&self) -> Option<&ExecutionResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Pending(_) => None,
        }
    }

    pub fn into_result(self) -> Option<ExecutionResult> {
        match self {
            Self::Completed(result) => Some(result),
            Self::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

#[async_trait]
pub trait ExecutionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn execute(
        &self,
        definition: Arc<ToolDefinition>,
        input: Value,
        options: ExecutionOptions,
    ) -> StrategyOutcome;
}

/// Publishes execution events and feeds outcomes to the status manager,
/// which in turn forwards successes to the registry.
#[derive(Clone)]
pub struct OutcomeReporter {
    status: StatusManager,
    events: EventBus,
}

impl OutcomeReporter {
    pub fn new(status: StatusManager, events: EventBus) -> Self {
        Self { status, events }
    }

    pub fn status(&self) -> &StatusManager {
        &self.status
    }

    /// Emit `tool.executed` or `tool.failed` without touching status.
    pub fn announce(&self, result: &ExecutionResult, context: &ExecutionContext) {
        let kind = match &result.error {
            None if result.success => ToolEventKind::Executed {
                tool_name: result.tool_name.clone(),
                execution_time_ms: result.execution_time_ms,
                from_cache: result.from_cache,
                attempts: result.attempts,
                context: Some(context.clone()),
            },
            error => ToolEventKind::Failed {
                tool_name: result.tool_name.clone(),
                error: error.clone().unwrap_or(ExecutionError::Handler {
                    message: "unknown failure".to_owned(),
                }),
                attempts: result.attempts,
            },
        };
        self.events.emit(kind);
    }

    /// Announce the outcome, then update the failure streak and history.
    pub fn report(&self, result: &ExecutionResult, context: &ExecutionContext) {
        self.announce(result, context);
        let outcome = if result.success {
            self.status
                .report_success(&result.tool_name, context)
                .map(|_| ())
        } else {
            let message = result
                .error_message()
                .unwrap_or_else(|| "unknown failure".to_owned());
            self.status
                .report_failure(&result.tool_name, &message)
                .map(|_| ())
        };
        if let Err(error) = outcome {
            warn!(tool = %result.tool_name, %error, "outcome not recorded");
        }
    }
}

/// Runs handlers in-process and reports inline.
pub struct InternalStrategy {
    engine: Arc<ExecutionEngine>,
    reporter: OutcomeReporter,
}

impl InternalStrategy {
    pub fn new(engine: Arc<ExecutionEngine>, reporter: OutcomeReporter) -> Self {
        Self { engine, reporter }
    }

    pub fn engine(&self) -> &Arc<ExecutionEngine> {
        &self.engine
    }
}

#[async_trait]
impl ExecutionStrategy for InternalStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Internal
    }

    #[instrument(name = "strategy.internal", skip_all, fields(tool = %definition.name))]
    async fn execute(
        &self,
        definition: Arc<ToolDefinition>,
        input: Value,
        options: ExecutionOptions,
    ) -> StrategyOutcome {
        let context = options.context_or_default();
        let result = self.engine.execute(&definition, input, &options).await;
        self.reporter.report(&result, &context);
        StrategyOutcome::Completed(result)
    }
}

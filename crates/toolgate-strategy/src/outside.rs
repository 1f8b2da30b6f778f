//! Calls executed by an actor outside the process.
//!
//! Each call becomes a [`PendingToolCall`] published on a dispatch channel.
//! The actor reports back through [`OutsideStrategy::resolve_external_result`],
//! which settles the call exactly once.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tokio::time::timeout;
use toolgate_events::EventBus;
use toolgate_protocol::{
    CoordinatorError, CoordinatorResult, ExecutionError, ExecutionOptions, ExecutionResult,
    ExternalResult, OutsideConfig, PendingCallId, PendingStatus, PendingToolCall, StrategyKind,
    ToolDefinition, ToolEventKind,
};
use tracing::{debug, info, instrument, warn};

use crate::{ExecutionStrategy, OutcomeReporter, StrategyOutcome};

struct PendingEntry {
    call: PendingToolCall,
    waiter: Option<oneshot::Sender<ExecutionResult>>,
    dispatched_at: Instant,
}

#[derive(Default)]
struct PendingTable {
    open: IndexMap<PendingCallId, PendingEntry>,
    /// Recently resolved ids, oldest first, capped at `resolved_history`.
    resolved: IndexSet<PendingCallId>,
}

impl PendingTable {
    fn remember_resolved(&mut self, call_id: PendingCallId, capacity: usize) {
        self.resolved.insert(call_id);
        while self.resolved.len() > capacity {
            self.resolved.shift_remove_index(0);
        }
    }
}

struct OutsideInner {
    config: OutsideConfig,
    table: Mutex<PendingTable>,
    dispatch: broadcast::Sender<PendingToolCall>,
    reporter: OutcomeReporter,
    events: EventBus,
}

#[derive(Clone)]
pub struct OutsideStrategy {
    inner: Arc<OutsideInner>,
}

impl OutsideStrategy {
    pub fn new(config: OutsideConfig, reporter: OutcomeReporter, events: EventBus) -> Self {
        let (dispatch, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(OutsideInner {
                config,
                table: Mutex::new(PendingTable::default()),
                dispatch,
                reporter,
                events,
            }),
        }
    }

    pub fn config(&self) -> &OutsideConfig {
        &self.inner.config
    }

    /// Calls dispatched after this point, for an external actor to run.
    pub fn subscribe_dispatch(&self) -> broadcast::Receiver<PendingToolCall> {
        self.inner.dispatch.subscribe()
    }

    /// Unresolved calls, oldest first.
    pub fn pending_calls(&self) -> Vec<PendingToolCall> {
        self.inner
            .table
            .lock()
            .open
            .values()
            .map(|entry| entry.call.clone())
            .collect()
    }

    fn dispatch(
        &self,
        call: &PendingToolCall,
        waiter: Option<oneshot::Sender<ExecutionResult>>,
    ) {
        self.inner.table.lock().open.insert(
            call.id.clone(),
            PendingEntry {
                call: call.clone(),
                waiter,
                dispatched_at: Instant::now(),
            },
        );
        self.inner.events.emit(ToolEventKind::CallPending { call: call.clone() });
        if self.inner.dispatch.send(call.clone()).is_err() {
            debug!(call_id = %call.id, "no dispatch subscribers");
        }
    }

    /// Settle a pending call with the actor's result.
    ///
    /// Unknown and already-resolved ids are rejected without side effects.
    #[instrument(skip(self, outcome), fields(success = outcome.success))]
    pub fn resolve_external_result(
        &self,
        call_id: &PendingCallId,
        outcome: ExternalResult,
    ) -> CoordinatorResult<ExecutionResult> {
        let entry = {
            let mut table = self.inner.table.lock();
            match table.open.shift_remove(call_id) {
                Some(entry) => {
                    table.remember_resolved(call_id.clone(), self.inner.config.resolved_history);
                    entry
                }
                None if table.resolved.contains(call_id) => {
                    return Err(CoordinatorError::PendingCallAlreadyResolved(
                        call_id.to_string(),
                    ));
                }
                None => return Err(CoordinatorError::PendingCallNotFound(call_id.to_string())),
            }
        };

        let PendingEntry {
            mut call,
            waiter,
            dispatched_at,
        } = entry;
        call.status = PendingStatus::Resolved;
        let elapsed = dispatched_at.elapsed().as_millis() as u64;
        let result = if outcome.success {
            ExecutionResult::success(&call.tool_name, outcome.data.unwrap_or(Value::Null), elapsed)
        } else {
            ExecutionResult::failure(
                &call.tool_name,
                ExecutionError::External {
                    message: outcome
                        .error
                        .unwrap_or_else(|| "external actor reported failure".to_owned()),
                },
                elapsed,
            )
            .with_attempts(1)
        };

        info!(tool = %call.tool_name, elapsed_ms = elapsed, "external call resolved");
        self.inner.reporter.report(&result, &call.context);
        self.inner.events.emit(ToolEventKind::CallResolved {
            call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            success: result.success,
        });

        if let Some(waiter) = waiter
            && waiter.send(result.clone()).is_err()
        {
            debug!(call_id = %call.id, "caller stopped waiting before resolution");
        }
        Ok(result)
    }
}

#[async_trait]
impl ExecutionStrategy for OutsideStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Outside
    }

    #[instrument(name = "strategy.outside", skip_all, fields(tool = %definition.name))]
    async fn execute(
        &self,
        definition: Arc<ToolDefinition>,
        input: Value,
        options: ExecutionOptions,
    ) -> StrategyOutcome {
        let call = PendingToolCall::new(&definition.name, input, options.context_or_default());

        if !self.inner.config.wait_for_result {
            self.dispatch(&call, None);
            return StrategyOutcome::Pending(call);
        }

        let (sender, receiver) = oneshot::channel();
        self.dispatch(&call, Some(sender));

        let limit = options.timeout.unwrap_or_else(|| self.inner.config.timeout());
        match timeout(limit, receiver).await {
            Ok(Ok(result)) => StrategyOutcome::Completed(result),
            Ok(Err(_)) => StrategyOutcome::Completed(ExecutionResult::failure(
                &definition.name,
                ExecutionError::External {
                    message: "pending call dropped".to_owned(),
                },
                limit.as_millis() as u64,
            )),
            Err(_) => {
                // The record stays open so the actor can still settle it.
                let after_ms = limit.as_millis() as u64;
                warn!(call_id = %call.id, after_ms, "external result not received in time");
                let result = ExecutionResult::failure(
                    &definition.name,
                    ExecutionError::ExternalTimeout { after_ms },
                    after_ms,
                );
                self.inner.reporter.announce(&result, &call.context);
                StrategyOutcome::Completed(result)
            }
        }
    }
}

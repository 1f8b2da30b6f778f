//! # toolgate-kernel
//!
//! Wires the registry, status manager, execution engine and strategies
//! around one [`EventBus`] and exposes them as a single [`ToolCoordinator`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use toolgate_cache::{CacheStats, ExecutionCache};
use toolgate_engine::ExecutionEngine;
use toolgate_events::EventBus;
use toolgate_protocol::{
    CacheConfig, CoordinatorConfig, CoordinatorError, CoordinatorResult, EventType,
    ExecutionContext, ExecutionDefaults, ExecutionError, ExecutionOptions, ExecutionResult,
    ExternalResult, ListenerId, OutsideConfig, PendingCallId, PendingToolCall, RegistrationError,
    StatusConfig, StrategyKind, ToolDefinition, ToolEvent, ToolStatus, ToolStatusInfo,
};
use toolgate_registry::{
    AvailabilityChange, DependencyGraphSnapshot, ExecutionStats, RegistrationStatus,
    ToolAvailability, ToolRegistry,
};
use toolgate_status::StatusManager;
use toolgate_strategy::{ExecutionStrategy, InternalStrategy, OutcomeReporter, OutsideStrategy};
use tracing::{info, instrument, warn};

pub use toolgate_registry::ResetScope;
pub use toolgate_strategy::StrategyOutcome;

/// Read a JSON config file. Missing keys fall back to defaults.
pub async fn load_config(path: impl AsRef<Path>) -> Result<CoordinatorConfig> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    Ok(config)
}

#[derive(Debug, Clone)]
pub struct CoordinatorBuilder {
    config: CoordinatorConfig,
    event_buffer: usize,
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinatorBuilder {
    pub fn new() -> Self {
        Self {
            config: CoordinatorConfig::default(),
            event_buffer: 1024,
        }
    }

    pub fn config(mut self, config: CoordinatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn default_strategy(mut self, kind: StrategyKind) -> Self {
        self.config.default_strategy = kind;
        self
    }

    pub fn cache_limits(mut self, max_size: usize, ttl: Duration) -> Self {
        self.config.cache = CacheConfig {
            max_size,
            ttl_ms: ttl.as_millis() as u64,
        };
        self
    }

    pub fn execution_defaults(mut self, defaults: ExecutionDefaults) -> Self {
        self.config.execution = defaults;
        self
    }

    pub fn status_config(mut self, status: StatusConfig) -> Self {
        self.config.status = status;
        self
    }

    pub fn outside_config(mut self, outside: OutsideConfig) -> Self {
        self.config.outside = outside;
        self
    }

    pub fn enforce_availability(mut self, enforce: bool) -> Self {
        self.config.enforce_availability = enforce;
        self
    }

    /// Capacity of the broadcast stream behind [`ToolCoordinator::subscribe_events`].
    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity;
        self
    }

    pub fn build(self) -> ToolCoordinator {
        let config = self.config;
        let events = EventBus::new(self.event_buffer);

        let registry = Arc::new(ToolRegistry::new(events.clone()));
        let status = StatusManager::new(config.status.clone(), registry.clone(), events.clone());
        let reporter = OutcomeReporter::new(status.clone(), events.clone());

        let cache = Arc::new(ExecutionCache::new(&config.cache));
        let engine = Arc::new(ExecutionEngine::new(cache, config.execution.clone()));
        let internal = InternalStrategy::new(engine.clone(), reporter.clone());
        let outside = OutsideStrategy::new(config.outside.clone(), reporter, events.clone());

        info!(
            strategy = %config.default_strategy,
            enforce_availability = config.enforce_availability,
            "coordinator ready"
        );

        ToolCoordinator {
            inner: Arc::new(CoordinatorInner {
                default_strategy: Mutex::new(config.default_strategy),
                config,
                events,
                registry,
                status,
                engine,
                internal,
                outside,
            }),
        }
    }
}

struct CoordinatorInner {
    config: CoordinatorConfig,
    default_strategy: Mutex<StrategyKind>,
    events: EventBus,
    registry: Arc<ToolRegistry>,
    status: StatusManager,
    engine: Arc<ExecutionEngine>,
    internal: InternalStrategy,
    outside: OutsideStrategy,
}

/// Public facade over one coordinator instance. Cheap to clone.
#[derive(Clone)]
pub struct ToolCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl ToolCoordinator {
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.inner.registry
    }

    pub fn status_manager(&self) -> &StatusManager {
        &self.inner.status
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    // Registration

    pub fn register(&self, definition: ToolDefinition) -> Result<(), RegistrationError> {
        self.inner.registry.register(definition)
    }

    /// Remove a tool along with its cached results and status entry.
    pub fn unregister(&self, tool_name: &str) -> CoordinatorResult<()> {
        self.inner.registry.unregister(tool_name)?;
        self.inner.engine.forget_tool(tool_name);
        self.inner.status.forget(tool_name);
        Ok(())
    }

    // Availability and diagnostics

    pub fn availability(
        &self,
        tool_name: &str,
        context: Option<&ExecutionContext>,
    ) -> ToolAvailability {
        self.inner.registry.availability(tool_name, context)
    }

    /// Tools whose dependencies are met for a caller in `context` and whose
    /// status is usable. Anything listed here passes the `invoke` gate when
    /// invoked with the same context.
    pub fn available_tools(&self, context: Option<&ExecutionContext>) -> Vec<Arc<ToolDefinition>> {
        self.inner
            .registry
            .available_tools(context)
            .into_iter()
            .filter(|definition| self.inner.status.is_usable(&definition.name))
            .collect()
    }

    pub fn registration_statuses(&self) -> Vec<RegistrationStatus> {
        self.inner.registry.all_statuses()
    }

    pub fn dependency_graph(&self) -> DependencyGraphSnapshot {
        self.inner.registry.dependency_graph()
    }

    pub fn execution_path(&self, target: &str) -> Option<Vec<String>> {
        self.inner.registry.execution_path(target)
    }

    pub fn execution_stats(&self) -> ExecutionStats {
        self.inner.registry.execution_stats()
    }

    /// Record an execution that happened outside the coordinator.
    pub fn record_execution(
        &self,
        tool_name: &str,
        context: &ExecutionContext,
    ) -> CoordinatorResult<Vec<AvailabilityChange>> {
        self.inner.registry.record_execution(tool_name, context)
    }

    pub fn reset_executions(&self, scope: ResetScope) -> CoordinatorResult<Vec<AvailabilityChange>> {
        self.inner.registry.reset(scope)
    }

    // Execution

    pub fn set_default_strategy(&self, kind: StrategyKind) {
        let previous = std::mem::replace(&mut *self.inner.default_strategy.lock(), kind);
        if previous != kind {
            info!(%previous, strategy = %kind, "default strategy changed");
        }
    }

    pub fn default_strategy(&self) -> StrategyKind {
        *self.inner.default_strategy.lock()
    }

    pub async fn invoke(
        &self,
        tool_name: &str,
        input: Value,
        options: ExecutionOptions,
    ) -> StrategyOutcome {
        self.invoke_with(self.default_strategy(), tool_name, input, options)
            .await
    }

    #[instrument(name = "tool.invoke", skip(self, input, options))]
    pub async fn invoke_with(
        &self,
        strategy: StrategyKind,
        tool_name: &str,
        input: Value,
        options: ExecutionOptions,
    ) -> StrategyOutcome {
        let Some(definition) = self.inner.registry.get(tool_name) else {
            warn!("invocation of unregistered tool");
            return StrategyOutcome::Completed(ExecutionResult::failure(
                tool_name,
                ExecutionError::UnknownTool {
                    name: tool_name.to_owned(),
                },
                0,
            ));
        };

        if let Err(error) = self.inner.registry.mark_used(tool_name) {
            warn!(%error, "usage not counted");
        }

        let availability = self
            .inner
            .registry
            .availability(tool_name, options.context.as_ref());
        if !availability.available {
            if self.inner.config.enforce_availability {
                warn!(reason = %availability.reason, "invocation refused");
                return StrategyOutcome::Completed(ExecutionResult::failure(
                    tool_name,
                    ExecutionError::DependencyUnmet {
                        missing: availability.missing_dependencies,
                        reason: availability.reason,
                    },
                    0,
                ));
            }
            warn!(reason = %availability.reason, "invoking unavailable tool");
        }

        match strategy {
            StrategyKind::Internal => {
                self.inner
                    .internal
                    .execute(definition, input, options)
                    .await
            }
            StrategyKind::Outside => self.inner.outside.execute(definition, input, options).await,
        }
    }

    /// Settle an outside call. Works whatever the current default strategy.
    pub fn resolve_external_result(
        &self,
        call_id: &PendingCallId,
        outcome: ExternalResult,
    ) -> CoordinatorResult<ExecutionResult> {
        self.inner.outside.resolve_external_result(call_id, outcome)
    }

    pub fn pending_calls(&self) -> Vec<PendingToolCall> {
        self.inner.outside.pending_calls()
    }

    pub fn subscribe_dispatch(&self) -> broadcast::Receiver<PendingToolCall> {
        self.inner.outside.subscribe_dispatch()
    }

    // Events

    pub fn on_event<F>(&self, event_type: EventType, listener: F) -> ListenerId
    where
        F: Fn(&ToolEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.events.on(event_type, listener)
    }

    pub fn on_any_event<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ToolEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.events.on_any(listener)
    }

    pub fn off_event(&self, id: ListenerId) -> bool {
        self.inner.events.off(id)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ToolEvent> {
        self.inner.events.subscribe()
    }

    // Status

    pub fn tool_status(&self, tool_name: &str) -> Option<ToolStatusInfo> {
        self.inner.status.status(tool_name)
    }

    pub fn tool_statuses(&self) -> Vec<ToolStatusInfo> {
        self.inner.status.all_statuses()
    }

    pub fn set_tool_status(
        &self,
        tool_name: &str,
        status: ToolStatus,
        reason: impl Into<String>,
    ) -> CoordinatorResult<ToolStatusInfo> {
        self.inner.status.set_status(tool_name, status, reason)
    }

    pub fn reset_tool_status(&self, tool_name: &str) -> CoordinatorResult<ToolStatusInfo> {
        self.inner.status.reset(tool_name)
    }

    pub fn sweep_status(&self) -> Vec<String> {
        self.inner.status.sweep()
    }

    pub fn tools_needing_rebind(&self) -> Vec<String> {
        self.inner.status.tools_needing_rebind()
    }

    pub fn acknowledge_rebind(&self, tool_name: &str) -> bool {
        self.inner.status.acknowledge_rebind(tool_name)
    }

    pub fn serialize_status(&self) -> CoordinatorResult<String> {
        Ok(serde_json::to_string_pretty(
            &self.inner.status.export_records(),
        )?)
    }

    /// Replace the status table from [`serialize_status`](Self::serialize_status)
    /// output. Returns the number of restored records.
    pub fn restore_status(&self, json: &str) -> CoordinatorResult<usize> {
        let records: Vec<ToolStatusInfo> = serde_json::from_str(json)?;
        if let Some(unknown) = records
            .iter()
            .find(|record| !self.inner.registry.contains(&record.tool_name))
        {
            return Err(CoordinatorError::UnknownTool(unknown.tool_name.clone()));
        }
        let count = records.len();
        self.inner.status.restore_records(records);
        Ok(count)
    }

    // Cache

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.engine.cache().stats()
    }

    pub fn clear_cache(&self) {
        self.inner.engine.cache().clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use anyhow::Result;
    use chrono::{TimeDelta, Utc};
    use parking_lot::Mutex;
    use serde_json::json;
    use toolgate_protocol::{
        ContextCondition, Dependency, DependencyGroup, EventType, ExecutionContext,
        ExecutionError, ExecutionOptions, ExternalResult, OutsideConfig, StatusConfig,
        StrategyKind, ToolDefinition, ToolStatus, handler_fn,
    };
    use tracing::span;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    use crate::{CoordinatorBuilder, ResetScope, ToolCoordinator, load_config};

    fn echo(name: &str) -> ToolDefinition {
        ToolDefinition::builder(name)
            .description(format!("{name} echoes its input"))
            .handler(handler_fn(|input, _context| async move { Ok(input) }))
            .build()
            .expect("valid definition")
    }

    fn dependent(name: &str, group: DependencyGroup) -> ToolDefinition {
        ToolDefinition::builder(name)
            .description(format!("{name} runs after its dependencies"))
            .dependency_group(group)
            .handler(handler_fn(|input, _context| async move { Ok(input) }))
            .build()
            .expect("valid definition")
    }

    fn failing(name: &str) -> ToolDefinition {
        ToolDefinition::builder(name)
            .description("always fails")
            .handler(handler_fn(|_input, _context| async move {
                Err::<serde_json::Value, _>(anyhow::anyhow!("upstream unavailable"))
            }))
            .build()
            .expect("valid definition")
    }

    #[tokio::test]
    async fn dependent_unlocks_after_dependency_runs() -> Result<()> {
        let coordinator = ToolCoordinator::builder().build();
        coordinator.register(echo("a"))?;
        coordinator.register(dependent("b", DependencyGroup::requires(["a"])))?;

        assert!(!coordinator.availability("b", None).available);
        let names: Vec<_> = coordinator
            .available_tools(None)
            .iter()
            .map(|definition| definition.name.clone())
            .collect();
        assert_eq!(names, vec!["a"]);

        let a = coordinator
            .invoke("a", json!({ "x": 1 }), ExecutionOptions::new())
            .await;
        assert!(a.result().is_some_and(|result| result.success));
        assert!(coordinator.availability("b", None).available);

        let b = coordinator
            .invoke("b", json!({ "y": 2 }), ExecutionOptions::new())
            .await
            .into_result()
            .expect("completed");
        assert!(b.success);
        assert_eq!(b.data, Some(json!({ "y": 2 })));
        Ok(())
    }

    #[tokio::test]
    async fn unavailable_tool_is_refused_when_enforced() -> Result<()> {
        let coordinator = ToolCoordinator::builder().build();
        coordinator.register(dependent("b", DependencyGroup::requires(["a"])))?;

        let result = coordinator
            .invoke("b", json!({}), ExecutionOptions::new())
            .await
            .into_result()
            .expect("completed");
        assert_eq!(
            result.error,
            Some(ExecutionError::DependencyUnmet {
                missing: vec!["a".to_owned()],
                reason: "requires a".to_owned(),
            })
        );
        assert_eq!(coordinator.execution_stats().total_executions, 0);

        let lenient = ToolCoordinator::builder().enforce_availability(false).build();
        lenient.register(dependent("b", DependencyGroup::requires(["a"])))?;
        let result = lenient
            .invoke("b", json!({}), ExecutionOptions::new())
            .await
            .into_result()
            .expect("completed");
        assert!(result.success);
        Ok(())
    }

    #[tokio::test]
    async fn listed_tools_pass_the_invoke_gate_for_the_same_context() -> Result<()> {
        let coordinator = ToolCoordinator::builder().build();
        coordinator.register(echo("a"))?;
        coordinator.register(dependent(
            "b",
            DependencyGroup::requires(["a"])
                .when(ContextCondition::metadata_equals("mode", "write")),
        ))?;
        let write = ExecutionContext::new().with_metadata("mode", "write");
        coordinator
            .invoke("a", json!({}), ExecutionOptions::new().with_context(write.clone()))
            .await;

        let listed = |context: Option<&ExecutionContext>| -> Vec<String> {
            coordinator
                .available_tools(context)
                .iter()
                .map(|definition| definition.name.clone())
                .collect()
        };
        assert_eq!(listed(None), vec!["a"]);
        assert_eq!(listed(Some(&write)), vec!["a", "b"]);

        let refused = coordinator
            .invoke("b", json!({}), ExecutionOptions::new())
            .await
            .into_result()
            .expect("completed");
        assert_eq!(
            refused.error,
            Some(ExecutionError::DependencyUnmet {
                missing: Vec::new(),
                reason: "group condition `metadata.mode == \"write\"` not met".to_owned(),
            })
        );

        let allowed = coordinator
            .invoke("b", json!({ "ok": true }), ExecutionOptions::new().with_context(write))
            .await
            .into_result()
            .expect("completed");
        assert!(allowed.success);
        Ok(())
    }

    /// Records the name of every span opened while installed.
    #[derive(Clone, Default)]
    struct SpanNames(Arc<Mutex<Vec<&'static str>>>);

    impl<S: tracing::Subscriber> Layer<S> for SpanNames {
        fn on_new_span(&self, attrs: &span::Attributes<'_>, _id: &span::Id, _ctx: Context<'_, S>) {
            self.0.lock().push(attrs.metadata().name());
        }
    }

    #[tokio::test]
    async fn invocations_run_inside_named_spans() -> Result<()> {
        let names = SpanNames::default();
        let _guard = tracing::subscriber::set_default(
            tracing_subscriber::registry().with(names.clone()),
        );
        let coordinator = ToolCoordinator::builder().build();
        coordinator.register(echo("a"))?;
        coordinator
            .invoke("a", json!({}), ExecutionOptions::new())
            .await;

        let seen = names.0.lock().clone();
        assert!(seen.contains(&"tool.invoke"), "spans: {seen:?}");
        assert!(seen.contains(&"tool.execute"), "spans: {seen:?}");
        Ok(())
    }

    #[tokio::test]
    async fn unknown_tool_yields_failed_result() {
        let coordinator = ToolCoordinator::builder().build();
        let result = coordinator
            .invoke("ghost", json!({}), ExecutionOptions::new())
            .await
            .into_result()
            .expect("completed");
        assert!(!result.success);
        assert_eq!(
            result.error,
            Some(ExecutionError::UnknownTool {
                name: "ghost".to_owned()
            })
        );
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache_until_ttl() -> Result<()> {
        let coordinator = ToolCoordinator::builder()
            .cache_limits(10, Duration::from_millis(40))
            .build();
        coordinator.register(echo("echo"))?;

        let first = coordinator
            .invoke("echo", json!({ "a": 1 }), ExecutionOptions::new())
            .await
            .into_result()
            .expect("completed");
        let second = coordinator
            .invoke("echo", json!({ "a": 1 }), ExecutionOptions::new())
            .await
            .into_result()
            .expect("completed");
        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(first.data, second.data);

        tokio::time::sleep(Duration::from_millis(80)).await;
        let third = coordinator
            .invoke("echo", json!({ "a": 1 }), ExecutionOptions::new())
            .await
            .into_result()
            .expect("completed");
        assert!(!third.from_cache);
        assert_eq!(coordinator.cache_stats().hits, 1);

        coordinator.clear_cache();
        assert_eq!(coordinator.cache_stats().entries, 0);
        Ok(())
    }

    #[tokio::test]
    async fn repeated_failures_trip_and_hide_the_tool() -> Result<()> {
        let coordinator = ToolCoordinator::builder()
            .status_config(StatusConfig {
                failure_threshold: 3,
                failure_duration_ms: 50,
                rebind_delay_ms: 600_000,
            })
            .build();
        coordinator.register(failing("flaky"))?;

        for _ in 0..3 {
            coordinator
                .invoke("flaky", json!({}), ExecutionOptions::new())
                .await;
        }
        let info = coordinator.tool_status("flaky").expect("status entry");
        assert_eq!(info.status, ToolStatus::Failed);
        assert!(coordinator.available_tools(None).is_empty());
        assert_eq!(coordinator.tools_needing_rebind(), vec!["flaky"]);

        let last_failure = info.last_failure_time.expect("failure recorded");
        assert!(
            coordinator
                .status_manager()
                .sweep_at(last_failure + TimeDelta::milliseconds(10))
                .is_empty()
        );
        let recovered = coordinator
            .status_manager()
            .sweep_at(last_failure + TimeDelta::milliseconds(51));
        assert_eq!(recovered, vec!["flaky"]);
        assert_eq!(coordinator.available_tools(None).len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn outside_calls_resolve_through_the_coordinator() -> Result<()> {
        let coordinator = ToolCoordinator::builder()
            .default_strategy(StrategyKind::Outside)
            .outside_config(OutsideConfig {
                wait_for_result: false,
                timeout_ms: 1_000,
                ..OutsideConfig::default()
            })
            .build();
        coordinator.register(echo("fetch"))?;
        coordinator.register(dependent("publish", DependencyGroup::requires(["fetch"])))?;

        let outcome = coordinator
            .invoke("fetch", json!({ "url": "https://example.org" }), ExecutionOptions::new())
            .await;
        assert!(outcome.is_pending());
        let pending = coordinator.pending_calls();
        assert_eq!(pending.len(), 1);

        // Switching strategy does not strand the outstanding call.
        coordinator.set_default_strategy(StrategyKind::Internal);
        let result =
            coordinator.resolve_external_result(&pending[0].id, ExternalResult::ok(json!("body")))?;
        assert!(result.success);
        assert!(coordinator.availability("publish", None).available);
        assert!(coordinator.pending_calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn listeners_observe_events_in_order() -> Result<()> {
        let coordinator = ToolCoordinator::builder().build();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = coordinator.on_any_event(move |event| {
            sink.lock().push(event.event_type());
            Ok(())
        });
        let executed = Arc::new(AtomicUsize::new(0));
        let counter = executed.clone();
        coordinator.on_event(EventType::Executed, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        // A failing listener does not stop the others.
        coordinator.on_any_event(|_| anyhow::bail!("listener failure"));

        coordinator.register(echo("a"))?;
        coordinator.register(dependent("b", DependencyGroup::requires(["a"])))?;
        coordinator.invoke("a", json!({}), ExecutionOptions::new()).await;

        assert_eq!(
            *seen.lock(),
            vec![
                EventType::Registered,
                EventType::Registered,
                EventType::Executed,
                EventType::AvailabilityChanged,
            ]
        );
        assert_eq!(executed.load(Ordering::SeqCst), 1);

        assert!(coordinator.off_event(id));
        coordinator.unregister("b")?;
        assert_eq!(seen.lock().len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn status_survives_serialize_and_restore() -> Result<()> {
        let coordinator = ToolCoordinator::builder().build();
        coordinator.register(failing("flaky"))?;
        coordinator.invoke("flaky", json!({}), ExecutionOptions::new()).await;
        coordinator.set_tool_status("flaky", ToolStatus::Maintenance, "patching")?;
        let json = coordinator.serialize_status()?;

        let fresh = ToolCoordinator::builder().build();
        fresh.register(failing("flaky"))?;
        assert_eq!(fresh.restore_status(&json)?, 1);
        let info = fresh.tool_status("flaky").expect("restored");
        assert_eq!(info.status, ToolStatus::Maintenance);
        assert_eq!(info.consecutive_failures, 1);
        assert!(fresh.available_tools(None).is_empty());

        fresh.reset_tool_status("flaky")?;
        assert_eq!(fresh.available_tools(None).len(), 1);

        let empty = ToolCoordinator::builder().build();
        assert!(empty.restore_status(&json).is_err());
        assert!(empty.restore_status("not json").is_err());
        Ok(())
    }

    #[tokio::test]
    async fn diagnostics_reflect_the_graph() -> Result<()> {
        let coordinator = ToolCoordinator::builder().build();
        coordinator.register(echo("fetch"))?;
        coordinator.register(dependent("summarize", DependencyGroup::requires(["fetch"])))?;
        coordinator.register(dependent(
            "publish",
            DependencyGroup::sequence(vec![
                Dependency::required("fetch"),
                Dependency::required("summarize"),
            ]),
        ))?;

        assert_eq!(
            coordinator.execution_path("publish"),
            Some(vec![
                "fetch".to_owned(),
                "summarize".to_owned(),
                "publish".to_owned()
            ])
        );
        let graph = coordinator.dependency_graph();
        assert_eq!(graph.root_nodes, vec!["fetch"]);
        assert_eq!(graph.leaf_nodes, vec!["publish"]);

        coordinator.invoke("fetch", json!({}), ExecutionOptions::new()).await;
        coordinator.invoke("summarize", json!({}), ExecutionOptions::new()).await;
        assert!(coordinator.availability("publish", None).available);

        coordinator.reset_executions(ResetScope::All)?;
        assert!(!coordinator.availability("publish", None).available);
        let statuses = coordinator.registration_statuses();
        assert_eq!(statuses.len(), 3);
        assert!(statuses.iter().all(|status| status.execution_count == 0));
        Ok(())
    }

    #[tokio::test]
    async fn load_config_reads_partial_json() -> Result<()> {
        let path = std::env::temp_dir().join(format!(
            "toolgate-config-{}.json",
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        tokio::fs::write(
            &path,
            r#"{ "default_strategy": "outside", "cache": { "max_size": 5 } }"#,
        )
        .await?;

        let config = load_config(&path).await?;
        tokio::fs::remove_file(&path).await?;
        assert_eq!(config.default_strategy, StrategyKind::Outside);
        assert_eq!(config.cache.max_size, 5);
        assert_eq!(config.cache.ttl_ms, 300_000);

        let coordinator = CoordinatorBuilder::new().config(config).build();
        assert_eq!(coordinator.default_strategy(), StrategyKind::Outside);
        assert!(load_config(path).await.is_err());
        Ok(())
    }
}

//! Tool registry with dependency-gated availability.
//!
//! The registry owns every [`ToolRegistration`], the reverse dependency
//! graph and the execution history used to evaluate availability. All
//! mutations happen under one lock, and events are published only after the
//! lock is released, so listeners may call back into the registry.

pub mod availability;
pub mod graph;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use jsonschema::JSONSchema;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use toolgate_events::EventBus;
use toolgate_protocol::{
    CoordinatorError, CoordinatorResult, ExecutionContext, RegistrationError, ToolDefinition,
    ToolEventKind,
};
use tracing::{debug, info, instrument};

pub use availability::{
    Evaluation, GroupEvaluation, HistoryLookup, ToolAvailability, ToolHistory, UnmetCause,
    UnmetDependency, check_dependency, dependency_satisfied, evaluate_group, evaluate_groups,
};
pub use graph::{DependencyGraph, DependencyGraphSnapshot, GraphEdge, GraphNode};

const AWAITING_DEPENDENCIES: &str = "awaiting dependencies";

/// Runtime state the registry keeps for one tool.
#[derive(Debug, Clone)]
pub struct ToolRegistration {
    pub definition: Arc<ToolDefinition>,
    pub available: bool,
    pub availability_reason: String,
    /// Reverse edges: tools whose groups name this one.
    pub dependents: Vec<String>,
    pub usage_count: u64,
    pub registered_at: DateTime<Utc>,
}

/// Serializable snapshot of a registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationStatus {
    pub tool_name: String,
    pub enabled: bool,
    pub available: bool,
    pub availability_reason: String,
    pub dependencies: Vec<String>,
    pub dependents: Vec<String>,
    pub execution_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_executed: Option<DateTime<Utc>>,
    pub usage_count: u64,
    pub registered_at: DateTime<Utc>,
}

/// One entry of the append-only execution log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub tool_name: String,
    pub executed_at: DateTime<Utc>,
    pub context: ExecutionContext,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub total_executions: u64,
    pub per_tool: BTreeMap<String, u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub most_executed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execution: Option<ExecutionRecord>,
}

/// Availability flip caused by a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityChange {
    pub tool_name: String,
    pub available: bool,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetScope {
    Tool(String),
    All,
}

#[derive(Default)]
struct RegistryState {
    tools: IndexMap<String, ToolRegistration>,
    graph: DependencyGraph,
    history: HashMap<String, ToolHistory>,
    log: Vec<ExecutionRecord>,
}

impl RegistryState {
    fn evaluate(&self, definition: &ToolDefinition, current: &ExecutionContext) -> Evaluation {
        if !definition.enabled {
            return Evaluation {
                available: false,
                reason: "disabled".to_owned(),
                unmet: Vec::new(),
            };
        }
        evaluate_groups(&definition.dependency_groups, &self.history, current)
    }

    fn recompute_graph(&mut self) {
        let Self { tools, graph, .. } = self;
        graph.recompute(
            tools
                .iter()
                .map(|(name, reg)| (name.as_str(), reg.definition.has_dependencies())),
        );
    }

    /// Re-evaluate one tool, storing the result. Returns the change if the
    /// `available` flag flipped.
    fn refresh(&mut self, tool_name: &str, current: &ExecutionContext) -> Option<AvailabilityChange> {
        let definition = self.tools.get(tool_name)?.definition.clone();
        let evaluation = self.evaluate(&definition, current);
        let registration = self.tools.get_mut(tool_name)?;
        let flipped = registration.available != evaluation.available;
        registration.available = evaluation.available;
        registration.availability_reason = if evaluation.available {
            evaluation.reason.clone()
        } else {
            format!("{AWAITING_DEPENDENCIES}: {}", evaluation.reason)
        };
        flipped.then(|| AvailabilityChange {
            tool_name: tool_name.to_owned(),
            available: registration.available,
            reason: registration.availability_reason.clone(),
        })
    }

    fn status_of(&self, registration: &ToolRegistration) -> RegistrationStatus {
        let name = &registration.definition.name;
        let history = self.history.get(name);
        RegistrationStatus {
            tool_name: name.clone(),
            enabled: registration.definition.enabled,
            available: registration.available,
            availability_reason: registration.availability_reason.clone(),
            dependencies: registration.definition.dependency_names(),
            dependents: registration.dependents.clone(),
            execution_count: history.map_or(0, |h| h.execution_count),
            last_executed: history.and_then(|h| h.last_executed),
            usage_count: registration.usage_count,
            registered_at: registration.registered_at,
        }
    }

    fn missing_with_suggestions(&self, unmet: &[UnmetDependency]) -> (Vec<String>, Vec<String>) {
        let missing = unmet.iter().map(|u| u.tool_name.clone()).collect();
        let suggestions = unmet
            .iter()
            .map(|u| match (&u.cause, self.tools.contains_key(&u.tool_name)) {
                (_, false) => format!("register tool `{}`", u.tool_name),
                (UnmetCause::NeverExecuted, true) => format!("execute `{}`", u.tool_name),
                (UnmetCause::ConditionFailed { condition }, true) => {
                    format!("re-execute `{}` so that `{condition}` holds", u.tool_name)
                }
            })
            .collect();
        (missing, suggestions)
    }
}

fn availability_event(change: &AvailabilityChange, missing: Vec<String>) -> ToolEventKind {
    ToolEventKind::AvailabilityChanged {
        tool_name: change.tool_name.clone(),
        available: change.available,
        reason: change.reason.clone(),
        missing_dependencies: missing,
    }
}

pub struct ToolRegistry {
    state: Mutex<RegistryState>,
    events: EventBus,
}

impl ToolRegistry {
    pub fn new(events: EventBus) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            events,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    #[instrument(skip(self, definition), fields(tool = %definition.name))]
    pub fn register(&self, definition: ToolDefinition) -> Result<(), RegistrationError> {
        definition.validate()?;
        if let Err(error) = JSONSchema::compile(&definition.input_schema) {
            return Err(RegistrationError::InvalidSchema {
                name: definition.name.clone(),
                reason: error.to_string(),
            });
        }

        let name = definition.name.clone();
        let dependencies = definition.dependency_names();
        let definition = Arc::new(definition);

        let event = {
            let mut state = self.state.lock();
            if state.tools.contains_key(&name) {
                return Err(RegistrationError::DuplicateName(name));
            }

            state
                .graph
                .add_edges(&name, dependencies.iter().map(String::as_str));
            for dependency in &dependencies {
                if let Some(registration) = state.tools.get_mut(dependency)
                    && !registration.dependents.contains(&name)
                {
                    registration.dependents.push(name.clone());
                }
            }
            let dependents = state.graph.dependents_of(&name);

            let evaluation = state.evaluate(&definition, &ExecutionContext::default());
            let reason = if evaluation.available {
                evaluation.reason
            } else if definition.enabled {
                AWAITING_DEPENDENCIES.to_owned()
            } else {
                evaluation.reason
            };
            let available = evaluation.available;

            state.tools.insert(
                name.clone(),
                ToolRegistration {
                    definition,
                    available,
                    availability_reason: reason,
                    dependents,
                    usage_count: 0,
                    registered_at: Utc::now(),
                },
            );
            state.recompute_graph();

            ToolEventKind::Registered {
                tool_name: name.clone(),
                dependencies: dependencies.clone(),
                available,
            }
        };

        info!(dependencies = dependencies.len(), "tool registered");
        self.events.emit(event);
        Ok(())
    }

    /// Remove a tool and its execution history. Tools depending on it are
    /// re-evaluated and typically become unavailable.
    #[instrument(skip(self))]
    pub fn unregister(&self, tool_name: &str) -> CoordinatorResult<Arc<ToolDefinition>> {
        let (definition, events) = {
            let mut state = self.state.lock();
            let registration = state
                .tools
                .shift_remove(tool_name)
                .ok_or_else(|| CoordinatorError::UnknownTool(tool_name.to_owned()))?;
            let dependencies = registration.definition.dependency_names();
            state
                .graph
                .remove_edges(tool_name, dependencies.iter().map(String::as_str));
            for dependency in &dependencies {
                if let Some(peer) = state.tools.get_mut(dependency) {
                    peer.dependents.retain(|d| d != tool_name);
                }
            }
            state.history.remove(tool_name);
            state.recompute_graph();

            let mut events = vec![ToolEventKind::Unregistered {
                tool_name: tool_name.to_owned(),
            }];
            for dependent in registration.dependents.iter() {
                if let Some(change) = state.refresh(dependent, &ExecutionContext::default()) {
                    events.push(availability_event(&change, vec![tool_name.to_owned()]));
                }
            }
            (registration.definition, events)
        };

        info!("tool unregistered");
        self.events.emit_all(events);
        Ok(definition)
    }

    pub fn get(&self, tool_name: &str) -> Option<Arc<ToolDefinition>> {
        self.state
            .lock()
            .tools
            .get(tool_name)
            .map(|reg| reg.definition.clone())
    }

    pub fn contains(&self, tool_name: &str) -> bool {
        self.state.lock().tools.contains_key(tool_name)
    }

    pub fn len(&self) -> usize {
        self.state.lock().tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().tools.is_empty()
    }

    /// Names in registration order.
    pub fn tool_names(&self) -> Vec<String> {
        self.state.lock().tools.keys().cloned().collect()
    }

    /// Evaluate availability against current history. Never fails.
    pub fn availability(
        &self,
        tool_name: &str,
        context: Option<&ExecutionContext>,
    ) -> ToolAvailability {
        let state = self.state.lock();
        let Some(registration) = state.tools.get(tool_name) else {
            return ToolAvailability {
                tool_name: tool_name.to_owned(),
                available: false,
                reason: "not registered".to_owned(),
                missing_dependencies: Vec::new(),
                suggested_actions: vec![format!("register tool `{tool_name}`")],
            };
        };

        let fallback = ExecutionContext::default();
        let evaluation = state.evaluate(&registration.definition, context.unwrap_or(&fallback));
        let (missing_dependencies, mut suggested_actions) =
            state.missing_with_suggestions(&evaluation.unmet);
        if !registration.definition.enabled {
            suggested_actions.push(format!("enable `{tool_name}`"));
        }
        ToolAvailability {
            tool_name: tool_name.to_owned(),
            available: evaluation.available,
            reason: evaluation.reason,
            missing_dependencies,
            suggested_actions,
        }
    }

    pub fn is_available(&self, tool_name: &str) -> bool {
        self.availability(tool_name, None).available
    }

    /// Record one successful execution and re-evaluate direct dependents.
    ///
    /// Only one hop is re-evaluated: a dependent that becomes available does
    /// not unlock its own dependents until it is executed itself.
    #[instrument(skip(self, context))]
    pub fn record_execution(
        &self,
        tool_name: &str,
        context: &ExecutionContext,
    ) -> CoordinatorResult<Vec<AvailabilityChange>> {
        let (changes, events) = {
            let mut state = self.state.lock();
            let dependents = state
                .tools
                .get(tool_name)
                .map(|reg| reg.dependents.clone())
                .ok_or_else(|| CoordinatorError::UnknownTool(tool_name.to_owned()))?;

            let now = Utc::now();
            let history = state.history.entry(tool_name.to_owned()).or_default();
            history.execution_count += 1;
            history.last_executed = Some(now);
            history.last_context = Some(context.clone());
            let count = history.execution_count;
            state.log.push(ExecutionRecord {
                tool_name: tool_name.to_owned(),
                executed_at: now,
                context: context.clone(),
            });
            debug!(execution_count = count, "execution recorded");

            let mut changes = Vec::new();
            let mut events = Vec::new();
            for dependent in &dependents {
                if let Some(change) = state.refresh(dependent, context) {
                    let missing = state
                        .tools
                        .get(dependent)
                        .map(|reg| {
                            let evaluation = state.evaluate(&reg.definition, context);
                            evaluation.unmet.into_iter().map(|u| u.tool_name).collect()
                        })
                        .unwrap_or_default();
                    events.push(availability_event(&change, missing));
                    changes.push(change);
                }
            }
            (changes, events)
        };

        for change in &changes {
            info!(dependent = %change.tool_name, available = change.available, "availability changed");
        }
        self.events.emit_all(events);
        Ok(changes)
    }

    /// Count an invocation attempt, successful or not.
    pub fn mark_used(&self, tool_name: &str) -> CoordinatorResult<u64> {
        let mut state = self.state.lock();
        let registration = state
            .tools
            .get_mut(tool_name)
            .ok_or_else(|| CoordinatorError::UnknownTool(tool_name.to_owned()))?;
        registration.usage_count += 1;
        Ok(registration.usage_count)
    }

    /// Definitions whose dependencies are satisfied for a caller in
    /// `context`, judged by the same rule as [`availability`](Self::availability).
    pub fn available_tools(&self, context: Option<&ExecutionContext>) -> Vec<Arc<ToolDefinition>> {
        let state = self.state.lock();
        let fallback = ExecutionContext::default();
        let current = context.unwrap_or(&fallback);
        state
            .tools
            .values()
            .filter(|reg| state.evaluate(&reg.definition, current).available)
            .map(|reg| reg.definition.clone())
            .collect()
    }

    pub fn registration_status(&self, tool_name: &str) -> Option<RegistrationStatus> {
        let state = self.state.lock();
        state.tools.get(tool_name).map(|reg| state.status_of(reg))
    }

    pub fn all_statuses(&self) -> Vec<RegistrationStatus> {
        let state = self.state.lock();
        state.tools.values().map(|reg| state.status_of(reg)).collect()
    }

    pub fn dependency_graph(&self) -> DependencyGraphSnapshot {
        let state = self.state.lock();
        DependencyGraphSnapshot {
            nodes: state
                .tools
                .values()
                .map(|reg| GraphNode {
                    name: reg.definition.name.clone(),
                    available: reg.available,
                    dependencies: reg.definition.dependency_names(),
                    dependents: reg.dependents.clone(),
                })
                .collect(),
            edges: state
                .graph
                .edges()
                .map(|(from, to)| GraphEdge {
                    from: from.to_owned(),
                    to: to.to_owned(),
                })
                .collect(),
            root_nodes: state.graph.root_nodes().map(str::to_owned).collect(),
            leaf_nodes: state.graph.leaf_nodes().map(str::to_owned).collect(),
        }
    }

    /// First root-to-target path found by depth-first search.
    pub fn execution_path(&self, target: &str) -> Option<Vec<String>> {
        let state = self.state.lock();
        if !state.tools.contains_key(target) {
            return None;
        }
        state.graph.find_path(target)
    }

    /// Clear execution history and restore initial availability.
    #[instrument(skip(self))]
    pub fn reset(&self, scope: ResetScope) -> CoordinatorResult<Vec<AvailabilityChange>> {
        let (changes, events) = {
            let mut state = self.state.lock();
            let targets: Vec<String> = match &scope {
                ResetScope::All => {
                    state.history.clear();
                    state.log.clear();
                    for registration in state.tools.values_mut() {
                        registration.usage_count = 0;
                    }
                    state.tools.keys().cloned().collect()
                }
                ResetScope::Tool(name) => {
                    let registration = state
                        .tools
                        .get_mut(name)
                        .ok_or_else(|| CoordinatorError::UnknownTool(name.clone()))?;
                    registration.usage_count = 0;
                    let mut targets = vec![name.clone()];
                    targets.extend(registration.dependents.iter().cloned());
                    state.history.remove(name);
                    state.log.retain(|record| &record.tool_name != name);
                    targets
                }
            };

            let mut changes = Vec::new();
            let mut events = Vec::new();
            for target in targets {
                if let Some(change) = state.refresh(&target, &ExecutionContext::default()) {
                    events.push(availability_event(&change, Vec::new()));
                    changes.push(change);
                }
                // Restore the registration-time wording for unmet tools.
                if let Some(registration) = state.tools.get_mut(&target)
                    && !registration.available
                    && registration.definition.enabled
                {
                    registration.availability_reason = AWAITING_DEPENDENCIES.to_owned();
                }
            }
            (changes, events)
        };

        info!(scope = ?scope, changed = changes.len(), "execution history reset");
        self.events.emit_all(events);
        Ok(changes)
    }

    pub fn execution_stats(&self) -> ExecutionStats {
        let state = self.state.lock();
        let mut per_tool: BTreeMap<String, u64> = BTreeMap::new();
        for record in &state.log {
            *per_tool.entry(record.tool_name.clone()).or_default() += 1;
        }
        let most_executed = per_tool
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(name, _)| name.clone());
        ExecutionStats {
            total_executions: state.log.len() as u64,
            per_tool,
            most_executed,
            last_execution: state.log.last().cloned(),
        }
    }

    /// Most recent entries of the execution log, oldest first.
    pub fn execution_log(&self, limit: usize) -> Vec<ExecutionRecord> {
        let state = self.state.lock();
        let start = state.log.len().saturating_sub(limit);
        state.log[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use parking_lot::Mutex;
    use serde_json::json;
    use toolgate_events::EventBus;
    use toolgate_protocol::{
        ContextCondition, Dependency, DependencyGroup, EventType, ExecutionContext,
        RegistrationError, ToolDefinition, ToolEventKind, handler_fn,
    };

    use crate::{ResetScope, ToolRegistry};

    fn tool(name: &str, groups: Vec<DependencyGroup>) -> ToolDefinition {
        let mut builder = ToolDefinition::builder(name)
            .description(format!("{name} tool"))
            .handler(handler_fn(|input, _context| async move { Ok(input) }));
        for group in groups {
            builder = builder.dependency_group(group);
        }
        builder.build().expect("valid definition")
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(EventBus::default())
    }

    fn run(registry: &ToolRegistry, name: &str) {
        registry
            .record_execution(name, &ExecutionContext::default())
            .expect("registered tool");
    }

    #[test]
    fn root_tools_are_available_after_registration() -> Result<()> {
        let registry = registry();
        registry.register(tool("fetch", vec![]))?;
        registry.register(tool("parse", vec![DependencyGroup::requires(["fetch"])]))?;

        assert!(registry.is_available("fetch"));
        let parse = registry.registration_status("parse").expect("registered");
        assert!(!parse.available);
        assert_eq!(parse.availability_reason, "awaiting dependencies");
        Ok(())
    }

    #[test]
    fn duplicate_registration_keeps_first_definition() -> Result<()> {
        let registry = registry();
        registry.register(tool("fetch", vec![]))?;
        let error = registry
            .register(tool("fetch", vec![DependencyGroup::requires(["other"])]))
            .unwrap_err();

        assert_eq!(error, RegistrationError::DuplicateName("fetch".into()));
        assert!(registry.is_available("fetch"));
        assert_eq!(registry.len(), 1);
        let kept = registry.get("fetch").expect("registered");
        assert!(!kept.has_dependencies());
        Ok(())
    }

    #[test]
    fn uncompilable_schema_is_rejected() {
        let registry = registry();
        let definition = ToolDefinition::builder("bad")
            .description("bad schema")
            .input_schema(json!({ "type": "no-such-type" }))
            .handler(handler_fn(|input, _context| async move { Ok(input) }))
            .build()
            .expect("structurally valid");
        let error = registry.register(definition).unwrap_err();
        assert!(matches!(error, RegistrationError::InvalidSchema { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn all_group_waits_for_every_dependency() -> Result<()> {
        let registry = registry();
        registry.register(tool("a", vec![]))?;
        registry.register(tool("b", vec![]))?;
        registry.register(tool("t", vec![DependencyGroup::requires(["a", "b"])]))?;

        run(&registry, "a");
        let availability = registry.availability("t", None);
        assert!(!availability.available);
        assert_eq!(availability.missing_dependencies, vec!["b"]);
        assert_eq!(availability.suggested_actions, vec!["execute `b`"]);

        run(&registry, "b");
        assert!(registry.is_available("t"));
        Ok(())
    }

    #[test]
    fn sequence_group_reports_first_missing_only() -> Result<()> {
        let registry = registry();
        registry.register(tool(
            "t",
            vec![DependencyGroup::sequence(vec![
                Dependency::required("a"),
                Dependency::required("b"),
            ])],
        ))?;

        let availability = registry.availability("t", None);
        assert_eq!(availability.missing_dependencies, vec!["a"]);
        assert_eq!(availability.suggested_actions, vec!["register tool `a`"]);
        Ok(())
    }

    #[test]
    fn any_group_unlocks_with_one_dependency() -> Result<()> {
        let registry = registry();
        registry.register(tool("a", vec![]))?;
        registry.register(tool("b", vec![]))?;
        registry.register(tool(
            "t",
            vec![DependencyGroup::any(vec![
                Dependency::required("a"),
                Dependency::required("b"),
            ])],
        ))?;

        run(&registry, "a");
        assert!(registry.is_available("t"));
        Ok(())
    }

    #[test]
    fn record_execution_flips_dependent_within_the_same_call() -> Result<()> {
        let registry = registry();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        registry
            .events()
            .on(EventType::AvailabilityChanged, move |event| {
                if let ToolEventKind::AvailabilityChanged {
                    tool_name,
                    available,
                    ..
                } = &event.kind
                {
                    sink.lock().push((tool_name.clone(), *available));
                }
                Ok(())
            });

        registry.register(tool("a", vec![]))?;
        registry.register(tool("b", vec![DependencyGroup::requires(["a"])]))?;
        assert!(!registry.is_available("b"));

        let changes = registry.record_execution("a", &ExecutionContext::default())?;

        assert_eq!(changes.len(), 1);
        assert!(registry.registration_status("b").expect("registered").available);
        assert_eq!(*seen.lock(), vec![("b".to_owned(), true)]);
        Ok(())
    }

    #[test]
    fn propagation_is_one_hop_per_execution() -> Result<()> {
        let registry = registry();
        registry.register(tool("a", vec![]))?;
        registry.register(tool("b", vec![DependencyGroup::requires(["a"])]))?;
        registry.register(tool("c", vec![DependencyGroup::requires(["b"])]))?;

        run(&registry, "a");
        assert!(registry.is_available("b"));
        assert!(!registry.is_available("c"));

        run(&registry, "b");
        assert!(registry.is_available("c"));
        Ok(())
    }

    #[test]
    fn dependents_are_linked_regardless_of_registration_order() -> Result<()> {
        let registry = registry();
        registry.register(tool("b", vec![DependencyGroup::requires(["a"])]))?;
        registry.register(tool("a", vec![]))?;

        let a = registry.registration_status("a").expect("registered");
        assert_eq!(a.dependents, vec!["b"]);

        run(&registry, "a");
        assert!(registry.registration_status("b").expect("registered").available);
        Ok(())
    }

    #[test]
    fn conditions_use_most_recent_context_only() -> Result<()> {
        let registry = registry();
        registry.register(tool("fetch", vec![]))?;
        registry.register(tool(
            "publish",
            vec![DependencyGroup::all(vec![
                Dependency::required("fetch")
                    .when(ContextCondition::metadata_equals("status", "ok")),
            ])],
        ))?;

        let ok = ExecutionContext::new().with_metadata("status", "ok");
        let failed = ExecutionContext::new().with_metadata("status", "failed");

        registry.record_execution("fetch", &ok)?;
        assert!(registry.is_available("publish"));

        registry.record_execution("fetch", &failed)?;
        let availability = registry.availability("publish", None);
        assert!(!availability.available);
        assert_eq!(availability.missing_dependencies, vec!["fetch"]);
        assert!(availability.suggested_actions[0].starts_with("re-execute `fetch`"));
        Ok(())
    }

    #[test]
    fn disabled_tools_are_never_available() -> Result<()> {
        let registry = registry();
        let definition = ToolDefinition::builder("off")
            .description("disabled tool")
            .enabled(false)
            .handler(handler_fn(|input, _context| async move { Ok(input) }))
            .build()?;
        registry.register(definition)?;

        let availability = registry.availability("off", None);
        assert!(!availability.available);
        assert_eq!(availability.reason, "disabled");
        assert!(registry.available_tools(None).is_empty());
        Ok(())
    }

    #[test]
    fn available_tools_follow_the_callers_context() -> Result<()> {
        let registry = registry();
        registry.register(tool("a", vec![]))?;
        registry.register(tool(
            "b",
            vec![
                DependencyGroup::requires(["a"])
                    .when(ContextCondition::metadata_equals("mode", "write")),
            ],
        ))?;
        let write = ExecutionContext::new().with_metadata("mode", "write");
        registry.record_execution("a", &write)?;

        let names = |context: Option<&ExecutionContext>| -> Vec<String> {
            registry
                .available_tools(context)
                .iter()
                .map(|definition| definition.name.clone())
                .collect()
        };
        assert_eq!(names(None), vec!["a"]);
        assert!(!registry.availability("b", None).available);
        assert_eq!(names(Some(&write)), vec!["a", "b"]);
        assert!(registry.availability("b", Some(&write)).available);
        Ok(())
    }

    #[test]
    fn unknown_tool_is_reported_not_registered() {
        let registry = registry();
        let availability = registry.availability("ghost", None);
        assert!(!availability.available);
        assert_eq!(availability.reason, "not registered");
        assert!(registry.record_execution("ghost", &ExecutionContext::default()).is_err());
    }

    #[test]
    fn unregister_updates_graph_and_dependents() -> Result<()> {
        let registry = registry();
        registry.register(tool("a", vec![]))?;
        registry.register(tool("b", vec![DependencyGroup::requires(["a"])]))?;
        run(&registry, "a");
        assert!(registry.is_available("b"));

        registry.unregister("a")?;

        assert!(!registry.is_available("b"));
        let graph = registry.dependency_graph();
        assert_eq!(graph.root_nodes, Vec::<String>::new());
        assert_eq!(graph.leaf_nodes, vec!["b"]);
        assert_eq!(graph.edges.len(), 1);
        assert!(registry.unregister("a").is_err());
        Ok(())
    }

    #[test]
    fn execution_path_and_graph_snapshot() -> Result<()> {
        let registry = registry();
        registry.register(tool("fetch", vec![]))?;
        registry.register(tool("parse", vec![DependencyGroup::requires(["fetch"])]))?;
        registry.register(tool("report", vec![DependencyGroup::requires(["parse"])]))?;

        assert_eq!(
            registry.execution_path("report"),
            Some(vec!["fetch".to_owned(), "parse".to_owned(), "report".to_owned()])
        );
        assert_eq!(registry.execution_path("ghost"), None);

        let graph = registry.dependency_graph();
        assert_eq!(graph.root_nodes, vec!["fetch"]);
        assert_eq!(graph.leaf_nodes, vec!["report"]);
        assert_eq!(graph.nodes.len(), 3);
        Ok(())
    }

    #[test]
    fn reset_restores_initial_availability() -> Result<()> {
        let registry = registry();
        registry.register(tool("a", vec![]))?;
        registry.register(tool("b", vec![DependencyGroup::requires(["a"])]))?;
        run(&registry, "a");
        registry.mark_used("a")?;
        assert!(registry.is_available("b"));

        let changes = registry.reset(ResetScope::Tool("a".into()))?;
        assert_eq!(changes.len(), 1);
        let b = registry.registration_status("b").expect("registered");
        assert!(!b.available);
        assert_eq!(b.availability_reason, "awaiting dependencies");
        let a = registry.registration_status("a").expect("registered");
        assert_eq!(a.execution_count, 0);
        assert_eq!(a.usage_count, 0);

        run(&registry, "a");
        run(&registry, "b");
        registry.reset(ResetScope::All)?;
        assert_eq!(registry.execution_stats().total_executions, 0);
        assert!(!registry.is_available("b"));
        assert!(registry.is_available("a"));
        Ok(())
    }

    #[test]
    fn execution_stats_summarise_log() -> Result<()> {
        let registry = registry();
        registry.register(tool("a", vec![]))?;
        registry.register(tool("b", vec![]))?;
        run(&registry, "a");
        run(&registry, "b");
        run(&registry, "a");

        let stats = registry.execution_stats();
        assert_eq!(stats.total_executions, 3);
        assert_eq!(stats.per_tool.get("a"), Some(&2));
        assert_eq!(stats.most_executed.as_deref(), Some("a"));
        assert_eq!(
            stats.last_execution.map(|record| record.tool_name),
            Some("a".to_owned())
        );
        assert_eq!(registry.execution_log(2).len(), 2);
        Ok(())
    }
}

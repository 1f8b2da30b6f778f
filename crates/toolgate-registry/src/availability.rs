//! Pure availability evaluation over execution history.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use toolgate_protocol::{Dependency, DependencyGroup, ExecutionContext, GroupType};

/// What the registry remembers about a tool's past executions.
#[derive(Debug, Clone, Default)]
pub struct ToolHistory {
    pub execution_count: u64,
    pub last_executed: Option<DateTime<Utc>>,
    /// Only the most recent context is kept for condition evaluation.
    pub last_context: Option<ExecutionContext>,
}

pub trait HistoryLookup {
    fn history(&self, tool_name: &str) -> Option<&ToolHistory>;
}

impl HistoryLookup for HashMap<String, ToolHistory> {
    fn history(&self, tool_name: &str) -> Option<&ToolHistory> {
        self.get(tool_name)
    }
}

/// Why a dependency does not count as satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmetCause {
    NeverExecuted,
    ConditionFailed { condition: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmetDependency {
    pub tool_name: String,
    pub cause: UnmetCause,
}

/// Result of evaluating one dependency group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEvaluation {
    pub satisfied: bool,
    pub unmet: Vec<UnmetDependency>,
    pub reason: String,
}

/// Result of evaluating every group of a tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub available: bool,
    pub reason: String,
    pub unmet: Vec<UnmetDependency>,
}

/// Public availability answer for one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolAvailability {
    pub tool_name: String,
    pub available: bool,
    pub reason: String,
    #[serde(default)]
    pub missing_dependencies: Vec<String>,
    #[serde(default)]
    pub suggested_actions: Vec<String>,
}

pub fn check_dependency(
    dependency: &Dependency,
    history: &impl HistoryLookup,
) -> Result<(), UnmetCause> {
    let executed = history
        .history(&dependency.tool_name)
        .filter(|h| h.execution_count > 0);

    let Some(executed) = executed else {
        return if dependency.is_optional() {
            Ok(())
        } else {
            Err(UnmetCause::NeverExecuted)
        };
    };

    match &dependency.condition {
        None => Ok(()),
        Some(condition) => {
            let fallback = ExecutionContext::default();
            let last = executed.last_context.as_ref().unwrap_or(&fallback);
            if condition.evaluate(last) {
                Ok(())
            } else {
                Err(UnmetCause::ConditionFailed {
                    condition: condition.label().to_owned(),
                })
            }
        }
    }
}

pub fn dependency_satisfied(dependency: &Dependency, history: &impl HistoryLookup) -> bool {
    check_dependency(dependency, history).is_ok()
}

pub fn evaluate_group(
    group: &DependencyGroup,
    history: &impl HistoryLookup,
    current: &ExecutionContext,
) -> GroupEvaluation {
    if let Some(condition) = &group.condition
        && !condition.evaluate(current)
    {
        return GroupEvaluation {
            satisfied: false,
            unmet: Vec::new(),
            reason: format!("group condition `{}` not met", condition.label()),
        };
    }

    let unmet_of = |dependency: &Dependency| {
        check_dependency(dependency, history)
            .err()
            .map(|cause| UnmetDependency {
                tool_name: dependency.tool_name.clone(),
                cause,
            })
    };

    match group.group_type {
        GroupType::All => {
            let unmet: Vec<_> = group.dependencies.iter().filter_map(unmet_of).collect();
            let reason = if unmet.is_empty() {
                "all dependencies satisfied".to_owned()
            } else {
                format!("requires {}", names(&unmet))
            };
            GroupEvaluation {
                satisfied: unmet.is_empty(),
                unmet,
                reason,
            }
        }
        GroupType::Any => {
            let unmet: Vec<_> = group.dependencies.iter().filter_map(unmet_of).collect();
            if unmet.len() < group.dependencies.len() {
                GroupEvaluation {
                    satisfied: true,
                    unmet: Vec::new(),
                    reason: "at least one dependency satisfied".to_owned(),
                }
            } else {
                let reason = format!("requires one of {}", names(&unmet));
                GroupEvaluation {
                    satisfied: false,
                    unmet,
                    reason,
                }
            }
        }
        GroupType::Sequence => {
            // The first unmet step stops evaluation and is the only one reported.
            match group.dependencies.iter().find_map(unmet_of) {
                None => GroupEvaluation {
                    satisfied: true,
                    unmet: Vec::new(),
                    reason: "sequence complete".to_owned(),
                },
                Some(first) => {
                    let reason = format!("sequence blocked at {}", first.tool_name);
                    GroupEvaluation {
                        satisfied: false,
                        unmet: vec![first],
                        reason,
                    }
                }
            }
        }
    }
}

/// Groups combine with AND.
pub fn evaluate_groups(
    groups: &[DependencyGroup],
    history: &impl HistoryLookup,
    current: &ExecutionContext,
) -> Evaluation {
    if groups.is_empty() {
        return Evaluation {
            available: true,
            reason: "no dependencies".to_owned(),
            unmet: Vec::new(),
        };
    }

    let mut reasons = Vec::new();
    let mut unmet: Vec<UnmetDependency> = Vec::new();
    for group in groups {
        let evaluation = evaluate_group(group, history, current);
        if evaluation.satisfied {
            continue;
        }
        reasons.push(evaluation.reason);
        for dependency in evaluation.unmet {
            if !unmet.iter().any(|u| u.tool_name == dependency.tool_name) {
                unmet.push(dependency);
            }
        }
    }

    if reasons.is_empty() {
        Evaluation {
            available: true,
            reason: "all dependency groups satisfied".to_owned(),
            unmet,
        }
    } else {
        Evaluation {
            available: false,
            reason: reasons.join("; "),
            unmet,
        }
    }
}

fn names(unmet: &[UnmetDependency]) -> String {
    unmet
        .iter()
        .map(|u| u.tool_name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

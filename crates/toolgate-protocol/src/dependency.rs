//! Dependency groups gating a tool's availability.

use crate::context::ExecutionContext;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How the dependencies of one group combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    /// At least one dependency satisfied.
    Any,
    /// Every dependency satisfied.
    All,
    /// Every dependency satisfied, checked in declared order.
    Sequence,
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Any => "any",
            Self::All => "all",
            Self::Sequence => "sequence",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    #[default]
    Required,
    /// Counts as satisfied until the referenced tool has executed; after
    /// that its condition applies like a required dependency.
    Optional,
}

type Predicate = dyn Fn(&ExecutionContext) -> bool + Send + Sync;

/// Named predicate over an execution context.
///
/// Conditions are resolved at evaluation time and never serialized; the
/// label is what diagnostics show.
#[derive(Clone)]
pub struct ContextCondition {
    label: String,
    predicate: Arc<Predicate>,
}

impl ContextCondition {
    pub fn new(
        label: impl Into<String>,
        predicate: impl Fn(&ExecutionContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Holds when `key` is present in the context metadata and equals `value`.
    pub fn metadata_equals(key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        let key = key.into();
        let value = value.into();
        let label = format!("metadata.{key} == {value}");
        Self::new(label, move |context| context.metadata(&key) == Some(&value))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn evaluate(&self, context: &ExecutionContext) -> bool {
        (self.predicate)(context)
    }
}

impl fmt::Debug for ContextCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextCondition")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// One edge from a tool to a tool it depends on.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub tool_name: String,
    pub kind: DependencyKind,
    /// Evaluated against the dependency's most recent execution context.
    pub condition: Option<ContextCondition>,
}

impl Dependency {
    pub fn required(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            kind: DependencyKind::Required,
            condition: None,
        }
    }

    pub fn optional(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            kind: DependencyKind::Optional,
            condition: None,
        }
    }

    pub fn when(mut self, condition: ContextCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn is_optional(&self) -> bool {
        matches!(self.kind, DependencyKind::Optional)
    }
}

/// A combination rule over a list of dependencies.
///
/// All groups attached to a tool must be satisfied for it to be available.
#[derive(Debug, Clone)]
pub struct DependencyGroup {
    pub group_type: GroupType,
    pub dependencies: Vec<Dependency>,
    /// Evaluated against the context of the availability query.
    pub condition: Option<ContextCondition>,
    pub description: Option<String>,
}

impl DependencyGroup {
    pub fn new(group_type: GroupType, dependencies: Vec<Dependency>) -> Self {
        Self {
            group_type,
            dependencies,
            condition: None,
            description: None,
        }
    }

    pub fn any(dependencies: Vec<Dependency>) -> Self {
        Self::new(GroupType::Any, dependencies)
    }

    pub fn all(dependencies: Vec<Dependency>) -> Self {
        Self::new(GroupType::All, dependencies)
    }

    pub fn sequence(dependencies: Vec<Dependency>) -> Self {
        Self::new(GroupType::Sequence, dependencies)
    }

    /// Shorthand for an `all` group of required dependencies.
    pub fn requires<I, S>(tool_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::all(tool_names.into_iter().map(Dependency::required).collect())
    }

    pub fn when(mut self, condition: ContextCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|dep| dep.tool_name.as_str())
    }
}

/// Serializable view of a dependency group for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGroupSummary {
    pub group_type: GroupType,
    pub dependencies: Vec<DependencySummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySummary {
    pub tool_name: String,
    pub kind: DependencyKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

impl From<&DependencyGroup> for DependencyGroupSummary {
    fn from(group: &DependencyGroup) -> Self {
        Self {
            group_type: group.group_type,
            dependencies: group
                .dependencies
                .iter()
                .map(|dep| DependencySummary {
                    tool_name: dep.tool_name.clone(),
                    kind: dep.kind,
                    condition: dep.condition.as_ref().map(|c| c.label().to_owned()),
                })
                .collect(),
            condition: group.condition.as_ref().map(|c| c.label().to_owned()),
            description: group.description.clone(),
        }
    }
}

//! Tool definitions and handlers.

use crate::context::ExecutionContext;
use crate::dependency::{DependencyGroup, DependencyGroupSummary};
use crate::error::RegistrationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

const MAX_TOOL_NAME_LEN: usize = 128;

/// The callable behind a tool.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, input: Value, context: ExecutionContext) -> anyhow::Result<Value>;
}

struct FnHandler<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(Value, ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn call(&self, input: Value, context: ExecutionContext) -> anyhow::Result<Value> {
        (self.f)(input, context).await
    }
}

/// Wrap an async closure as a [`ToolHandler`].
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(Value, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(FnHandler { f })
}

/// Immutable descriptor of a registered tool.
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema the input must satisfy.
    pub input_schema: Value,
    pub handler: Arc<dyn ToolHandler>,
    pub tags: Vec<String>,
    pub dependency_groups: Vec<DependencyGroup>,
    pub enabled: bool,
    /// Carried for callers; never enforced here.
    pub security_label: Option<String>,
}

impl ToolDefinition {
    pub fn builder(name: impl Into<String>) -> ToolDefinitionBuilder {
        ToolDefinitionBuilder::new(name)
    }

    pub fn has_dependencies(&self) -> bool {
        !self.dependency_groups.is_empty()
    }

    /// Names of every tool referenced by any dependency group, deduplicated
    /// in declaration order.
    pub fn dependency_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.dependency_groups.iter().flat_map(|g| g.tool_names()) {
            if !names.iter().any(|existing| existing == name) {
                names.push(name.to_owned());
            }
        }
        names
    }

    /// Structural checks that need no knowledge of other tools.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        validate_name(&self.name)?;
        if self.description.trim().is_empty() {
            return Err(RegistrationError::EmptyDescription(self.name.clone()));
        }
        if !self.input_schema.is_object() {
            return Err(RegistrationError::InvalidSchema {
                name: self.name.clone(),
                reason: "schema must be a JSON object".to_owned(),
            });
        }
        for (index, group) in self.dependency_groups.iter().enumerate() {
            if group.dependencies.is_empty() {
                return Err(RegistrationError::EmptyDependencyGroup {
                    name: self.name.clone(),
                    index,
                });
            }
            for dependency in &group.dependencies {
                validate_name(&dependency.tool_name)?;
                if dependency.tool_name == self.name {
                    return Err(RegistrationError::SelfDependency(self.name.clone()));
                }
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> ToolSummary {
        ToolSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
            tags: self.tags.clone(),
            dependency_groups: self
                .dependency_groups
                .iter()
                .map(DependencyGroupSummary::from)
                .collect(),
            enabled: self.enabled,
            security_label: self.security_label.clone(),
        }
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("tags", &self.tags)
            .field("dependency_groups", &self.dependency_groups)
            .field("enabled", &self.enabled)
            .field("security_label", &self.security_label)
            .finish_non_exhaustive()
    }
}

fn validate_name(name: &str) -> Result<(), RegistrationError> {
    if name.trim().is_empty() {
        return Err(RegistrationError::EmptyName);
    }
    if name.len() > MAX_TOOL_NAME_LEN {
        return Err(RegistrationError::InvalidName {
            name: name.to_owned(),
            reason: format!("longer than {MAX_TOOL_NAME_LEN} characters"),
        });
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')))
    {
        return Err(RegistrationError::InvalidName {
            name: name.to_owned(),
            reason: format!("unsupported character {bad:?}"),
        });
    }
    Ok(())
}

/// Serializable view of a definition (everything but the handler).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub dependency_groups: Vec<DependencyGroupSummary>,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_label: Option<String>,
}

pub struct ToolDefinitionBuilder {
    name: String,
    description: String,
    input_schema: Value,
    handler: Option<Arc<dyn ToolHandler>>,
    tags: Vec<String>,
    dependency_groups: Vec<DependencyGroup>,
    enabled: bool,
    security_label: Option<String>,
}

impl ToolDefinitionBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            input_schema: serde_json::json!({ "type": "object" }),
            handler: None,
            tags: Vec::new(),
            dependency_groups: Vec::new(),
            enabled: true,
            security_label: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn handler(mut self, handler: Arc<dyn ToolHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn dependency_group(mut self, group: DependencyGroup) -> Self {
        self.dependency_groups.push(group);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn security_label(mut self, label: impl Into<String>) -> Self {
        self.security_label = Some(label.into());
        self
    }

    pub fn build(self) -> Result<ToolDefinition, RegistrationError> {
        let handler = self
            .handler
            .ok_or_else(|| RegistrationError::MissingHandler(self.name.clone()))?;
        let definition = ToolDefinition {
            name: self.name,
            description: self.description,
            input_schema: self.input_schema,
            handler,
            tags: self.tags,
            dependency_groups: self.dependency_groups,
            enabled: self.enabled,
            security_label: self.security_label,
        };
        definition.validate()?;
        Ok(definition)
    }
}

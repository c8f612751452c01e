//! Agent contract
//!
//! An agent reads the shared context and proposes operations; it never
//! mutates the store itself. The orchestrator decides when an agent runs
//! from the keys its [`AgentDescriptor`] declares.

use async_trait::async_trait;
use conclave_domain::{AgentId, ContextItem, ContextOperation, ContextReader};
use serde_json::Value;
use std::collections::BTreeSet;

/// A worker that turns context into proposed operations
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use conclave_domain::{ContextOperation, ContextReader};
/// use conclave_orchestrator::{Agent, AgentDescriptor};
/// use serde_json::json;
///
/// struct Greeter {
///     descriptor: AgentDescriptor,
/// }
///
/// #[async_trait]
/// impl Agent for Greeter {
///     fn descriptor(&self) -> &AgentDescriptor {
///         &self.descriptor
///     }
///
///     async fn process(&self, context: &dyn ContextReader) -> anyhow::Result<Vec<ContextOperation>> {
///         if context.has("greeting") {
///             return Ok(Vec::new());
///         }
///         Ok(vec![self.descriptor.add_operation("greeting", json!("hi"), 1.0, None, &["user_input"])])
///     }
/// }
///
/// let greeter = Greeter {
///     descriptor: AgentDescriptor::builder("greeter").consumes(["user_input"]).produces(["greeting"]).build(),
/// };
/// assert!(!greeter.descriptor().is_source());
/// ```
#[async_trait]
pub trait Agent: Send + Sync {
    /// Identity and declared key sets
    fn descriptor(&self) -> &AgentDescriptor;

    /// Inspect the context and return the operations to apply
    ///
    /// An error discards this invocation's output; the run continues.
    async fn process(&self, context: &dyn ContextReader) -> anyhow::Result<Vec<ContextOperation>>;
}

/// What an agent is and which keys it reads and writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDescriptor {
    /// Unique identifier, also stamped as `source` on items the agent creates
    pub id: AgentId,
    /// Human-readable name
    pub name: String,
    /// What the agent does
    pub description: String,
    /// Free-form capability tags
    pub capabilities: Vec<String>,
    /// Keys whose presence makes the agent eligible
    pub consumes: BTreeSet<String>,
    /// Keys the agent is expected to write
    pub produces: BTreeSet<String>,
}

impl AgentDescriptor {
    /// Start a descriptor; name defaults to the id
    pub fn builder(id: impl Into<AgentId>) -> AgentDescriptorBuilder {
        let id = id.into();
        AgentDescriptorBuilder {
            descriptor: AgentDescriptor {
                name: id.clone(),
                id,
                description: String::new(),
                capabilities: Vec::new(),
                consumes: BTreeSet::new(),
                produces: BTreeSet::new(),
            },
        }
    }

    /// Agents with nothing to consume run in every iteration
    pub fn is_source(&self) -> bool {
        self.consumes.is_empty()
    }

    /// Whether any consumed key is live (source agents always are)
    pub fn is_eligible(&self, context: &dyn ContextReader) -> bool {
        self.is_source() || self.consumes.iter().any(|key| context.has(key))
    }

    /// Whether the agent declared `key` as an output
    ///
    /// An empty produces set declares nothing, so every key is accepted.
    pub fn declares_output(&self, key: &str) -> bool {
        self.produces.is_empty() || self.produces.contains(key)
    }

    /// Build an `add` operation whose item is attributed to this agent
    pub fn add_operation(
        &self,
        key: &str,
        value: Value,
        confidence: f64,
        reasoning: Option<&str>,
        parents: &[&str],
    ) -> ContextOperation {
        let mut builder = ContextItem::builder(key, value, self.id.clone())
            .confidence(confidence)
            .parents(parents.iter().copied());
        if let Some(reasoning) = reasoning {
            builder = builder.reasoning(reasoning);
        }
        ContextOperation::add(builder.build())
    }
}

/// Builder for [`AgentDescriptor`]
#[derive(Debug, Clone)]
pub struct AgentDescriptorBuilder {
    descriptor: AgentDescriptor,
}

impl AgentDescriptorBuilder {
    /// Set the display name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.descriptor.name = name.into();
        self
    }

    /// Set the description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.descriptor.description = description.into();
        self
    }

    /// Add capability tags
    pub fn capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.descriptor
            .capabilities
            .extend(capabilities.into_iter().map(Into::into));
        self
    }

    /// Add consumed keys
    pub fn consumes<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.descriptor.consumes.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Add produced keys
    pub fn produces<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.descriptor.produces.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Finish the descriptor
    pub fn build(self) -> AgentDescriptor {
        self.descriptor
    }
}

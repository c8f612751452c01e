//! Agent catalog for building per-session agent sets.
//!
//! Every session owns its own agent instances, so the catalog stores
//! factories rather than agents.

use crate::config::SessionConfig;
use crate::SessionError;
use conclave_orchestrator::Agent;

/// Builds a fresh agent instance
pub type AgentFactory = Box<dyn Fn() -> Box<dyn Agent> + Send + Sync>;

struct CatalogEntry {
    id: String,
    factory: AgentFactory,
}

/// Agent factories keyed by agent id, in registration order
#[derive(Default)]
pub struct AgentCatalog {
    entries: Vec<CatalogEntry>,
}

impl AgentCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory; an existing entry with the same id is replaced
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Agent> + Send + Sync + 'static,
    {
        let id = id.into();
        self.entries.retain(|entry| entry.id != id);
        self.entries.push(CatalogEntry {
            id,
            factory: Box::new(factory),
        });
    }

    /// Registered ids, in registration order
    pub fn available(&self) -> Vec<&str> {
        self.entries.iter().map(|entry| entry.id.as_str()).collect()
    }

    /// Whether an id is registered
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    /// Number of registered factories
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build one agent by id
    pub fn create(&self, id: &str) -> Result<Box<dyn Agent>, SessionError> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| (entry.factory)())
            .ok_or_else(|| SessionError::UnknownAgent(id.to_string()))
    }

    /// Build every agent the configuration leaves enabled
    ///
    /// Fails if the configuration names an agent the catalog does not know,
    /// which is almost always a typo.
    pub fn build_enabled(&self, config: &SessionConfig) -> Result<Vec<Box<dyn Agent>>, SessionError> {
        if let Some(unknown) = config.agents.keys().find(|id| !self.contains(id)) {
            return Err(SessionError::UnknownAgent(unknown.clone()));
        }

        Ok(self
            .entries
            .iter()
            .filter(|entry| config.agent_enabled(&entry.id))
            .map(|entry| (entry.factory)())
            .collect())
    }
}

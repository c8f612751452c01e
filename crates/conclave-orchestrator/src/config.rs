//! Configuration for Orchestrator runs
//!
//! Defines the iteration bound, how agents of one iteration are executed,
//! and how storage failures are treated.

use crate::OrchestratorError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How the eligible agents of one iteration are run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One agent at a time in registration order; each agent's operations
    /// are applied before the next agent reads the store
    #[default]
    Sequential,

    /// All agents at once against the same pre-iteration view; operations
    /// are applied afterwards, serially, in registration order
    Concurrent,
}

/// Configuration for the [`Orchestrator`](crate::Orchestrator)
///
/// # Examples
///
/// ```
/// use conclave_orchestrator::{ExecutionMode, OrchestratorConfig};
///
/// let config = OrchestratorConfig::default();
/// assert_eq!(config.max_iterations, 10);
/// assert_eq!(config.execution_mode, ExecutionMode::Sequential);
///
/// let config = OrchestratorConfig::concurrent();
/// assert_eq!(config.execution_mode, ExecutionMode::Concurrent);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Safety bound on scheduling passes per `process` call
    /// Default: 10
    pub max_iterations: usize,

    /// Sequential or concurrent agent execution
    /// Default: sequential
    pub execution_mode: ExecutionMode,

    /// Per-agent deadline in milliseconds; an agent exceeding it counts as failed
    /// Default: none
    pub agent_timeout_ms: Option<u64>,

    /// Stop the run when a write to the backing database fails
    /// Default: false (treat it like any other failed operation)
    pub abort_on_persistence_error: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            execution_mode: ExecutionMode::Sequential,
            agent_timeout_ms: None,
            abort_on_persistence_error: false,
        }
    }
}

impl OrchestratorConfig {
    /// Default settings with concurrent agent execution
    pub fn concurrent() -> Self {
        Self {
            execution_mode: ExecutionMode::Concurrent,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, OrchestratorError> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            OrchestratorError::Config(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, OrchestratorError> {
        let config: OrchestratorConfig =
            toml::from_str(contents).map_err(|e| OrchestratorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        if self.max_iterations == 0 {
            return Err(OrchestratorError::Config(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.agent_timeout_ms == Some(0) {
            return Err(OrchestratorError::Config(
                "agent_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Per-agent deadline as a Duration
    pub fn agent_timeout(&self) -> Option<Duration> {
        self.agent_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.execution_mode, ExecutionMode::Sequential);
        assert!(config.agent_timeout().is_none());
        assert!(!config.abort_on_persistence_error);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            max_iterations = 4
            execution_mode = "concurrent"
            agent_timeout_ms = 2500
        "#;

        let config = OrchestratorConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.max_iterations, 4);
        assert_eq!(config.execution_mode, ExecutionMode::Concurrent);
        assert_eq!(config.agent_timeout(), Some(Duration::from_millis(2500)));
        assert!(!config.abort_on_persistence_error);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = OrchestratorConfig::from_toml_str("").unwrap();
        assert_eq!(config, OrchestratorConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(OrchestratorConfig::from_toml_str("max_iterations = 0").is_err());
        assert!(OrchestratorConfig::from_toml_str("agent_timeout_ms = 0").is_err());
        assert!(OrchestratorConfig::from_toml_str("execution_mode = \"parallel\"").is_err());
    }
}

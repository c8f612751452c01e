//! Configuration file parsing for the session manager.
//!
//! Loads storage location, session lifetime, orchestrator settings, and the
//! per-agent enable switches from TOML.

use conclave_orchestrator::OrchestratorConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Session configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Session manager configuration loaded from TOML
///
/// ```toml
/// database_path = "conclave.db"
/// session_ttl_secs = 3600
/// eviction_interval_secs = 60
/// history_load_limit = 100
///
/// [orchestrator]
/// max_iterations = 10
/// execution_mode = "sequential"
///
/// [agents.nlp-agent]
/// enabled = false
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// SQLite file for durable sessions; in-memory stores when absent
    pub database_path: Option<PathBuf>,

    /// Idle time after which a session is evicted (default: 3600 = 1 hour)
    pub session_ttl_secs: u64,

    /// Period of the background eviction sweep (default: 60)
    pub eviction_interval_secs: u64,

    /// Most recent history entries per key loaded when a durable session opens
    pub history_load_limit: Option<usize>,

    /// Scheduler settings applied to every session
    pub orchestrator: OrchestratorConfig,

    /// Per-agent switches keyed by agent id; unlisted agents are enabled
    pub agents: BTreeMap<String, AgentSettings>,
}

/// Settings for one catalog agent
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Whether new sessions get this agent (default: true)
    pub enabled: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            session_ttl_secs: 3600,
            eviction_interval_secs: 60,
            history_load_limit: None,
            orchestrator: OrchestratorConfig::default(),
            agents: BTreeMap::new(),
        }
    }
}

impl SessionConfig {
    /// Defaults with sessions persisted to `path`
    pub fn durable(path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the manager cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.eviction_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "eviction_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.history_load_limit == Some(0) {
            return Err(ConfigError::Invalid(
                "history_load_limit must be positive when set".to_string(),
            ));
        }
        self.orchestrator
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Idle lifetime of a session
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Period of the eviction sweep
    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }

    /// Whether new sessions should get the agent with this id
    pub fn agent_enabled(&self, id: &str) -> bool {
        self.agents.get(id).map_or(true, |settings| settings.enabled)
    }
}

//! Error types for Orchestrator operations

use conclave_domain::AgentId;
use thiserror::Error;

/// Errors that can occur while configuring or running the orchestrator
///
/// Agent failures and failed operations are not errors at this level; they
/// are isolated, logged, and counted in the [`RunReport`](crate::RunReport).
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// An agent with this id is already registered
    #[error("Agent with ID {0} already registered")]
    DuplicateAgent(AgentId),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage failure the configuration says must stop the run
    #[error("Storage error: {0}")]
    Store(String),
}

//! Conclave Orchestrator
//!
//! Schedules agents over a shared context store until they stop changing it.
//!
//! # Overview
//!
//! Agents declare which keys they consume and produce. On every scheduling
//! pass the orchestrator runs each agent with at least one consumed key live
//! (agents consuming nothing always run), applies the operations they return,
//! and repeats while anything changed:
//!
//! - **Fixpoint**: a pass that applies no operation ends the run
//! - **Safety bound**: at most `max_iterations` passes per `process` call
//! - **Isolation**: a failing agent or a rejected operation is logged and
//!   counted, never fatal
//!
//! # Usage
//!
//! ```
//! use async_trait::async_trait;
//! use conclave_domain::{ContextItem, ContextOperation, ContextReader};
//! use conclave_orchestrator::{Agent, AgentDescriptor, Orchestrator, RunOutcome};
//! use serde_json::json;
//!
//! struct EntityAgent {
//!     descriptor: AgentDescriptor,
//! }
//!
//! #[async_trait]
//! impl Agent for EntityAgent {
//!     fn descriptor(&self) -> &AgentDescriptor {
//!         &self.descriptor
//!     }
//!
//!     async fn process(&self, context: &dyn ContextReader) -> anyhow::Result<Vec<ContextOperation>> {
//!         if context.has("entities") {
//!             return Ok(Vec::new());
//!         }
//!         Ok(vec![self.descriptor.add_operation(
//!             "entities",
//!             json!([]),
//!             0.85,
//!             Some("Extracted via named entity recognition"),
//!             &["user_input"],
//!         )])
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut orchestrator = Orchestrator::new();
//! orchestrator.register_agent(Box::new(EntityAgent {
//!     descriptor: AgentDescriptor::builder("nlp-agent")
//!         .consumes(["user_input"])
//!         .produces(["entities"])
//!         .build(),
//! }))?;
//!
//! let seed = ContextItem::builder("user_input", json!("hello"), "user").build();
//! let report = orchestrator.process(vec![seed]).await?;
//!
//! assert_eq!(report.outcome, RunOutcome::Quiescent);
//! assert_eq!(orchestrator.store().get("entities").unwrap().value, json!([]));
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! ```toml
//! max_iterations = 10
//! execution_mode = "sequential"   # or "concurrent"
//! agent_timeout_ms = 30000
//! abort_on_persistence_error = false
//! ```

#![warn(missing_docs)]

mod agent;
mod config;
mod error;
mod orchestrator;
mod report;

pub use agent::{Agent, AgentDescriptor, AgentDescriptorBuilder};
pub use config::{ExecutionMode, OrchestratorConfig};
pub use error::OrchestratorError;
pub use orchestrator::Orchestrator;
pub use report::{AgentStats, RunOutcome, RunReport};

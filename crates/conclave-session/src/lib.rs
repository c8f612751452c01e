//! Conclave Sessions
//!
//! Multi-session front end for the orchestrator. Each session pairs one
//! [`Orchestrator`](conclave_orchestrator::Orchestrator) with its own context
//! store, addressed by a UUIDv7 session id.
//!
//! # Overview
//!
//! - [`SessionConfig`]: storage location, idle TTL, scheduler settings, and
//!   per-agent switches, loaded from TOML
//! - [`AgentCatalog`]: factories that give every session fresh agents
//! - [`SessionStore`]: SQLite when a database is configured and reachable,
//!   in-memory otherwise
//! - [`SessionManager`]: create, process, inspect, and evict sessions
//!
//! # Usage
//!
//! ```no_run
//! use conclave_session::{init_tracing, AgentCatalog, SessionConfig, SessionManager};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! init_tracing("info");
//!
//! let config = SessionConfig::from_file("config/conclave.toml")?;
//! let manager = Arc::new(SessionManager::new(config, AgentCatalog::new())?);
//! let _eviction = manager.spawn_eviction();
//!
//! let session = manager.get_or_create(None).await?;
//! let report = manager.process(&session, Vec::new()).await?;
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod catalog;
pub mod config;
pub mod session;
pub mod store;
pub mod telemetry;

pub use catalog::{AgentCatalog, AgentFactory};
pub use config::{AgentSettings, ConfigError, SessionConfig};
pub use session::{SessionError, SessionId, SessionManager, SharedOrchestrator};
pub use store::{open_store, SessionStore};
pub use telemetry::init_tracing;

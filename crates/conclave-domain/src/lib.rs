//! Conclave Domain Layer
//!
//! This crate contains the data model shared by every other Conclave crate:
//! context items, the operations agents propose, and the trait boundaries
//! that stores implement. It carries no storage or scheduling logic.
//!
//! ## Key Concepts
//!
//! - **Context item**: a provenance-tagged fact with a confidence score
//! - **Operation**: a proposed mutation (add, update, delete, merge, snapshot)
//! - **Reader / Store**: the read-only view handed to agents and its mutable extension
//! - **Lineage**: the provenance DAG formed by `parent_context_keys` across history
//!
//! ## Architecture
//!
//! - Pure data and trait definitions
//! - Values are `serde_json::Value` so any JSON-serializable payload fits
//! - Infrastructure implementations live in `conclave-store`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod confidence;
pub mod error;
pub mod item;
pub mod operation;
pub mod provenance;
pub mod traits;

// Re-exports for convenience
pub use error::ItemError;
pub use item::{format_key, now_millis, AgentId, ContextItem, ItemBuilder, ItemPatch};
pub use operation::ContextOperation;
pub use traits::{has_required_context, ContextReader, ContextStore};

//! Conclave Storage Layer
//!
//! Implements the [`ContextStore`](conclave_domain::ContextStore) contract twice:
//!
//! - [`MemoryStore`]: volatile, lives as long as the process
//! - [`SqliteStore`]: same behavior, written through to SQLite and
//!   partitioned by session id
//!
//! # Architecture
//!
//! Both stores wrap the same [`ContextState`] (live map, per-key history,
//! snapshot table). The durable store loads its session eagerly on connect
//! and persists each mutation before applying it in memory.
//!
//! # Examples
//!
//! ```
//! use conclave_domain::{ContextItem, ContextReader, ContextStore};
//! use conclave_store::SqliteStore;
//! use serde_json::json;
//!
//! let mut store = SqliteStore::open_in_memory("session-1").unwrap();
//! store.add(ContextItem::builder("user_input", json!("hello"), "user").build()).unwrap();
//! assert!(store.has("user_input"));
//! ```

#![warn(missing_docs)]

mod error;
mod memory;
mod sqlite;
pub mod state;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::{SqliteStore, SqliteStoreConfig};
pub use state::{ContextState, Snapshot};

//! Volatile, process-lifetime store

use crate::state::{ContextState, Snapshot};
use crate::StoreError;
use conclave_domain::{now_millis, ContextItem, ContextReader, ContextStore, ItemPatch};

/// In-memory implementation of [`ContextStore`]
///
/// # Examples
///
/// ```
/// use conclave_domain::{ContextItem, ContextReader, ContextStore};
/// use conclave_store::MemoryStore;
/// use serde_json::json;
///
/// let mut store = MemoryStore::new();
/// store.add(ContextItem::builder("user_input", json!("hello"), "user").build()).unwrap();
/// store.update("user_input", json!("hello again"), None).unwrap();
///
/// assert_eq!(store.get("user_input").unwrap().value, json!("hello again"));
/// assert_eq!(store.history("user_input").len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: ContextState,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a stored snapshot
    pub fn snapshot(&self, id: &str) -> Option<&Snapshot> {
        self.state.snapshot(id)
    }
}

impl ContextReader for MemoryStore {
    fn get(&self, key: &str) -> Option<&ContextItem> {
        self.state.get(key)
    }

    fn items(&self) -> Vec<&ContextItem> {
        self.state.items()
    }

    fn history(&self, key: &str) -> &[ContextItem] {
        self.state.history(key)
    }

    fn has(&self, key: &str) -> bool {
        self.state.has(key)
    }

    fn len(&self) -> usize {
        self.state.len()
    }
}

impl ContextStore for MemoryStore {
    type Error = StoreError;

    fn add(&mut self, item: ContextItem) -> Result<(), Self::Error> {
        self.state.prepare_add(&item)?;
        self.state.record(item);
        Ok(())
    }

    fn update_with(&mut self, key: &str, patch: ItemPatch) -> Result<(), Self::Error> {
        let next = self.state.prepare_update(key, patch, now_millis())?;
        self.state.record(next);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool, Self::Error> {
        Ok(self.state.remove(key).is_some())
    }

    fn create_snapshot(&mut self, id: &str) -> Result<String, Self::Error> {
        let snapshot = self.state.capture(id, now_millis());
        self.state.put_snapshot(snapshot);
        Ok(id.to_string())
    }

    fn restore_snapshot(&mut self, id: &str) -> Result<bool, Self::Error> {
        let Some(items) = self.state.snapshot(id).map(|s| s.items.clone()) else {
            return Ok(false);
        };
        self.state.replace_live(items);
        Ok(true)
    }

    fn snapshot_ids(&self) -> Vec<String> {
        self.state.snapshot_ids()
    }
}

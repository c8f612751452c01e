//! In-memory state shared by both store implementations
//!
//! Every mutation is split into a check (`prepare_*`, pure) and a commit
//! (`record`, `remove`, ...). The durable store persists between the two so
//! a failed write never leaves memory ahead of disk.

use crate::StoreError;
use conclave_domain::{ContextItem, ContextReader, ItemPatch};
use std::collections::HashMap;

/// A named copy of the live map
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Snapshot identifier
    pub id: String,
    /// Live items at capture time
    pub items: HashMap<String, ContextItem>,
    /// Capture time (ms since Unix epoch)
    pub created_at: u64,
}

/// Live items, per-key history, and snapshots
#[derive(Debug, Clone, Default)]
pub struct ContextState {
    items: HashMap<String, ContextItem>,
    history: HashMap<String, Vec<ContextItem>>,
    snapshots: HashMap<String, Snapshot>,
}

impl ContextState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate an item for `add`
    pub fn prepare_add(&self, item: &ContextItem) -> Result<(), StoreError> {
        if self.items.contains_key(&item.key) {
            return Err(StoreError::DuplicateKey(item.key.clone()));
        }
        item.validate()?;
        Ok(())
    }

    /// Compute the successor of a live item for `update`
    pub fn prepare_update(
        &self,
        key: &str,
        patch: ItemPatch,
        timestamp: u64,
    ) -> Result<ContextItem, StoreError> {
        let current = self
            .items
            .get(key)
            .ok_or_else(|| StoreError::NoSuchKey(key.to_string()))?;
        let next = current.successor(patch, timestamp);
        next.validate()?;
        Ok(next)
    }

    /// Make an item live and append it to its key's history
    pub fn record(&mut self, item: ContextItem) {
        self.history
            .entry(item.key.clone())
            .or_default()
            .push(item.clone());
        self.items.insert(item.key.clone(), item);
    }

    /// Drop a live item; history is kept
    pub fn remove(&mut self, key: &str) -> Option<ContextItem> {
        self.items.remove(key)
    }

    /// Deep-copy the live map
    pub fn capture(&self, id: &str, created_at: u64) -> Snapshot {
        Snapshot {
            id: id.to_string(),
            items: self.items.clone(),
            created_at,
        }
    }

    /// Store a snapshot, replacing one with the same id
    pub fn put_snapshot(&mut self, snapshot: Snapshot) {
        self.snapshots.insert(snapshot.id.clone(), snapshot);
    }

    /// Look up a snapshot
    pub fn snapshot(&self, id: &str) -> Option<&Snapshot> {
        self.snapshots.get(id)
    }

    /// Snapshot ids, sorted
    pub fn snapshot_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.snapshots.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Swap in a new live map without touching history
    pub fn replace_live(&mut self, items: HashMap<String, ContextItem>) {
        self.items = items;
    }

    /// Keys that have any history, sorted
    pub fn history_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.history.keys().cloned().collect();
        keys.sort();
        keys
    }

    // Loading from a durable backend: live rows and history rows arrive separately

    pub(crate) fn load_live(&mut self, item: ContextItem) {
        self.items.insert(item.key.clone(), item);
    }

    pub(crate) fn load_history(&mut self, item: ContextItem) {
        self.history.entry(item.key.clone()).or_default().push(item);
    }

    pub(crate) fn history_count(&self) -> usize {
        self.history.values().map(Vec::len).sum()
    }
}

impl ContextReader for ContextState {
    fn get(&self, key: &str) -> Option<&ContextItem> {
        self.items.get(key)
    }

    fn items(&self) -> Vec<&ContextItem> {
        self.items.values().collect()
    }

    fn history(&self, key: &str) -> &[ContextItem] {
        self.history.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    fn has(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(key: &str) -> ContextItem {
        ContextItem::builder(key, json!(key), "test").build()
    }

    #[test]
    fn test_prepare_does_not_mutate() {
        let mut state = ContextState::new();
        state.record(item("a"));

        let next = state
            .prepare_update("a", ItemPatch::value(json!(2)), 99)
            .unwrap();
        assert_eq!(next.value, json!(2));
        assert_eq!(state.get("a").unwrap().value, json!("a"));
        assert_eq!(state.history("a").len(), 1);
    }

    #[test]
    fn test_prepare_update_rejects_bad_confidence() {
        let mut state = ContextState::new();
        state.record(item("a"));

        let result = state.prepare_update("a", ItemPatch::value(json!(1)).with_confidence(Some(2.0)), 1);
        assert!(matches!(result, Err(StoreError::InvalidItem(_))));
    }

    #[test]
    fn test_capture_is_independent_copy() {
        let mut state = ContextState::new();
        state.record(item("a"));
        let snapshot = state.capture("s1", 0);

        state.record(item("b"));
        assert_eq!(snapshot.items.len(), 1);
        assert!(snapshot.items.contains_key("a"));
    }

    #[test]
    fn test_history_keys_include_deleted() {
        let mut state = ContextState::new();
        state.record(item("a"));
        state.record(item("b"));
        state.remove("a");

        assert_eq!(state.history_keys(), vec!["a", "b"]);
        assert_eq!(state.keys(), vec!["b"]);
        assert_eq!(state.history_count(), 2);
    }
}

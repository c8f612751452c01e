//! Trait definitions for the context store
//!
//! [`ContextReader`] is the read-only view agents receive; [`ContextStore`]
//! adds the mutation side used by the orchestrator. Implementations live in
//! `conclave-store`.

use crate::{ContextItem, ItemPatch};
use serde_json::Value;

/// Read-only access to a context store
///
/// Object safe, so agents can take `&dyn ContextReader` without knowing which
/// store backs it.
pub trait ContextReader: Send + Sync {
    /// Current live item for a key
    fn get(&self, key: &str) -> Option<&ContextItem>;

    /// All live items, in no particular order
    fn items(&self) -> Vec<&ContextItem>;

    /// Every item ever recorded under a key, oldest first
    ///
    /// Empty if the key never existed.
    fn history(&self, key: &str) -> &[ContextItem];

    /// Whether a key is currently live
    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Live keys, sorted for deterministic output
    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.items().into_iter().map(|item| item.key.clone()).collect();
        keys.sort();
        keys
    }

    /// Live items produced by a given source
    fn by_source(&self, source: &str) -> Vec<&ContextItem> {
        self.items()
            .into_iter()
            .filter(|item| item.source == source)
            .collect()
    }

    /// Live items with confidence at or above the threshold
    fn by_confidence(&self, min_confidence: f64) -> Vec<&ContextItem> {
        self.items()
            .into_iter()
            .filter(|item| item.confidence >= min_confidence)
            .collect()
    }

    /// Number of live items
    fn len(&self) -> usize {
        self.items().len()
    }

    /// Whether the live map is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mutable context store
pub trait ContextStore: ContextReader {
    /// Error type for store operations
    type Error;

    /// Insert a new live item; fails if the key is already live
    fn add(&mut self, item: ContextItem) -> Result<(), Self::Error>;

    /// Apply a patch to a live item; fails if the key is not live
    fn update_with(&mut self, key: &str, patch: ItemPatch) -> Result<(), Self::Error>;

    /// Remove a live item, keeping its history
    ///
    /// Returns whether an item was removed; absent keys are not an error.
    fn delete(&mut self, key: &str) -> Result<bool, Self::Error>;

    /// Copy the live map under `id`, replacing any snapshot with that id
    fn create_snapshot(&mut self, id: &str) -> Result<String, Self::Error>;

    /// Replace the live map with a snapshot
    ///
    /// Returns `Ok(false)` when no snapshot has that id.
    fn restore_snapshot(&mut self, id: &str) -> Result<bool, Self::Error>;

    /// Identifiers of stored snapshots, sorted
    fn snapshot_ids(&self) -> Vec<String>;

    /// Replace the value (and optionally the confidence) of a live item
    fn update(&mut self, key: &str, value: Value, confidence: Option<f64>) -> Result<(), Self::Error> {
        self.update_with(key, ItemPatch::value(value).with_confidence(confidence))
    }

    /// Add-or-update each item in order
    ///
    /// Later items see the effects of earlier ones. Stops at the first
    /// failure; items before it stay applied.
    fn merge(&mut self, items: Vec<ContextItem>) -> Result<(), Self::Error> {
        for item in items {
            if self.has(&item.key) {
                let ContextItem { key, value, confidence, .. } = item;
                self.update(&key, value, Some(confidence))?;
            } else {
                self.add(item)?;
            }
        }
        Ok(())
    }
}

/// Whether every key in `required` is live
pub fn has_required_context<R, S>(context: &R, required: &[S]) -> bool
where
    R: ContextReader + ?Sized,
    S: AsRef<str>,
{
    required.iter().all(|key| context.has(key.as_ref()))
}

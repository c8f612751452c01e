//! Provenance lineage
//!
//! `parent_context_keys` link items into a DAG. Parents are collected from
//! every history entry of a key, not only the live one, so lineage survives
//! updates and deletes.

use crate::ContextReader;
use std::collections::{HashSet, VecDeque};

/// Parent keys recorded anywhere in a key's history, first occurrence order
pub fn recorded_parents(context: &dyn ContextReader, key: &str) -> Vec<String> {
    let mut parents: Vec<String> = Vec::new();
    for entry in context.history(key) {
        for parent in &entry.parent_context_keys {
            if !parents.contains(parent) {
                parents.push(parent.clone());
            }
        }
    }
    parents
}

/// All keys a key was transitively derived from, breadth-first
///
/// The starting key is never included, even if a cycle leads back to it.
pub fn ancestors(context: &dyn ContextReader, key: &str) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::from([key.to_string()]);
    let mut queue: VecDeque<String> = VecDeque::from([key.to_string()]);
    let mut lineage = Vec::new();

    while let Some(current) = queue.pop_front() {
        for parent in recorded_parents(context, &current) {
            if seen.insert(parent.clone()) {
                lineage.push(parent.clone());
                queue.push_back(parent);
            }
        }
    }

    lineage
}

/// Whether `key` was derived (directly or transitively) from `ancestor`
pub fn derived_from(context: &dyn ContextReader, key: &str, ancestor: &str) -> bool {
    ancestors(context, key).iter().any(|k| k == ancestor)
}

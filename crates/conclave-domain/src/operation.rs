//! Operations agents propose against the shared store

use crate::ContextItem;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A proposed mutation of the context store
///
/// Serialized with a `type` tag so operation lists can cross process
/// boundaries unchanged (e.g. `{"type": "delete", "key": "intent"}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContextOperation {
    /// Insert a new live item; fails if the key is already live
    Add {
        /// Item to insert
        item: ContextItem,
    },

    /// Replace the value of a live item
    Update {
        /// Target key
        key: String,
        /// New value
        value: Value,
        /// New confidence; absent keeps the previous one
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f64>,
    },

    /// Remove a live item (history is kept)
    Delete {
        /// Target key
        key: String,
    },

    /// Add-or-update a batch of items in order
    Merge {
        /// Items to merge
        items: Vec<ContextItem>,
    },

    /// Copy the live map under a name
    Snapshot {
        /// Snapshot identifier
        id: String,
    },
}

impl ContextOperation {
    /// Shorthand for [`ContextOperation::Add`]
    pub fn add(item: ContextItem) -> Self {
        Self::Add { item }
    }

    /// Shorthand for [`ContextOperation::Update`]
    pub fn update(key: impl Into<String>, value: Value, confidence: Option<f64>) -> Self {
        Self::Update {
            key: key.into(),
            value,
            confidence,
        }
    }

    /// Shorthand for [`ContextOperation::Delete`]
    pub fn delete(key: impl Into<String>) -> Self {
        Self::Delete { key: key.into() }
    }

    /// Shorthand for [`ContextOperation::Merge`]
    pub fn merge(items: Vec<ContextItem>) -> Self {
        Self::Merge { items }
    }

    /// Shorthand for [`ContextOperation::Snapshot`]
    pub fn snapshot(id: impl Into<String>) -> Self {
        Self::Snapshot { id: id.into() }
    }

    /// Operation kind as used in the `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Merge { .. } => "merge",
            Self::Snapshot { .. } => "snapshot",
        }
    }

    /// Keys this operation touches in the live map
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Self::Add { item } => vec![item.key.as_str()],
            Self::Update { key, .. } | Self::Delete { key } => vec![key.as_str()],
            Self::Merge { items } => items.iter().map(|item| item.key.as_str()).collect(),
            Self::Snapshot { .. } => Vec::new(),
        }
    }
}

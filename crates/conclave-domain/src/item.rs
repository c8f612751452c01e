//! Context item module - the fundamental unit of the shared pool

use crate::{confidence, ItemError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of the agent (or `"user"` / `"system"`) that produced an item
pub type AgentId = String;

/// Current time in milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Normalize a context key: lowercase, whitespace runs become `_`
///
/// # Examples
///
/// ```
/// use conclave_domain::format_key;
///
/// assert_eq!(format_key("Job Description"), "job_description");
/// assert_eq!(format_key("bias \t analysis"), "bias_analysis");
/// ```
pub fn format_key(raw: &str) -> String {
    let mut key = String::with_capacity(raw.len());
    let mut in_whitespace = false;

    for ch in raw.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                key.push('_');
            }
            in_whitespace = true;
        } else {
            key.extend(ch.to_lowercase());
            in_whitespace = false;
        }
    }

    key
}

/// A context item - one provenance-tagged fact in the shared pool
///
/// Items are values: a store never mutates an item in place, every update
/// produces a successor, so clones handed out earlier stay valid records of
/// a past state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextItem {
    /// Key, unique among the live items of one store
    pub key: String,

    /// Arbitrary JSON payload
    pub value: Value,

    /// Reliability estimate in [0, 1]
    pub confidence: f64,

    /// Producer of this value
    pub source: AgentId,

    /// Creation or last-update time (ms since Unix epoch)
    pub timestamp: u64,

    /// Human-readable justification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,

    /// Keys consulted to derive this item, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_context_keys: Vec<String>,
}

impl ContextItem {
    /// Start building an item; the key is normalized with [`format_key`]
    pub fn builder(key: &str, value: Value, source: impl Into<AgentId>) -> ItemBuilder {
        ItemBuilder::new(key, value, source)
    }

    /// Build an item whose value is any serializable Rust type
    pub fn serialized<T: Serialize>(
        key: &str,
        value: &T,
        source: impl Into<AgentId>,
    ) -> Result<ItemBuilder, serde_json::Error> {
        Ok(ItemBuilder::new(key, serde_json::to_value(value)?, source))
    }

    /// Decode the value into a concrete type
    pub fn value_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.value)
    }

    /// Check the structural requirements of an item
    pub fn validate(&self) -> Result<(), ItemError> {
        if self.key.is_empty() {
            return Err(ItemError::EmptyKey);
        }
        if self.source.is_empty() {
            return Err(ItemError::EmptySource(self.key.clone()));
        }
        confidence::validate(self.confidence)?;
        Ok(())
    }

    /// Produce the successor of this item after an update
    ///
    /// Source, reasoning and parent keys carry forward unless the patch
    /// overrides them; the timestamp is replaced.
    pub fn successor(&self, patch: ItemPatch, timestamp: u64) -> ContextItem {
        ContextItem {
            key: self.key.clone(),
            value: patch.value,
            confidence: patch.confidence.unwrap_or(self.confidence),
            source: patch.source.unwrap_or_else(|| self.source.clone()),
            timestamp,
            reasoning: patch.reasoning.or_else(|| self.reasoning.clone()),
            parent_context_keys: patch
                .parent_context_keys
                .unwrap_or_else(|| self.parent_context_keys.clone()),
        }
    }
}

/// Builder for [`ContextItem`]
///
/// Defaults: confidence 1.0, timestamp now, no reasoning, no parents.
#[derive(Debug, Clone)]
pub struct ItemBuilder {
    item: ContextItem,
}

impl ItemBuilder {
    fn new(key: &str, value: Value, source: impl Into<AgentId>) -> Self {
        Self {
            item: ContextItem {
                key: format_key(key),
                value,
                confidence: 1.0,
                source: source.into(),
                timestamp: now_millis(),
                reasoning: None,
                parent_context_keys: Vec::new(),
            },
        }
    }

    /// Set the confidence
    pub fn confidence(mut self, confidence: f64) -> Self {
        self.item.confidence = confidence;
        self
    }

    /// Set the reasoning
    pub fn reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.item.reasoning = Some(reasoning.into());
        self
    }

    /// Set the parent keys; duplicates are dropped, first occurrence wins
    pub fn parents<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let mut parents: Vec<String> = Vec::new();
        for key in keys {
            let key = key.into();
            if !parents.contains(&key) {
                parents.push(key);
            }
        }
        self.item.parent_context_keys = parents;
        self
    }

    /// Override the timestamp
    pub fn timestamp(mut self, timestamp: u64) -> Self {
        self.item.timestamp = timestamp;
        self
    }

    /// Finish the item (validation happens when a store accepts it)
    pub fn build(self) -> ContextItem {
        self.item
    }
}

/// The changes an update applies to a live item
#[derive(Debug, Clone, PartialEq)]
pub struct ItemPatch {
    /// New value
    pub value: Value,
    /// New confidence; `None` keeps the previous one
    pub confidence: Option<f64>,
    /// Replacement source
    pub source: Option<AgentId>,
    /// Replacement reasoning
    pub reasoning: Option<String>,
    /// Replacement parent keys
    pub parent_context_keys: Option<Vec<String>>,
}

impl ItemPatch {
    /// Patch that only replaces the value
    pub fn value(value: Value) -> Self {
        Self {
            value,
            confidence: None,
            source: None,
            reasoning: None,
            parent_context_keys: None,
        }
    }

    /// Also replace the confidence
    pub fn with_confidence(mut self, confidence: Option<f64>) -> Self {
        self.confidence = confidence;
        self
    }

    /// Also replace the source
    pub fn with_source(mut self, source: impl Into<AgentId>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Also replace the reasoning
    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Also replace the parent keys
    pub fn with_parents(mut self, parents: Vec<String>) -> Self {
        self.parent_context_keys = Some(parents);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_defaults() {
        let item = ContextItem::builder("User Input", json!("hello"), "user").build();
        assert_eq!(item.key, "user_input");
        assert_eq!(item.confidence, 1.0);
        assert_eq!(item.source, "user");
        assert!(item.reasoning.is_none());
        assert!(item.parent_context_keys.is_empty());
        assert!(item.timestamp > 0);
    }

    #[test]
    fn test_builder_dedups_parents() {
        let item = ContextItem::builder("entities", json!([]), "nlp-agent")
            .parents(["user_input", "job_description", "user_input"])
            .build();
        assert_eq!(item.parent_context_keys, vec!["user_input", "job_description"]);
    }

    #[test]
    fn test_validate() {
        let mut item = ContextItem::builder("k", json!(1), "a").build();
        assert!(item.validate().is_ok());

        item.confidence = 1.5;
        assert_eq!(item.validate(), Err(ItemError::ConfidenceOutOfRange(1.5)));

        item.confidence = 0.5;
        item.source.clear();
        assert_eq!(item.validate(), Err(ItemError::EmptySource("k".to_string())));

        item.key.clear();
        assert_eq!(item.validate(), Err(ItemError::EmptyKey));
    }

    #[test]
    fn test_successor_carries_provenance() {
        let item = ContextItem::builder("sentiment", json!({"score": 0.1}), "nlp-agent")
            .confidence(0.82)
            .reasoning("Analyzed via sentiment model")
            .parents(["user_input"])
            .timestamp(10)
            .build();

        let next = item.successor(ItemPatch::value(json!({"score": 0.4})), 20);
        assert_eq!(next.value, json!({"score": 0.4}));
        assert_eq!(next.confidence, 0.82);
        assert_eq!(next.source, "nlp-agent");
        assert_eq!(next.reasoning.as_deref(), Some("Analyzed via sentiment model"));
        assert_eq!(next.parent_context_keys, vec!["user_input"]);
        assert_eq!(next.timestamp, 20);

        // The original is untouched
        assert_eq!(item.value, json!({"score": 0.1}));
    }

    #[test]
    fn test_successor_overrides() {
        let item = ContextItem::builder("k", json!(1), "a").build();
        let next = item.successor(
            ItemPatch::value(json!(2))
                .with_confidence(Some(0.3))
                .with_source("b")
                .with_parents(vec!["p".to_string()]),
            5,
        );
        assert_eq!(next.confidence, 0.3);
        assert_eq!(next.source, "b");
        assert_eq!(next.parent_context_keys, vec!["p"]);
    }

    #[test]
    fn test_typed_value_access() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Sentiment {
            score: f64,
            label: String,
        }

        let sentiment = Sentiment { score: 0.0, label: "neutral".to_string() };
        let item = ContextItem::serialized("sentiment", &sentiment, "nlp-agent")
            .unwrap()
            .build();

        assert_eq!(item.value_as::<Sentiment>().unwrap(), sentiment);
        assert!(item.value_as::<Vec<String>>().is_err());
    }

    #[test]
    fn test_json_field_names() {
        let item = ContextItem::builder("entities", json!([]), "nlp-agent")
            .parents(["user_input"])
            .timestamp(1)
            .build();
        let encoded = serde_json::to_value(&item).unwrap();
        assert_eq!(encoded["parentContextKeys"], json!(["user_input"]));
        assert!(encoded.get("reasoning").is_none());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: formatted keys contain no whitespace and are idempotent
        #[test]
        fn test_format_key_idempotent(raw in "[A-Za-z \t_]{0,24}") {
            let once = format_key(&raw);
            prop_assert!(!once.chars().any(char::is_whitespace));
            prop_assert_eq!(format_key(&once), once);
        }
    }
}

//! Integration tests for conclave-store
//!
//! Every contract test runs against both the in-memory and the SQLite store.

use conclave_domain::{has_required_context, ContextItem, ContextStore, ItemPatch};
use conclave_store::{MemoryStore, SqliteStore, StoreError};
use serde_json::json;

type DynStore = Box<dyn ContextStore<Error = StoreError>>;

fn stores() -> Vec<(&'static str, DynStore)> {
    vec![
        ("memory", Box::new(MemoryStore::new()) as DynStore),
        (
            "sqlite",
            Box::new(SqliteStore::open_in_memory("test-session").unwrap()) as DynStore,
        ),
    ]
}

fn item(key: &str, value: serde_json::Value, confidence: f64, source: &str) -> ContextItem {
    ContextItem::builder(key, value, source)
        .confidence(confidence)
        .build()
}

#[test]
fn test_add_and_get() {
    for (name, mut store) in stores() {
        let added = item("test", json!("value"), 1.0, "test-agent");
        store.add(added.clone()).unwrap();

        assert!(store.has("test"), "{name}");
        assert_eq!(store.get("test"), Some(&added), "{name}");
        assert_eq!(store.history("test").len(), 1, "{name}");
    }
}

#[test]
fn test_duplicate_add_rejected() {
    for (name, mut store) in stores() {
        store.add(item("test", json!(1), 1.0, "a")).unwrap();

        let result = store.add(item("test", json!(2), 1.0, "b"));
        assert!(matches!(result, Err(StoreError::DuplicateKey(ref k)) if k == "test"), "{name}");
        assert_eq!(store.get("test").unwrap().value, json!(1), "{name}");
        assert_eq!(store.history("test").len(), 1, "{name}");
    }
}

#[test]
fn test_update_missing_key_rejected() {
    for (name, mut store) in stores() {
        let result = store.update("non-existent", json!("value"), None);
        assert!(matches!(result, Err(StoreError::NoSuchKey(_))), "{name}");
        assert!(store.history("non-existent").is_empty(), "{name}");
    }
}

#[test]
fn test_update_sequence_keeps_history_in_call_order() {
    for (name, mut store) in stores() {
        store.add(item("test", json!("value1"), 1.0, "test-agent")).unwrap();
        store.update("test", json!("value2"), None).unwrap();
        store.update("test", json!("value3"), Some(0.8)).unwrap();

        let current = store.get("test").unwrap();
        assert_eq!(current.value, json!("value3"), "{name}");
        assert_eq!(current.confidence, 0.8, "{name}");

        let values: Vec<_> = store.history("test").iter().map(|i| i.value.clone()).collect();
        assert_eq!(values, vec![json!("value1"), json!("value2"), json!("value3")], "{name}");
    }
}

#[test]
fn test_rapid_updates_preserve_program_order() {
    for (name, mut store) in stores() {
        store.add(item("counter", json!(0), 1.0, "a")).unwrap();
        for n in 1..=50 {
            store.update("counter", json!(n), None).unwrap();
        }

        let values: Vec<i64> = store
            .history("counter")
            .iter()
            .map(|i| i.value.as_i64().unwrap())
            .collect();
        assert_eq!(values, (0..=50).collect::<Vec<_>>(), "{name}");
    }
}

#[test]
fn test_update_carries_provenance_and_confidence() {
    for (name, mut store) in stores() {
        let original = ContextItem::builder("entities", json!([]), "nlp-agent")
            .confidence(0.85)
            .reasoning("Extracted via named entity recognition")
            .parents(["user_input"])
            .build();
        store.add(original).unwrap();
        store.update("entities", json!(["Alice"]), None).unwrap();

        let updated = store.get("entities").unwrap();
        assert_eq!(updated.confidence, 0.85, "{name}");
        assert_eq!(updated.source, "nlp-agent", "{name}");
        assert_eq!(updated.parent_context_keys, vec!["user_input"], "{name}");
        assert!(updated.reasoning.is_some(), "{name}");
    }
}

#[test]
fn test_update_with_overrides_source() {
    for (name, mut store) in stores() {
        store.add(item("summary", json!("a"), 0.5, "first")).unwrap();
        store
            .update_with("summary", ItemPatch::value(json!("b")).with_source("second"))
            .unwrap();

        assert_eq!(store.get("summary").unwrap().source, "second", "{name}");
        assert_eq!(store.history("summary")[0].source, "first", "{name}");
    }
}

#[test]
fn test_invalid_confidence_rejected() {
    for (name, mut store) in stores() {
        let result = store.add(item("bad", json!(1), 1.2, "a"));
        assert!(matches!(result, Err(StoreError::InvalidItem(_))), "{name}");

        store.add(item("good", json!(1), 0.4, "a")).unwrap();
        let result = store.update("good", json!(2), Some(-0.1));
        assert!(matches!(result, Err(StoreError::InvalidItem(_))), "{name}");
        assert_eq!(store.get("good").unwrap().value, json!(1), "{name}");
    }
}

#[test]
fn test_delete_keeps_history() {
    for (name, mut store) in stores() {
        store.add(item("test", json!("v1"), 1.0, "a")).unwrap();
        store.update("test", json!("v2"), None).unwrap();
        let before = store.history("test").to_vec();

        assert!(store.delete("test").unwrap(), "{name}");
        assert!(!store.has("test"), "{name}");
        assert_eq!(store.history("test"), before.as_slice(), "{name}");

        // Deleting again is a no-op
        assert!(!store.delete("test").unwrap(), "{name}");
    }
}

#[test]
fn test_readd_after_delete_extends_history() {
    for (name, mut store) in stores() {
        store.add(item("k", json!(1), 1.0, "a")).unwrap();
        store.delete("k").unwrap();
        store.add(item("k", json!(2), 1.0, "a")).unwrap();

        assert_eq!(store.history("k").len(), 2, "{name}");
        assert_eq!(store.get("k").unwrap().value, json!(2), "{name}");
    }
}

#[test]
fn test_merge_multiple_items() {
    for (name, mut store) in stores() {
        store
            .merge(vec![
                item("test1", json!("value1"), 1.0, "test-agent"),
                item("test2", json!("value2"), 0.8, "test-agent"),
            ])
            .unwrap();

        assert_eq!(store.get("test1").unwrap().value, json!("value1"), "{name}");
        assert_eq!(store.get("test2").unwrap().value, json!("value2"), "{name}");
    }
}

#[test]
fn test_merge_same_key_later_wins() {
    for (name, mut store) in stores() {
        let a = ContextItem::builder("shared", json!("A"), "agent-a")
            .confidence(0.6)
            .parents(["p"])
            .build();
        let b = item("shared", json!("B"), 0.9, "agent-b");
        store.merge(vec![a, b]).unwrap();

        let current = store.get("shared").unwrap();
        assert_eq!(current.value, json!("B"), "{name}");
        assert_eq!(current.confidence, 0.9, "{name}");
        // Update semantics: provenance of the first writer carries forward
        assert_eq!(current.source, "agent-a", "{name}");
        assert_eq!(store.history("shared").len(), 2, "{name}");
    }
}

#[test]
fn test_merge_stops_at_first_failure() {
    for (name, mut store) in stores() {
        let result = store.merge(vec![
            item("ok", json!(1), 1.0, "a"),
            item("bad", json!(2), 7.0, "a"),
            item("never", json!(3), 1.0, "a"),
        ]);

        assert!(result.is_err(), "{name}");
        assert!(store.has("ok"), "{name}");
        assert!(!store.has("bad"), "{name}");
        assert!(!store.has("never"), "{name}");
    }
}

#[test]
fn test_snapshot_round_trip() {
    for (name, mut store) in stores() {
        store.add(item("kept", json!("v1"), 1.0, "a")).unwrap();
        store.add(item("removed_later", json!("x"), 1.0, "a")).unwrap();

        let id = store.create_snapshot("snapshot-1").unwrap();
        assert_eq!(id, "snapshot-1", "{name}");

        store.update("kept", json!("v2"), None).unwrap();
        store.delete("removed_later").unwrap();
        store.add(item("added_later", json!("y"), 1.0, "a")).unwrap();
        let history_before = store.history("kept").len();

        assert!(store.restore_snapshot(&id).unwrap(), "{name}");

        assert_eq!(store.keys(), vec!["kept", "removed_later"], "{name}");
        assert_eq!(store.get("kept").unwrap().value, json!("v1"), "{name}");
        assert!(!store.has("added_later"), "{name}");

        // Restore never rewrites history
        assert_eq!(store.history("kept").len(), history_before, "{name}");
        assert_eq!(store.history("added_later").len(), 1, "{name}");
    }
}

#[test]
fn test_restore_unknown_snapshot() {
    for (name, mut store) in stores() {
        store.add(item("a", json!(1), 1.0, "x")).unwrap();
        assert!(!store.restore_snapshot("missing").unwrap(), "{name}");
        assert!(store.has("a"), "{name}");
    }
}

#[test]
fn test_snapshot_overwrite() {
    for (name, mut store) in stores() {
        store.add(item("a", json!(1), 1.0, "x")).unwrap();
        store.create_snapshot("s").unwrap();
        store.add(item("b", json!(2), 1.0, "x")).unwrap();
        store.create_snapshot("s").unwrap();
        store.delete("a").unwrap();
        store.delete("b").unwrap();

        store.restore_snapshot("s").unwrap();
        assert_eq!(store.keys(), vec!["a", "b"], "{name}");
        assert_eq!(store.snapshot_ids(), vec!["s"], "{name}");
    }
}

#[test]
fn test_filter_by_source() {
    for (name, mut store) in stores() {
        store.add(item("test1", json!("value1"), 1.0, "agent-1")).unwrap();
        store.add(item("test2", json!("value2"), 0.8, "agent-2")).unwrap();

        let agent1_items = store.by_source("agent-1");
        assert_eq!(agent1_items.len(), 1, "{name}");
        assert_eq!(agent1_items[0].key, "test1", "{name}");
        assert!(store.by_source("agent-3").is_empty(), "{name}");
    }
}

#[test]
fn test_filter_by_confidence_inclusive() {
    for (name, mut store) in stores() {
        store.add(item("test1", json!("value1"), 0.6, "a")).unwrap();
        store.add(item("test2", json!("value2"), 0.8, "a")).unwrap();

        let high = store.by_confidence(0.7);
        assert_eq!(high.len(), 1, "{name}");
        assert_eq!(high[0].key, "test2", "{name}");
        assert_eq!(store.by_confidence(0.8).len(), 1, "{name}");
        assert_eq!(store.by_confidence(0.6).len(), 2, "{name}");
    }
}

#[test]
fn test_required_context() {
    for (name, mut store) in stores() {
        store.add(item("p", json!(1), 1.0, "user")).unwrap();
        assert!(has_required_context(&*store, &["p"]), "{name}");
        assert!(!has_required_context(&*store, &["p", "q"]), "{name}");
    }
}

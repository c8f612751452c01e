//! Per-session store selection.

use crate::config::SessionConfig;
use conclave_domain::{ContextItem, ContextReader, ContextStore, ItemPatch};
use conclave_store::{MemoryStore, SqliteStore, SqliteStoreConfig, StoreError};

/// The store behind one session
pub enum SessionStore {
    /// Written through to SQLite, survives restarts
    Durable(SqliteStore),
    /// Process lifetime only
    Memory(MemoryStore),
}

impl SessionStore {
    /// Whether writes reach the database
    pub fn is_durable(&self) -> bool {
        matches!(self, SessionStore::Durable(_))
    }

    fn reader(&self) -> &dyn ContextReader {
        match self {
            SessionStore::Durable(store) => store,
            SessionStore::Memory(store) => store,
        }
    }

    fn writer(&mut self) -> &mut dyn ContextStore<Error = StoreError> {
        match self {
            SessionStore::Durable(store) => store,
            SessionStore::Memory(store) => store,
        }
    }
}

/// Open the store for a session
///
/// Connects to the configured database; when none is configured, or the
/// connection fails, the session gets an in-memory store instead.
pub fn open_store(config: &SessionConfig, session_id: &str) -> SessionStore {
    let Some(path) = &config.database_path else {
        return SessionStore::Memory(MemoryStore::new());
    };

    let mut store_config = SqliteStoreConfig::new(path, session_id);
    if let Some(limit) = config.history_load_limit {
        store_config = store_config.with_history_limit(limit);
    }

    match SqliteStore::connect(&store_config) {
        Ok(store) => {
            tracing::debug!(
                "Session {} opened at {} ({} live items)",
                session_id,
                path.display(),
                store.len()
            );
            SessionStore::Durable(store)
        }
        Err(e) => {
            tracing::warn!(
                "Session {} falling back to in-memory store: {}",
                session_id,
                e
            );
            SessionStore::Memory(MemoryStore::new())
        }
    }
}

impl ContextReader for SessionStore {
    fn get(&self, key: &str) -> Option<&ContextItem> {
        self.reader().get(key)
    }

    fn items(&self) -> Vec<&ContextItem> {
        self.reader().items()
    }

    fn history(&self, key: &str) -> &[ContextItem] {
        self.reader().history(key)
    }

    fn has(&self, key: &str) -> bool {
        self.reader().has(key)
    }

    fn len(&self) -> usize {
        self.reader().len()
    }
}

impl ContextStore for SessionStore {
    type Error = StoreError;

    fn add(&mut self, item: ContextItem) -> Result<(), StoreError> {
        self.writer().add(item)
    }

    fn update_with(&mut self, key: &str, patch: ItemPatch) -> Result<(), StoreError> {
        self.writer().update_with(key, patch)
    }

    fn delete(&mut self, key: &str) -> Result<bool, StoreError> {
        self.writer().delete(key)
    }

    fn create_snapshot(&mut self, id: &str) -> Result<String, StoreError> {
        self.writer().create_snapshot(id)
    }

    fn restore_snapshot(&mut self, id: &str) -> Result<bool, StoreError> {
        self.writer().restore_snapshot(id)
    }

    fn snapshot_ids(&self) -> Vec<String> {
        match self {
            SessionStore::Durable(store) => store.snapshot_ids(),
            SessionStore::Memory(store) => store.snapshot_ids(),
        }
    }
}

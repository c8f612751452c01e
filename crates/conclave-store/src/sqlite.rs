//! Durable store backed by SQLite
//!
//! Rows are partitioned by session id. A session's live items, history and
//! snapshots are loaded into memory by [`SqliteStore::connect`]; reads are
//! served from memory and every mutation writes through before the in-memory
//! state changes.

use crate::state::{ContextState, Snapshot};
use crate::StoreError;
use conclave_domain::{now_millis, ContextItem, ContextReader, ContextStore, ItemPatch};
use rusqlite::{params, Connection, Row};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

const ITEM_COLUMNS: &str = "key, value, confidence, source, timestamp, reasoning, parent_keys";

/// Connection settings for [`SqliteStore`]
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Database file; `:memory:` for a throwaway database
    pub path: PathBuf,

    /// Session partition this store owns
    pub session_id: String,

    /// Keep only the latest N history entries per key when loading
    ///
    /// `None` loads the full history. Must be at least 1 so every live item
    /// keeps its own history entry.
    pub history_load_limit: Option<usize>,
}

impl SqliteStoreConfig {
    /// Settings for one session in one database file
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            session_id: session_id.into(),
            history_load_limit: None,
        }
    }

    /// Limit the history loaded per key
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_load_limit = Some(limit);
        self
    }
}

/// SQLite-backed implementation of [`ContextStore`]
///
/// A value of this type only exists once its session has been fully loaded,
/// so no read or write can observe a partially loaded store.
///
/// # Examples
///
/// ```no_run
/// use conclave_store::{SqliteStore, SqliteStoreConfig};
///
/// let store = SqliteStore::connect(&SqliteStoreConfig::new("conclave.db", "session-1")).unwrap();
/// // Store is now ready for context operations
/// ```
pub struct SqliteStore {
    // Connection is Send but not Sync; the mutex lets the store act as a shared read view
    conn: Mutex<Connection>,
    session_id: String,
    state: ContextState,
}

impl SqliteStore {
    /// Open the database, apply the schema, and load the session partition
    ///
    /// Any failure here is fatal to the store and reported as
    /// [`StoreError::Connection`].
    pub fn connect(config: &SqliteStoreConfig) -> Result<Self, StoreError> {
        if config.history_load_limit == Some(0) {
            return Err(StoreError::Connection(
                "history_load_limit must be at least 1".to_string(),
            ));
        }

        let conn = Connection::open(&config.path)
            .map_err(|e| StoreError::Connection(format!("{}: {}", config.path.display(), e)))?;
        conn.execute_batch(include_str!("schema.sql"))
            .map_err(|e| StoreError::Connection(format!("schema setup failed: {}", e)))?;

        let state = Self::load(&conn, &config.session_id, config.history_load_limit).map_err(|e| {
            StoreError::Connection(format!("failed to load session {}: {}", config.session_id, e))
        })?;

        info!(
            "Loaded session {}: {} context items, {} history entries, {} snapshots",
            config.session_id,
            state.len(),
            state.history_count(),
            state.snapshot_ids().len()
        );

        Ok(Self {
            conn: Mutex::new(conn),
            session_id: config.session_id.clone(),
            state,
        })
    }

    /// Open a private in-memory database (useful for testing)
    pub fn open_in_memory(session_id: impl Into<String>) -> Result<Self, StoreError> {
        Self::connect(&SqliteStoreConfig::new(":memory:", session_id))
    }

    /// Session partition owned by this store
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Read a stored snapshot
    pub fn snapshot(&self, id: &str) -> Option<&Snapshot> {
        self.state.snapshot(id)
    }

    /// Delete every row of a session partition
    ///
    /// Returns the number of rows removed across all tables.
    pub fn purge_session<P: AsRef<Path>>(path: P, session_id: &str) -> Result<usize, StoreError> {
        let mut conn = Connection::open(path)?;
        conn.execute_batch(include_str!("schema.sql"))?;

        let tx = conn.transaction()?;
        let mut removed = 0;
        for table in ["context_items", "history_items", "snapshots"] {
            removed += tx.execute(
                &format!("DELETE FROM {} WHERE session_id = ?1", table),
                params![session_id],
            )?;
        }
        tx.commit()?;

        info!("Purged session {} ({} rows)", session_id, removed);
        Ok(removed)
    }

    fn load(
        conn: &Connection,
        session_id: &str,
        history_limit: Option<usize>,
    ) -> Result<ContextState, StoreError> {
        let mut state = ContextState::new();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM context_items WHERE session_id = ?1",
            ITEM_COLUMNS
        ))?;
        let live = stmt
            .query_map(params![session_id], row_to_item)?
            .collect::<Result<Vec<_>, _>>()?;
        for item in live {
            state.load_live(item);
        }

        // History rows come back in mutation order; the window keeps the newest N per key
        let history = match history_limit {
            Some(limit) => {
                // Anything beyond i64 is effectively unlimited
                let limit = i64::try_from(limit).unwrap_or(i64::MAX);
                let mut stmt = conn.prepare(&format!(
                    "SELECT {cols} FROM (
                         SELECT seq, {cols},
                                ROW_NUMBER() OVER (PARTITION BY key ORDER BY seq DESC) AS rn
                         FROM history_items WHERE session_id = ?1
                     ) WHERE rn <= ?2 ORDER BY seq",
                    cols = ITEM_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![session_id, limit], row_to_item)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM history_items WHERE session_id = ?1 ORDER BY seq",
                    ITEM_COLUMNS
                ))?;
                let rows = stmt
                    .query_map(params![session_id], row_to_item)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        for item in history {
            state.load_history(item);
        }

        let mut stmt =
            conn.prepare("SELECT id, items, created_at FROM snapshots WHERE session_id = ?1")?;
        let snapshots = stmt
            .query_map(params![session_id], |row| {
                Ok(Snapshot {
                    id: row.get(0)?,
                    items: json_column::<HashMap<String, ContextItem>>(row, 1)?,
                    created_at: row.get::<_, i64>(2)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for snapshot in snapshots {
            state.put_snapshot(snapshot);
        }

        Ok(state)
    }

    /// Persist an item as live and append it to history, atomically
    fn write_item(&mut self, item: &ContextItem) -> Result<(), StoreError> {
        let value = serde_json::to_string(&item.value)?;
        let parents = serde_json::to_string(&item.parent_context_keys)?;

        let conn = self.conn.get_mut().map_err(poisoned)?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO context_items (session_id, key, value, confidence, source, timestamp, reasoning, parent_keys)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(session_id, key) DO UPDATE SET
             value = excluded.value, confidence = excluded.confidence, source = excluded.source,
             timestamp = excluded.timestamp, reasoning = excluded.reasoning, parent_keys = excluded.parent_keys",
            params![
                &self.session_id,
                &item.key,
                &value,
                item.confidence,
                &item.source,
                item.timestamp as i64,
                &item.reasoning,
                &parents,
            ],
        )?;
        tx.execute(
            "INSERT INTO history_items (session_id, key, value, confidence, source, timestamp, reasoning, parent_keys)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &self.session_id,
                &item.key,
                &value,
                item.confidence,
                &item.source,
                item.timestamp as i64,
                &item.reasoning,
                &parents,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn poisoned<T>(_: PoisonError<T>) -> StoreError {
    StoreError::Connection("connection lock poisoned".to_string())
}

/// Decode a JSON text column
fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Map a row selected with [`ITEM_COLUMNS`] to an item
fn row_to_item(row: &Row<'_>) -> rusqlite::Result<ContextItem> {
    Ok(ContextItem {
        key: row.get(0)?,
        value: json_column(row, 1)?,
        confidence: row.get(2)?,
        source: row.get(3)?,
        timestamp: row.get::<_, i64>(4)? as u64,
        reasoning: row.get(5)?,
        parent_context_keys: json_column(row, 6)?,
    })
}

impl ContextReader for SqliteStore {
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

impl ContextStore for SqliteStore {
    type Error = StoreError;

    fn add(&mut self, item: ContextItem) -> Result<(), Self::Error> {
        self.state.prepare_add(&item)?;
        self.write_item(&item)?;
        debug!("Added context item: {}", item.key);
        self.state.record(item);
        Ok(())
    }

    fn update_with(&mut self, key: &str, patch: ItemPatch) -> Result<(), Self::Error> {
        let next = self.state.prepare_update(key, patch, now_millis())?;
        self.write_item(&next)?;
        debug!("Updated context item: {}", key);
        self.state.record(next);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool, Self::Error> {
        if !self.state.has(key) {
            return Ok(false);
        }

        let conn = self.conn.get_mut().map_err(poisoned)?;
        conn.execute(
            "DELETE FROM context_items WHERE session_id = ?1 AND key = ?2",
            params![&self.session_id, key],
        )?;
        self.state.remove(key);
        debug!("Deleted context item: {}", key);
        Ok(true)
    }

    fn create_snapshot(&mut self, id: &str) -> Result<String, Self::Error> {
        let snapshot = self.state.capture(id, now_millis());
        let document = serde_json::to_string(&snapshot.items)?;

        let conn = self.conn.get_mut().map_err(poisoned)?;
        conn.execute(
            "INSERT INTO snapshots (session_id, id, items, created_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id, id) DO UPDATE SET items = excluded.items, created_at = excluded.created_at",
            params![&self.session_id, id, &document, snapshot.created_at as i64],
        )?;

        self.state.put_snapshot(snapshot);
        debug!("Created snapshot: {}", id);
        Ok(id.to_string())
    }

    /// Rewrites the session's live rows in one transaction
    ///
    /// Memory is swapped only after the commit succeeds, so a failure leaves
    /// both memory and disk in the pre-restore state.
    fn restore_snapshot(&mut self, id: &str) -> Result<bool, Self::Error> {
        let Some(items) = self.state.snapshot(id).map(|s| s.items.clone()) else {
            return Ok(false);
        };

        let conn = self.conn.get_mut().map_err(poisoned)?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM context_items WHERE session_id = ?1",
            params![&self.session_id],
        )?;
        for item in items.values() {
            tx.execute(
                "INSERT INTO context_items (session_id, key, value, confidence, source, timestamp, reasoning, parent_keys)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    &self.session_id,
                    &item.key,
                    serde_json::to_string(&item.value)?,
                    item.confidence,
                    &item.source,
                    item.timestamp as i64,
                    &item.reasoning,
                    serde_json::to_string(&item.parent_context_keys)?,
                ],
            )?;
        }
        tx.commit()?;

        self.state.replace_live(items);
        info!("Restored snapshot: {}", id);
        Ok(true)
    }

    fn snapshot_ids(&self) -> Vec<String> {
        self.state.snapshot_ids()
    }
}

//! Session management: one orchestrator and store per session id.
//!
//! Sessions are created on demand, serialized per id (one `process` call at a
//! time per session), and evicted after sitting idle for the configured TTL.
//! Evicting a durable session only drops it from memory; reopening the id
//! reloads it from the database.

use crate::catalog::AgentCatalog;
use crate::config::{ConfigError, SessionConfig};
use crate::store::{open_store, SessionStore};
use conclave_domain::ContextItem;
use conclave_orchestrator::{Orchestrator, OrchestratorError, RunReport};
use conclave_store::{SqliteStore, StoreError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::interval;
use uuid::Uuid;

/// Session identifier (a UUIDv7 string for generated sessions)
pub type SessionId = String;

/// Orchestrator of one session, shared between callers of that session
pub type SharedOrchestrator = Arc<Mutex<Orchestrator<SessionStore>>>;

/// Session management error
#[derive(Debug, Error)]
pub enum SessionError {
    /// No live session with this id
    #[error("Session not found: {0}")]
    NotFound(SessionId),

    /// An agent id that the catalog does not know
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// Building or running the session's orchestrator failed
    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Removing persisted session data failed
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

struct SessionEntry {
    orchestrator: SharedOrchestrator,
    last_used: Instant,
}

/// Owns every live session
///
/// # Examples
///
/// ```
/// use conclave_domain::{ContextItem, ContextReader};
/// use conclave_session::{AgentCatalog, SessionConfig, SessionManager};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = SessionManager::new(SessionConfig::default(), AgentCatalog::new())?;
/// let session = manager.create_session().await?;
///
/// let seed = ContextItem::builder("user_input", json!("hello"), "user").build();
/// manager.process(&session, vec![seed]).await?;
///
/// let has_input = manager.with_store(&session, |store| store.has("user_input")).await?;
/// assert!(has_input);
/// # Ok(())
/// # }
/// ```
pub struct SessionManager {
    config: SessionConfig,
    catalog: AgentCatalog,
    sessions: RwLock<HashMap<SessionId, SessionEntry>>,
}

impl SessionManager {
    /// Create a manager after validating the configuration
    pub fn new(config: SessionConfig, catalog: AgentCatalog) -> Result<Self, SessionError> {
        config.validate()?;
        tracing::info!(
            "Session manager ready ({} catalog agents, {} storage, ttl {}s)",
            catalog.len(),
            if config.database_path.is_some() { "durable" } else { "in-memory" },
            config.session_ttl_secs
        );
        Ok(Self {
            config,
            catalog,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Start a new session under a fresh UUIDv7 id
    pub async fn create_session(&self) -> Result<SessionId, SessionError> {
        let id = Uuid::now_v7().to_string();
        self.open_session(&id).await?;
        Ok(id)
    }

    /// Reuse a live session, reopen a known id, or start a new one
    ///
    /// With a durable store, passing an id that is not live reloads whatever
    /// that session persisted.
    pub async fn get_or_create(&self, id: Option<&str>) -> Result<SessionId, SessionError> {
        match id {
            Some(id) => {
                if self.touch(id).await.is_none() {
                    self.open_session(id).await?;
                }
                Ok(id.to_string())
            }
            None => self.create_session().await,
        }
    }

    /// Run the session's orchestrator over new seed items
    pub async fn process(
        &self,
        id: &str,
        items: Vec<ContextItem>,
    ) -> Result<RunReport, SessionError> {
        let orchestrator = self
            .touch(id)
            .await
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let mut orchestrator = orchestrator.lock().await;
        tracing::debug!("Processing {} items in session {}", items.len(), id);
        let report = orchestrator.process(items).await?;
        Ok(report)
    }

    /// Read from a session's store, e.g. to extract results
    pub async fn with_store<F, R>(&self, id: &str, f: F) -> Result<R, SessionError>
    where
        F: FnOnce(&SessionStore) -> R,
    {
        let orchestrator = self
            .touch(id)
            .await
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;

        let orchestrator = orchestrator.lock().await;
        Ok(f(orchestrator.store()))
    }

    /// Shared handle to a session's orchestrator
    pub async fn orchestrator(&self, id: &str) -> Option<SharedOrchestrator> {
        self.touch(id).await
    }

    /// Drop a session from memory; persisted data is kept
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::info!("Removed session {}", id);
        }
        removed
    }

    /// Drop a session and delete everything it persisted
    ///
    /// Returns the number of database rows removed (0 without a database).
    pub async fn purge(&self, id: &str) -> Result<usize, SessionError> {
        self.remove(id).await;
        match &self.config.database_path {
            Some(path) => {
                let rows = SqliteStore::purge_session(path, id)?;
                tracing::info!("Purged session {} ({} rows)", id, rows);
                Ok(rows)
            }
            None => Ok(0),
        }
    }

    /// Evict sessions idle for at least the TTL as of `now`
    ///
    /// Sessions in the middle of a run are skipped. Returns how many were
    /// evicted.
    pub async fn evict_idle(&self, now: Instant) -> usize {
        let ttl = self.config.session_ttl();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|id, entry| {
            let idle = now.saturating_duration_since(entry.last_used);
            let busy = entry.orchestrator.try_lock().is_err();
            let keep = busy || idle < ttl;
            if !keep {
                tracing::debug!("Evicting session {} (idle {:?})", id, idle);
            }
            keep
        });

        before - sessions.len()
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is live
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Ids of live sessions, sorted
    pub async fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Run `evict_idle` every `eviction_interval_secs` in the background
    ///
    /// The task holds only a weak reference and stops once the manager is
    /// dropped; abort the handle to stop it sooner.
    pub fn spawn_eviction(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::downgrade(self);
        let period = self.config.eviction_interval();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            tracing::info!("Session eviction started (interval: {:?})", period);

            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;

                let Some(manager) = manager.upgrade() else {
                    tracing::info!("Session manager dropped, stopping eviction");
                    break;
                };

                let evicted = manager.evict_idle(Instant::now()).await;
                if evicted > 0 {
                    let remaining = manager.len().await;
                    tracing::info!("Evicted {} idle sessions, {} remain", evicted, remaining);
                }
            }
        })
    }

    /// Mark a live session as used and return its orchestrator
    async fn touch(&self, id: &str) -> Option<SharedOrchestrator> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        entry.last_used = Instant::now();
        Some(entry.orchestrator.clone())
    }

    /// Build a session's orchestrator and insert it, unless another caller won
    async fn open_session(&self, id: &str) -> Result<(), SessionError> {
        let store = open_store(&self.config, id);
        let durable = store.is_durable();

        let mut orchestrator =
            Orchestrator::with_store(store).with_config(self.config.orchestrator.clone())?;
        let agents = self.catalog.build_enabled(&self.config)?;
        let agent_count = agents.len();
        for agent in agents {
            orchestrator.register_agent(agent)?;
        }

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(id) {
            return Ok(());
        }
        sessions.insert(
            id.to_string(),
            SessionEntry {
                orchestrator: Arc::new(Mutex::new(orchestrator)),
                last_used: Instant::now(),
            },
        );

        tracing::info!(
            "Opened session {} ({}, {} agents)",
            id,
            if durable { "durable" } else { "in-memory" },
            agent_count
        );
        Ok(())
    }
}

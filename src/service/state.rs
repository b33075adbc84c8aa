//! Service state management.
//!
//! Contains the shared store, engine configuration, and the registry of
//! live reading sessions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::{EngineConfig, DEFAULT_SESSION_TTL_SECS};
use crate::session::ReadingSession;
use crate::store::NarrativeStore;

/// A live session behind its own lock.
///
/// The async mutex serializes choose/finish/restart on one session while
/// other sessions proceed independently.
pub type SessionHandle<S> = Arc<Mutex<ReadingSession<S>>>;

struct Entry<S: NarrativeStore> {
    handle: SessionHandle<S>,
    touched: Instant,
}

/// Live reading sessions keyed by handle.
///
/// Sessions untouched for longer than the idle TTL are evicted, ended ones
/// included. Eviction runs on every insert and via [`Self::evict_idle`].
pub struct SessionRegistry<S: NarrativeStore> {
    sessions: RwLock<HashMap<Uuid, Entry<S>>>,
    idle_ttl: Duration,
}

impl<S: NarrativeStore> SessionRegistry<S> {
    /// Create an empty registry.
    pub fn new(idle_ttl: Duration) -> Self {
        Self { sessions: RwLock::new(HashMap::new()), idle_ttl }
    }

    /// Idle time after which a session is evicted.
    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    /// Register a session and return its handle id.
    pub fn insert(&self, session: ReadingSession<S>) -> Uuid {
        self.evict_idle();
        let id = Uuid::new_v4();
        let entry = Entry { handle: Arc::new(Mutex::new(session)), touched: Instant::now() };
        self.sessions.write().insert(id, entry);
        id
    }

    /// Look up a session and mark it as touched.
    pub fn get(&self, id: &Uuid) -> Option<SessionHandle<S>> {
        let mut sessions = self.sessions.write();
        let entry = sessions.get_mut(id)?;
        if entry.touched.elapsed() >= self.idle_ttl {
            sessions.remove(id);
            tracing::debug!(session_id = %id, "Session expired on lookup");
            return None;
        }
        entry.touched = Instant::now();
        Some(Arc::clone(&entry.handle))
    }

    /// Drop a session. Returns whether it existed.
    pub fn remove(&self, id: &Uuid) -> bool {
        self.sessions.write().remove(id).is_some()
    }

    /// Drop every session idle for at least the TTL. Returns how many went.
    pub fn evict_idle(&self) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, entry| entry.touched.elapsed() < self.idle_ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
        evicted
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    /// Whether no sessions are live.
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl<S: NarrativeStore> Default for SessionRegistry<S> {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_SESSION_TTL_SECS))
    }
}

/// Shared service state.
pub struct ServiceState<S: NarrativeStore> {
    /// Story and progress backend.
    pub store: Arc<S>,
    /// Engine settings.
    pub config: EngineConfig,
    /// Live reading sessions.
    pub sessions: Arc<SessionRegistry<S>>,
}

impl<S: NarrativeStore> ServiceState<S> {
    /// Create service state around a store.
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self {
            store: Arc::new(store),
            sessions: Arc::new(SessionRegistry::new(config.session_idle_ttl)),
            config,
        }
    }

    /// Create service state with configuration read from the environment.
    pub fn from_env(store: S) -> Self {
        Self::new(store, EngineConfig::from_env())
    }
}

impl<S: NarrativeStore> Clone for ServiceState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            sessions: Arc::clone(&self.sessions),
        }
    }
}

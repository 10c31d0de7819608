//! Session registry with idle eviction

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::session::session::{ChatSession, SessionSettings};

/// Idle time after which a session is reclaimed.
const SESSION_TTL_HOURS: i64 = 12;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Session {0} not found")]
    NotFound(String),

    #[error("Failed to allocate session workspace: {0}")]
    Workspace(#[from] std::io::Error),
}

/// Concurrency-safe session map
///
/// Entries are `Arc<Mutex<ChatSession>>`: the mutex serializes question
/// handling per session, and the `Arc` keeps an in-flight session alive
/// even when it gets evicted mid-question.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Mutex<ChatSession>>>>,
    settings: SessionSettings,
    init_script: String,
    ttl: chrono::Duration,
}

impl SessionRegistry {
    pub fn new(settings: SessionSettings, init_script: impl Into<String>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            settings,
            init_script: init_script.into(),
            ttl: chrono::Duration::hours(SESSION_TTL_HOURS),
        }
    }

    /// Override the idle TTL.
    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Create a session under `id`, replacing any session already stored
    /// there and sweeping idle entries while the map is locked.
    pub async fn create(&self, id: &str) -> Result<(), RegistryError> {
        let session = ChatSession::new(id, self.settings.clone(), &self.init_script)?;

        let mut sessions = self.sessions.write().await;
        if sessions.remove(id).is_some() {
            info!(session_id = id, "Replacing existing session");
        }
        self.sweep(&mut sessions);
        info!(session_id = id, created_at = %session.created_at(), "Session created");
        sessions.insert(id.to_string(), Arc::new(Mutex::new(session)));
        Ok(())
    }

    /// Remove a session, failing when the id is unknown.
    pub async fn remove(&self, id: &str) -> Result<(), RegistryError> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Fetch a handle to a session for question handling.
    pub async fn get(&self, id: &str) -> Option<Arc<Mutex<ChatSession>>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop every session idle longer than the TTL. A session whose mutex
    /// is held is mid-question and therefore not idle.
    fn sweep(&self, sessions: &mut HashMap<String, Arc<Mutex<ChatSession>>>) {
        let now = Utc::now();
        sessions.retain(|id, entry| match entry.try_lock() {
            Ok(session) => {
                let keep = now.signed_duration_since(session.last_used()) <= self.ttl;
                if !keep {
                    debug!(session_id = %id, "Evicting idle session");
                }
                keep
            }
            Err(_) => true,
        });
    }
}

//! Per-session conversation history.
//!
//! Sessions live in memory for the lifetime of the process. Each session is
//! behind its own async mutex, so queries of one session run one at a time while
//! different sessions proceed independently.

use crate::error::{KursdeskError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// One question and its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub query: String,
    pub answer: String,
}

impl Exchange {
    pub fn new(query: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            answer: answer.into(),
        }
    }
}

/// Append-only record of a session's exchanges.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    exchanges: Vec<Exchange>,
    last_active: DateTime<Utc>,
}

impl ConversationContext {
    pub fn new() -> Self {
        Self {
            exchanges: Vec::new(),
            last_active: Utc::now(),
        }
    }

    /// Append an exchange.
    pub fn record(&mut self, query: impl Into<String>, answer: impl Into<String>) {
        self.exchanges.push(Exchange::new(query, answer));
        self.last_active = Utc::now();
    }

    /// The most recent `max` exchanges, oldest first.
    pub fn recent(&self, max: usize) -> &[Exchange] {
        let start = self.exchanges.len().saturating_sub(max);
        &self.exchanges[start..]
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    pub fn clear(&mut self) {
        self.exchanges.clear();
        self.last_active = Utc::now();
    }

    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_active
    }

    #[cfg(test)]
    pub(crate) fn backdate(&mut self, by: Duration) {
        self.last_active = self.last_active - by;
    }
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one session's context.
pub type SessionHandle = Arc<Mutex<ConversationContext>>;

/// Sessions keyed by opaque id.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new empty session and return its id.
    pub fn create_session(&self) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.write()?
            .insert(id.clone(), Arc::new(Mutex::new(ConversationContext::new())));
        debug!("Created session {}", id);
        Ok(id)
    }

    /// Look up a session, creating it when the id is absent or unknown.
    pub fn get_or_create(&self, id: Option<&str>) -> Result<(String, SessionHandle)> {
        let id = match id.map(str::trim).filter(|s| !s.is_empty()) {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        };

        if let Some(handle) = self.read()?.get(&id) {
            return Ok((id, handle.clone()));
        }

        let handle = self
            .write()?
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(ConversationContext::new())))
            .clone();
        Ok((id, handle))
    }

    pub fn get(&self, id: &str) -> Result<Option<SessionHandle>> {
        Ok(self.read()?.get(id).cloned())
    }

    /// Forget a session's history but keep the id.
    pub async fn clear(&self, id: &str) -> Result<bool> {
        let handle = self.get(id)?;
        match handle {
            Some(handle) => {
                handle.lock().await.clear();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drop a session entirely.
    pub fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.write()?.remove(id).is_some())
    }

    /// Remove sessions idle for longer than `max_idle`. Sessions busy with a
    /// query are kept.
    pub fn evict_idle(&self, max_idle: Duration) -> Result<usize> {
        let Some(cutoff) = Utc::now().checked_sub_signed(max_idle) else {
            return Ok(0);
        };
        let mut sessions = self.write()?;
        let before = sessions.len();
        sessions.retain(|_, handle| match handle.try_lock() {
            Ok(context) => context.last_active() >= cutoff,
            Err(_) => true,
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("Evicted {} idle sessions", evicted);
        }
        Ok(evicted)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, SessionHandle>>> {
        self.sessions
            .read()
            .map_err(|e| KursdeskError::Session(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, SessionHandle>>> {
        self.sessions
            .write()
            .map_err(|e| KursdeskError::Session(format!("Failed to acquire lock: {}", e)))
    }
}

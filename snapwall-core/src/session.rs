//! Per-activity participant identity.
//!
//! A session id is a random v4 UUID created the first time an activity is
//! visited and reused for the rest of the browsing session. "Browsing
//! session" maps to the lifetime of the storage backend; the in-memory
//! backend lives as long as the process.

use std::collections::HashMap;

use uuid::Uuid;

const LAST_ACTIVITY_KEY: &str = "last-activity";

fn session_key(activity_id: &str) -> String {
    format!("session-{activity_id}")
}

/// Minimal string key-value store.
pub trait SessionStorage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String);
    fn remove(&mut self, key: &str);
}

/// Process-lifetime storage.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.entries.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// Session ids keyed by activity, plus the most recently visited activity.
///
/// Session ids go to `session` storage; the last-activity marker goes to
/// `local` storage, which a backend may keep around longer.
pub struct SessionStore<S: SessionStorage = MemoryStorage> {
    session: S,
    local: S,
}

impl SessionStore<MemoryStorage> {
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new(), MemoryStorage::new())
    }
}

impl<S: SessionStorage> SessionStore<S> {
    pub fn new(session: S, local: S) -> Self {
        Self { session, local }
    }

    /// Stored session id for `activity_id`, creating one on first use.
    pub fn get_or_create(&mut self, activity_id: &str) -> String {
        let key = session_key(activity_id);
        if let Some(existing) = self.session.get(&key).filter(|id| !id.is_empty()) {
            return existing;
        }
        let id = Uuid::new_v4().to_string();
        log::debug!("New session {id} for activity {activity_id}");
        self.session.set(&key, id.clone());
        id
    }

    pub fn get(&self, activity_id: &str) -> Option<String> {
        self.session.get(&session_key(activity_id))
    }

    /// Forget the session id; the next lookup creates a new one.
    pub fn clear(&mut self, activity_id: &str) {
        self.session.remove(&session_key(activity_id));
    }

    pub fn remember_activity(&mut self, activity_id: &str) {
        self.local.set(LAST_ACTIVITY_KEY, activity_id.to_string());
    }

    pub fn last_activity(&self) -> Option<String> {
        self.local.get(LAST_ACTIVITY_KEY)
    }

    pub fn forget_activity(&mut self) {
        self.local.remove(LAST_ACTIVITY_KEY);
    }
}

impl Default for SessionStore<MemoryStorage> {
    fn default() -> Self {
        Self::in_memory()
    }
}

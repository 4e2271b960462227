//! Process-local cache of sessions open in this process.
//!
//! Never persisted. After a restart the registry starts empty and is
//! refilled by the next `start` through the marker and durable store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::models::session::ActiveSessionHandle;

/// `session id → handle` map shared by the orchestrator and checkpointing.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    handles: Mutex<HashMap<String, ActiveSessionHandle>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ActiveSessionHandle>> {
        // Every critical section leaves the map consistent.
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a handle by id.
    pub fn set(&self, handle: ActiveSessionHandle) {
        self.lock().insert(handle.id.clone(), handle);
    }

    /// Handle for `id`, or the one with the newest `last_activity` when
    /// `id` is `None`.
    #[must_use]
    pub fn get(&self, id: Option<&str>) -> Option<ActiveSessionHandle> {
        let handles = self.lock();
        match id {
            Some(id) => handles.get(id).cloned(),
            None => handles
                .values()
                .max_by_key(|handle| handle.last_activity)
                .cloned(),
        }
    }

    /// Advance `last_activity` to now. No-op when `id` is absent.
    pub fn touch(&self, id: &str) -> Option<DateTime<Utc>> {
        self.touch_at(id, Utc::now())
    }

    /// Advance `last_activity` to `at`, never moving it backwards.
    pub fn touch_at(&self, id: &str, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut handles = self.lock();
        let handle = handles.get_mut(id)?;
        if at > handle.last_activity {
            handle.last_activity = at;
        }
        Some(handle.last_activity)
    }

    /// Evict a handle.
    pub fn remove(&self, id: &str) -> Option<ActiveSessionHandle> {
        self.lock().remove(id)
    }

    /// Number of held handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no session is open in this process.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

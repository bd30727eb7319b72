//! Keyed session registry with idle eviction.
//!
//! Sessions are created on first use, touched on every access, and evicted
//! once idle for the configured timeout (or removed explicitly when they
//! end). Eviction runs opportunistically on access and on demand via
//! `evict_idle`; there is no background reaper thread.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::defaults;
use crate::segmenter::{Clock, SystemClock};

struct Entry<T> {
    value: Arc<T>,
    last_touch: Instant,
}

/// Registry of live sessions keyed by id.
pub struct SessionRegistry<T, C: Clock = SystemClock> {
    entries: Mutex<HashMap<String, Entry<T>>>,
    idle_timeout: Duration,
    clock: C,
}

impl<T> SessionRegistry<T, SystemClock> {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(defaults::IDLE_EVICTION_SECS))
    }

    pub fn with_timeout(idle_timeout: Duration) -> Self {
        Self::with_clock(idle_timeout, SystemClock)
    }
}

impl<T> Default for SessionRegistry<T, SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Clock> SessionRegistry<T, C> {
    pub fn with_clock(idle_timeout: Duration, clock: C) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            idle_timeout,
            clock,
        }
    }

    /// Fetch a session, creating it on first use. Touches the entry.
    pub fn get_or_insert_with<F>(&self, id: &str, create: F) -> Arc<T>
    where
        F: FnOnce() -> T,
    {
        let now = self.clock.now();
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        Self::evict_idle_locked(&mut entries, now, self.idle_timeout);

        let entry = entries.entry(id.to_string()).or_insert_with(|| Entry {
            value: Arc::new(create()),
            last_touch: now,
        });
        entry.last_touch = now;
        Arc::clone(&entry.value)
    }

    /// Fetch a session without creating one. Touches the entry when found.
    pub fn get(&self, id: &str) -> Option<Arc<T>> {
        let now = self.clock.now();
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        Self::evict_idle_locked(&mut entries, now, self.idle_timeout);

        entries.get_mut(id).map(|entry| {
            entry.last_touch = now;
            Arc::clone(&entry.value)
        })
    }

    /// Remove a session explicitly (session ended).
    pub fn remove(&self, id: &str) -> Option<Arc<T>> {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.remove(id).map(|entry| entry.value)
    }

    /// Drop every entry idle past the timeout. Returns how many went.
    pub fn evict_idle(&self) -> usize {
        let now = self.clock.now();
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        Self::evict_idle_locked(&mut entries, now, self.idle_timeout)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_idle_locked(
        entries: &mut HashMap<String, Entry<T>>,
        now: Instant,
        timeout: Duration,
    ) -> usize {
        let before = entries.len();
        entries.retain(|id, entry| {
            let keep = now.duration_since(entry.last_touch) < timeout;
            if !keep {
                tracing::info!(session = %id, "evicting idle session");
            }
            keep
        });
        before - entries.len()
    }
}

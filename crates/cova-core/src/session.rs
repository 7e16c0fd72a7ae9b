//! Per-session scratch storage written by the gateway.
//!
//! The run pipeline never reads from here. Transports that keep sessions
//! inject a store; everything else runs without one.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

pub trait SessionStore: Send + Sync {
    fn put(&self, session: &str, key: &str, value: Value);

    fn get(&self, session: &str, key: &str) -> Option<Value>;
}

#[derive(Debug, Default)]
struct Sessions {
    entries: HashMap<String, Slot>,
    /// Monotonic write counter; the slot with the lowest stamp is evicted first.
    clock: u64,
}

#[derive(Debug)]
struct Slot {
    touched: u64,
    values: HashMap<String, Value>,
}

/// In-memory store holding at most `capacity` sessions. Writing to a new
/// session when full evicts the least recently written one.
#[derive(Debug)]
pub struct InMemorySessionStore {
    capacity: usize,
    inner: Mutex<Sessions>,
}

impl InMemorySessionStore {
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(Sessions::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore for InMemorySessionStore {
    fn put(&self, session: &str, key: &str, value: Value) {
        let mut sessions = match self.inner.lock() {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "session store poisoned; dropping write");
                return;
            }
        };
        sessions.clock += 1;
        let now = sessions.clock;

        if !sessions.entries.contains_key(session) && sessions.entries.len() >= self.capacity {
            let oldest = sessions
                .entries
                .iter()
                .min_by_key(|(_, slot)| slot.touched)
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                sessions.entries.remove(&id);
                tracing::debug!(session = %id, "session evicted");
            }
        }

        let slot = sessions
            .entries
            .entry(session.to_string())
            .or_insert_with(|| Slot {
                touched: now,
                values: HashMap::new(),
            });
        slot.touched = now;
        slot.values.insert(key.to_string(), value);
    }

    fn get(&self, session: &str, key: &str) -> Option<Value> {
        let sessions = self.inner.lock().ok()?;
        sessions.entries.get(session)?.values.get(key).cloned()
    }
}

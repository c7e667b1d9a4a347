use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::store::StateStore;
use super::types::StateEntry;

/// In-memory state store with lazy expiry. Same contract as the Redis-backed
/// store; used in tests and single-process setups where Redis is overkill.
#[derive(Clone)]
pub struct MemoryStateStore {
    storage: Arc<DashMap<i32, (StateEntry, Instant)>>,
    ttl: Duration,
}

impl MemoryStateStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            storage: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(300))
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, user_id: i32) -> StateEntry {
        let expired = match self.storage.get(&user_id) {
            Some(entry) => {
                let (state, written_at) = entry.value();
                if written_at.elapsed() <= self.ttl {
                    return state.clone();
                }
                true
            }
            None => false,
        };

        if expired {
            self.storage.remove(&user_id);
            debug!("User {} state expired, removed from cache", user_id);
        }

        StateEntry::default()
    }

    async fn set(&self, user_id: i32, entry: StateEntry) {
        self.storage.insert(user_id, (entry, Instant::now()));
    }

    async fn clear(&self, user_id: i32) {
        self.storage.remove(&user_id);
    }
}

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use super::types::StateEntry;

/// Per-user conversation state, keyed by user id, with a TTL measured from the
/// last write.
///
/// Fail-soft contract: a store outage never surfaces as a conversation error.
/// `get` falls back to the default (IDLE) entry, `set`/`clear` log and swallow
/// the failure — the conversation continues, it just will not be remembered on
/// the next message.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, user_id: i32) -> StateEntry;
    async fn set(&self, user_id: i32, entry: StateEntry);
    async fn clear(&self, user_id: i32);
}

#[derive(Clone)]
pub struct RedisStateStore {
    conn: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisStateStore {
    pub async fn connect(redis_url: &str, ttl_seconds: u64) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        info!("Connected to Redis state store (ttl: {}s)", ttl_seconds);
        Ok(Self { conn, ttl_seconds })
    }

    fn key(user_id: i32) -> String {
        format!("user:{}:state", user_id)
    }
}

#[async_trait]
impl StateStore for RedisStateStore {
    async fn get(&self, user_id: i32) -> StateEntry {
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(Self::key(user_id)).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Undecodable state entry for user {}: {}", user_id, e);
                    StateEntry::default()
                }
            },
            Ok(None) => StateEntry::default(),
            Err(e) => {
                warn!("Error reading state for user {}: {}", user_id, e);
                StateEntry::default()
            }
        }
    }

    async fn set(&self, user_id: i32, entry: StateEntry) {
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to serialize state for user {}: {}", user_id, e);
                return;
            }
        };

        let mut conn = self.conn.clone();
        match conn
            .set_ex::<_, _, ()>(Self::key(user_id), raw, self.ttl_seconds)
            .await
        {
            Ok(()) => debug!("User {} state set to {:?}", user_id, entry.state),
            Err(e) => warn!("Error writing state for user {}: {}", user_id, e),
        }
    }

    async fn clear(&self, user_id: i32) {
        let mut conn = self.conn.clone();
        match conn.del::<_, ()>(Self::key(user_id)).await {
            Ok(()) => debug!("User {} state cleared", user_id),
            Err(e) => warn!("Error clearing state for user {}: {}", user_id, e),
        }
    }
}

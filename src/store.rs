//! Ephemeral token storage.
//!
//! Two interchangeable backends behind [`TokenStore`]: Redis with
//! native key expiry, and an in-process [`DashMap`] for single-instance
//! deployments. Values are stored as JSON strings so both backends
//! share one wire shape.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, IntoConnectionInfo};

use crate::broker::PendingApproval;
use crate::errors::AppError;

/// Keyed storage with TTL for pending approvals.
///
/// `take` is the consumption primitive: it must be atomic per key so
/// that concurrent approve/reject calls for the same run id cannot
/// both observe the entry.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn put(
        &self,
        run_id: &str,
        approval: &PendingApproval,
        ttl: Duration,
    ) -> Result<(), AppError>;

    async fn get(&self, run_id: &str) -> Result<Option<PendingApproval>, AppError>;

    /// Retrieve-and-remove in one step. Returns None for unknown,
    /// expired, and already-consumed keys alike.
    async fn take(&self, run_id: &str) -> Result<Option<PendingApproval>, AppError>;

    async fn delete(&self, run_id: &str) -> Result<(), AppError>;
}

fn decode(raw: String) -> Result<PendingApproval, AppError> {
    serde_json::from_str(&raw)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt stored approval: {}", e)))
}

// ── Redis backend ─────────────────────────────────────────────

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect and ping. A password supplied separately from the URL
    /// (managed cache services tend to hand them out that way) is
    /// injected into the connection info.
    pub async fn connect(url: &str, password: Option<&str>) -> anyhow::Result<Self> {
        let mut info = url.into_connection_info()?;
        if let Some(pw) = password {
            info.redis.password = Some(pw.to_string());
        }
        let client = redis::Client::open(info)?;
        let mut conn = ConnectionManager::new(client).await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl TokenStore for RedisStore {
    async fn put(
        &self,
        run_id: &str,
        approval: &PendingApproval,
        ttl: Duration,
    ) -> Result<(), AppError> {
        let json = serde_json::to_string(approval)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("serialize approval: {}", e)))?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(run_id, json, ttl.as_secs()).await?;
        Ok(())
    }

    async fn get(&self, run_id: &str) -> Result<Option<PendingApproval>, AppError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(run_id).await?;
        raw.map(decode).transpose()
    }

    async fn take(&self, run_id: &str) -> Result<Option<PendingApproval>, AppError> {
        // Atomic GET + DEL so only one caller ever sees the value.
        let script = redis::Script::new(
            r#"
            local v = redis.call("GET", KEYS[1])
            if v then
                redis.call("DEL", KEYS[1])
            end
            return v
        "#,
        );
        let mut conn = self.conn.clone();
        let raw: Option<String> = script.key(run_id).invoke_async(&mut conn).await?;
        raw.map(decode).transpose()
    }

    async fn delete(&self, run_id: &str) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(run_id).await?;
        Ok(())
    }
}

// ── In-process backend ────────────────────────────────────────

struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

/// DashMap-backed store for a single server instance. Expired entries
/// are evicted lazily on read, so callers observe the same
/// present/absent behavior as the Redis backend.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn put(
        &self,
        run_id: &str,
        approval: &PendingApproval,
        ttl: Duration,
    ) -> Result<(), AppError> {
        let json = serde_json::to_string(approval)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("serialize approval: {}", e)))?;
        self.entries.insert(
            run_id.to_string(),
            MemoryEntry {
                value: json,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn get(&self, run_id: &str) -> Result<Option<PendingApproval>, AppError> {
        if let Some(entry) = self.entries.get(run_id) {
            if Instant::now() < entry.expires_at {
                return decode(entry.value.clone()).map(Some);
            }
            // expired — drop the ref before removing
            drop(entry);
            self.entries.remove(run_id);
        }
        Ok(None)
    }

    async fn take(&self, run_id: &str) -> Result<Option<PendingApproval>, AppError> {
        // DashMap::remove is atomic per key; a racing second caller
        // gets None.
        if let Some((_, entry)) = self.entries.remove(run_id) {
            if Instant::now() < entry.expires_at {
                return decode(entry.value).map(Some);
            }
        }
        Ok(None)
    }

    async fn delete(&self, run_id: &str) -> Result<(), AppError> {
        self.entries.remove(run_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approval() -> PendingApproval {
        PendingApproval {
            access_token: "tok".into(),
            callback_url: "https://app.example.com/task-results/1".into(),
        }
    }

    #[tokio::test]
    async fn memory_put_get_roundtrip() {
        let store = MemoryStore::new();
        store
            .put("run-1", &approval(), Duration::from_secs(600))
            .await
            .unwrap();
        let got = store.get("run-1").await.unwrap().unwrap();
        assert_eq!(got.access_token, "tok");
    }

    #[tokio::test]
    async fn memory_take_consumes() {
        let store = MemoryStore::new();
        store
            .put("run-1", &approval(), Duration::from_secs(600))
            .await
            .unwrap();
        assert!(store.take("run-1").await.unwrap().is_some());
        assert!(store.take("run-1").await.unwrap().is_none());
        assert!(store.get("run-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_later_put_overwrites() {
        let store = MemoryStore::new();
        store
            .put("run-1", &approval(), Duration::from_secs(600))
            .await
            .unwrap();
        let second = PendingApproval {
            access_token: "tok2".into(),
            callback_url: "https://elsewhere.example.com".into(),
        };
        store
            .put("run-1", &second, Duration::from_secs(600))
            .await
            .unwrap();
        let got = store.take("run-1").await.unwrap().unwrap();
        assert_eq!(got.access_token, "tok2");
    }

    #[tokio::test]
    async fn memory_expired_entry_reads_as_absent() {
        let store = MemoryStore::new();
        store
            .put("run-1", &approval(), Duration::from_secs(0))
            .await
            .unwrap();
        assert!(store.get("run-1").await.unwrap().is_none());

        store
            .put("run-2", &approval(), Duration::from_secs(0))
            .await
            .unwrap();
        assert!(store.take("run-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_delete_is_idempotent() {
        let store = MemoryStore::new();
        store.delete("never-stored").await.unwrap();
        store
            .put("run-1", &approval(), Duration::from_secs(600))
            .await
            .unwrap();
        store.delete("run-1").await.unwrap();
        store.delete("run-1").await.unwrap();
        assert!(store.get("run-1").await.unwrap().is_none());
    }
}

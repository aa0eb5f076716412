//! Redis read-cache.
//!
//! Cache-aside over the latest-state queries: reads try the cache first and
//! fill it on miss; every successful write deletes the affected keys so the
//! next read rebuilds. Deletes are idempotent, so concurrent writers need no
//! coordination. A cache outage is non-fatal — callers fall through to the
//! database.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// TTL for the lightweight summary key (seconds).
pub const SUMMARY_TTL_SECS: u64 = 600;
/// TTL for trail keys (seconds). Trail data changes rarely.
pub const TRAILS_TTL_SECS: u64 = 3600;

/// Key builders. Every cache consumer goes through these so invalidation
/// and lookup can never drift apart.
pub mod keys {
    pub const RESORTS_ALL: &str = "resorts:all";
    pub const RESORTS_SUMMARY: &str = "resorts:summary";

    pub fn resort_id(id: i32) -> String {
        format!("resort:{id}")
    }

    pub fn resort_slug(slug: &str) -> String {
        format!("resort:{slug}")
    }

    pub fn trails_id(id: i32) -> String {
        format!("trails:{id}")
    }

    pub fn trails_slug(slug: &str) -> String {
        format!("trails:{slug}")
    }
}

/// Shared handle to the Redis cache.
#[derive(Clone)]
pub struct Cache {
    manager: ConnectionManager,
    default_ttl_secs: u64,
}

impl Cache {
    /// Connect to Redis. The connection manager reconnects on its own after
    /// transient failures.
    pub async fn connect(redis_url: &str, default_ttl_secs: u64) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self {
            manager,
            default_ttl_secs,
        })
    }

    /// Fetch and deserialize a cached value. Misses, decode failures and
    /// Redis errors all read as a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.manager.clone();
        let raw: Option<String> = match conn.get(key).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Cache read failed for {}: {}", key, e);
                return None;
            }
        };
        let raw = raw?;
        match serde_json::from_str(&raw) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Cache entry {} failed to decode, ignoring: {}", key, e);
                None
            }
        }
    }

    /// Serialize and store a value with the default TTL.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T) {
        self.set_json_ttl(key, value, self.default_ttl_secs).await;
    }

    /// Serialize and store a value with an explicit TTL.
    pub async fn set_json_ttl<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Failed to serialize cache value for {}: {}", key, e);
                return;
            }
        };
        let mut conn = self.manager.clone();
        if let Err(e) = conn.set_ex::<_, _, ()>(key, raw, ttl_secs).await {
            tracing::warn!("Cache write failed for {}: {}", key, e);
        }
    }

    /// Delete a set of keys. Missing keys are not an error.
    pub async fn delete(&self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        let mut conn = self.manager.clone();
        if let Err(e) = conn.del::<_, ()>(keys).await {
            tracing::warn!("Cache delete failed for {:?}: {}", keys, e);
        }
    }

    /// Drop every key a condition/weather write touches for one resort.
    pub async fn invalidate_resort(&self, id: i32, slug: &str) {
        self.delete(&[
            keys::resort_id(id),
            keys::resort_slug(slug),
            keys::RESORTS_ALL.to_string(),
            keys::RESORTS_SUMMARY.to_string(),
        ])
        .await;
    }

    /// Drop the trail keys for one resort.
    pub async fn invalidate_trails(&self, id: i32, slug: &str) {
        self.delete(&[keys::trails_id(id), keys::trails_slug(slug)]).await;
    }
}

#[cfg(test)]
mod tests {
    use super::keys;

    #[test]
    fn test_key_builders() {
        assert_eq!(keys::resort_id(7), "resort:7");
        assert_eq!(keys::resort_slug("powder-peak"), "resort:powder-peak");
        assert_eq!(keys::trails_id(7), "trails:7");
        assert_eq!(keys::trails_slug("powder-peak"), "trails:powder-peak");
        assert_eq!(keys::RESORTS_ALL, "resorts:all");
        assert_eq!(keys::RESORTS_SUMMARY, "resorts:summary");
    }
}

//! Redis cache client implementation.

use super::{CacheClient, Connect};
use crate::config::{ClientOptions, Lifetime};
use deadpool_redis::redis::cmd;
use deadpool_redis::{Config, Pool, PoolConfig, Runtime};
use serde_json::Value;

/// URL used when the connection descriptor is empty.
pub const DEFAULT_URL: &str = "redis://127.0.0.1:6379";

const DEFAULT_POOL_SIZE: usize = 16;

/// Errors reported by [`RedisClient`].
#[derive(Debug, thiserror::Error)]
pub enum RedisError {
    #[error("Failed to create Redis connection pool: {0}")]
    Pool(String),

    #[error("Failed to get Redis connection: {0}")]
    Connection(String),

    #[error("Redis {op} failed for key {key}: {message}")]
    Command {
        op: &'static str,
        key: String,
        message: String,
    },

    #[error("Failed to encode cache entry for key {key}: {source}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Redis client with an async connection pool.
///
/// Entries are stored as JSON strings with `SET .. EX`. Redis has no
/// failure notifications; connection problems surface on the failing call.
#[derive(Clone)]
pub struct RedisClient {
    pool: Pool,
}

impl RedisClient {
    async fn connection(&self) -> Result<deadpool_redis::Connection, RedisError> {
        self.pool
            .get()
            .await
            .map_err(|e| RedisError::Connection(e.to_string()))
    }
}

impl Connect for RedisClient {
    fn connect(connection: &str, options: &ClientOptions) -> Result<Self, Self::Error> {
        let url = if connection.is_empty() {
            DEFAULT_URL
        } else {
            connection
        };

        let pool_size = options
            .get_u64("pool_size")
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_POOL_SIZE);

        let mut config = Config::from_url(url);
        config.pool = Some(PoolConfig::new(pool_size));

        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| RedisError::Pool(e.to_string()))?;

        info!(
            "✓ Redis client initialized with {} (pool size: {})",
            url, pool_size
        );

        Ok(RedisClient { pool })
    }
}

impl CacheClient for RedisClient {
    type Error = RedisError;

    async fn get(&self, key: &str) -> Result<Option<Value>, Self::Error> {
        let mut conn = self.connection().await?;

        let data: Option<Vec<u8>> = cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| RedisError::Command {
                op: "GET",
                key: key.to_string(),
                message: e.to_string(),
            })?;

        match data {
            Some(bytes) => {
                debug!("✓ Redis GET {} -> HIT", key);
                serde_json::from_slice(&bytes)
                    .map(Some)
                    .map_err(|source| RedisError::Codec {
                        key: key.to_string(),
                        source,
                    })
            }
            None => {
                debug!("✓ Redis GET {} -> MISS", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &Value, lifetime: Lifetime) -> Result<(), Self::Error> {
        let bytes = serde_json::to_vec(value).map_err(|source| RedisError::Codec {
            key: key.to_string(),
            source,
        })?;

        let mut conn = self.connection().await?;

        let _: () = cmd("SET")
            .arg(key)
            .arg(bytes)
            .arg("EX")
            .arg(lifetime.as_secs())
            .query_async(&mut conn)
            .await
            .map_err(|e| RedisError::Command {
                op: "SET",
                key: key.to_string(),
                message: e.to_string(),
            })?;

        debug!("✓ Redis SET {} (TTL: {})", key, lifetime);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), Self::Error> {
        let mut conn = self.connection().await?;

        let _: () = cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| RedisError::Command {
                op: "DELETE",
                key: key.to_string(),
                message: e.to_string(),
            })?;

        debug!("✓ Redis DELETE {}", key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_with_default_url() {
        let client = RedisClient::connect("", &ClientOptions::default()).unwrap();
        assert!(client.failure_events().is_none());
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let result = RedisClient::connect("not a url", &ClientOptions::default());
        assert!(matches!(result, Err(RedisError::Pool(_))));
    }
}

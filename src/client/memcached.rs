//! Memcached cache client implementation.

use super::{CacheClient, Connect, FailureDetails, FAILURE_CHANNEL_CAPACITY};
use crate::config::{ClientOptions, Lifetime};
use async_memcached::AsciiProtocol;
use deadpool_memcached::{Manager, Pool};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;

/// Server used when the connection descriptor is empty.
pub const DEFAULT_SERVER: &str = "localhost:11211";

/// Default Memcached connection pool size.
/// Override with the `pool_size` client option or the MEMCACHED_POOL_SIZE
/// environment variable.
const DEFAULT_POOL_SIZE: usize = 16;

/// Longest expiration Memcached reads as relative (30 days). Larger values
/// are taken as absolute Unix timestamps.
const MAX_RELATIVE_EXPIRATION: u32 = 2_592_000;

/// Errors reported by [`MemcachedClient`].
#[derive(Debug, thiserror::Error)]
pub enum MemcachedError {
    #[error("Failed to create Memcached connection pool: {0}")]
    Pool(String),

    #[error("Failed to get Memcached connection: {0}")]
    Connection(String),

    #[error("Memcached {op} failed for key {key}: {message}")]
    Protocol {
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

/// Memcached client with an async connection pool.
///
/// Entries are stored as JSON. A connection checkout failure marks the
/// server as failing: it is returned to the caller and also published on
/// the client's failure channel.
///
/// # Example
///
/// ```no_run
/// # use cache_store::client::{CacheClient, Connect, MemcachedClient};
/// # use cache_store::config::{ClientOptions, Lifetime};
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let options = ClientOptions::default().with_option("pool_size", 4);
/// let client = MemcachedClient::connect("localhost:11211", &options)?;
///
/// client.set("user:1", &serde_json::json!({ "id": "1" }), Lifetime::default()).await?;
/// let value = client.get("user:1").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MemcachedClient {
    pool: Pool,
    server: String,
    failures: broadcast::Sender<FailureDetails>,
    failure_count: Arc<AtomicU64>,
}

impl MemcachedClient {
    /// Server this client talks to.
    pub fn server(&self) -> &str {
        &self.server
    }

    fn pool_size(options: &ClientOptions) -> usize {
        options
            .get_u64("pool_size")
            .and_then(|n| usize::try_from(n).ok())
            .or_else(|| {
                std::env::var("MEMCACHED_POOL_SIZE")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
            })
            .unwrap_or(DEFAULT_POOL_SIZE)
    }

    async fn connection(&self) -> Result<deadpool_memcached::Object, MemcachedError> {
        self.pool.get().await.map_err(|e| {
            let message = e.to_string();
            let total_failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
            let _ = self.failures.send(FailureDetails {
                server: self.server.clone(),
                messages: vec![message.clone()],
                total_failures,
            });
            MemcachedError::Connection(message)
        })
    }
}

impl Connect for MemcachedClient {
    fn connect(connection: &str, options: &ClientOptions) -> Result<Self, Self::Error> {
        // deadpool-memcached Manager takes a single server address
        let server = connection
            .split(',')
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SERVER)
            .to_string();

        let pool_size = Self::pool_size(options);
        let manager = Manager::new(server.clone());

        let pool = Pool::builder(manager)
            .max_size(pool_size)
            .build()
            .map_err(|e| MemcachedError::Pool(e.to_string()))?;

        info!(
            "✓ Memcached client initialized with server: {} (pool size: {})",
            server, pool_size
        );

        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        Ok(MemcachedClient {
            pool,
            server,
            failures,
            failure_count: Arc::new(AtomicU64::new(0)),
        })
    }
}

impl CacheClient for MemcachedClient {
    type Error = MemcachedError;

    async fn get(&self, key: &str) -> Result<Option<Value>, Self::Error> {
        let mut conn = self.connection().await?;

        let data = match conn.get(key).await {
            Ok(Some(value)) => value.data,
            Ok(None) => None,
            Err(e) => {
                return Err(MemcachedError::Protocol {
                    op: "GET",
                    key: key.to_string(),
                    message: e.to_string(),
                })
            }
        };

        match data {
            Some(bytes) => {
                debug!("✓ Memcached GET {} -> HIT", key);
                serde_json::from_slice(&bytes)
                    .map(Some)
                    .map_err(|source| MemcachedError::Codec {
                        key: key.to_string(),
                        source,
                    })
            }
            None => {
                debug!("✓ Memcached GET {} -> MISS", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &Value, lifetime: Lifetime) -> Result<(), Self::Error> {
        let bytes = serde_json::to_vec(value).map_err(|source| MemcachedError::Codec {
            key: key.to_string(),
            source,
        })?;

        let mut conn = self.connection().await?;

        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        let exptime = Some(expiration(lifetime, now));

        conn.set(key, bytes.as_slice(), exptime, None)
            .await
            .map_err(|e| MemcachedError::Protocol {
                op: "SET",
                key: key.to_string(),
                message: e.to_string(),
            })?;

        debug!("✓ Memcached SET {} (TTL: {})", key, lifetime);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), Self::Error> {
        let mut conn = self.connection().await?;

        conn.delete(key)
            .await
            .map_err(|e| MemcachedError::Protocol {
                op: "DELETE",
                key: key.to_string(),
                message: e.to_string(),
            })?;

        debug!("✓ Memcached DELETE {}", key);
        Ok(())
    }

    fn failure_events(&self) -> Option<broadcast::Receiver<FailureDetails>> {
        Some(self.failures.subscribe())
    }
}

/// Memcached expiration for `lifetime`, given the current Unix time.
fn expiration(lifetime: Lifetime, now: u64) -> i64 {
    let secs = lifetime.as_secs();
    if secs <= MAX_RELATIVE_EXPIRATION {
        i64::from(secs)
    } else {
        i64::try_from(now.saturating_add(u64::from(secs))).unwrap_or(i64::MAX)
    }
}

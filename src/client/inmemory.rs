//! In-memory cache client.

use super::{CacheClient, Connect, FailureDetails, FAILURE_CHANNEL_CAPACITY};
use crate::config::{ClientOptions, Lifetime};
use dashmap::DashMap;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::Instant;

#[derive(Clone, Debug)]
struct StoredEntry {
    value: Value,
    expires_at: Instant,
}

/// Process-local client backed by a concurrent map.
///
/// Clones share the same entries, so a test can keep one handle for
/// inspection while a store owns another. Entries expire lazily on read.
///
/// # Example
///
/// ```
/// # use cache_store::client::{CacheClient, InMemoryClient};
/// # use cache_store::config::Lifetime;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let client = InMemoryClient::new();
/// client.set("user:1", &serde_json::json!({ "id": "1" }), Lifetime::default()).await.unwrap();
/// assert!(client.get("user:1").await.unwrap().is_some());
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct InMemoryClient {
    entries: Arc<DashMap<String, StoredEntry>>,
    failures: Option<broadcast::Sender<FailureDetails>>,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Client with a failure channel, fed through [`report_failure`](Self::report_failure).
    pub fn with_failure_events() -> Self {
        let (tx, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);
        InMemoryClient {
            entries: Arc::default(),
            failures: Some(tx),
        }
    }

    /// Emit an out-of-band failure notification.
    ///
    /// Returns `false` if the client has no failure channel or nobody listens.
    pub fn report_failure(&self, details: FailureDetails) -> bool {
        match &self.failures {
            Some(tx) => tx.send(details).is_ok(),
            None => false,
        }
    }

    /// Number of stored entries, expired ones included until next read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remaining lifetime of an entry.
    pub fn ttl(&self, key: &str) -> Option<std::time::Duration> {
        self.entries
            .get(key)
            .map(|entry| entry.expires_at.saturating_duration_since(Instant::now()))
    }

    pub fn flush(&self) {
        self.entries.clear();
    }
}

impl CacheClient for InMemoryClient {
    type Error = Infallible;

    async fn get(&self, key: &str) -> Result<Option<Value>, Self::Error> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.expires_at > now => {
                debug!("✓ InMemory GET {} -> HIT", key);
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
            debug!("✓ InMemory GET {} -> EXPIRED", key);
        } else {
            debug!("✓ InMemory GET {} -> MISS", key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &Value, lifetime: Lifetime) -> Result<(), Self::Error> {
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                value: value.clone(),
                expires_at: Instant::now() + lifetime.as_duration(),
            },
        );
        debug!("✓ InMemory SET {} (TTL: {})", key, lifetime);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), Self::Error> {
        self.entries.remove(key);
        debug!("✓ InMemory DELETE {}", key);
        Ok(())
    }

    fn failure_events(&self) -> Option<broadcast::Receiver<FailureDetails>> {
        self.failures.as_ref().map(broadcast::Sender::subscribe)
    }
}

impl Connect for InMemoryClient {
    fn connect(connection: &str, _options: &ClientOptions) -> Result<Self, Self::Error> {
        if !connection.is_empty() {
            debug!("InMemory client ignores connection descriptor {}", connection);
        }
        Ok(InMemoryClient::new())
    }
}

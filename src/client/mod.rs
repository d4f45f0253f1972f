//! Cache client capability and implementations.
//!
//! A store talks to its cache service only through [`CacheClient`]: one
//! asynchronous get, set or delete per store operation. Connection handling,
//! retries and clustering are entirely the client's business.

use crate::config::{ClientOptions, Lifetime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use tokio::sync::broadcast;

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "memcached")]
pub mod memcached;

#[cfg(feature = "redis")]
pub mod redis;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryClient;

#[cfg(feature = "memcached")]
pub use memcached::{MemcachedClient, MemcachedError};

#[cfg(feature = "redis")]
pub use self::redis::{RedisClient, RedisError};

/// Capacity of failure notification channels.
pub const FAILURE_CHANNEL_CAPACITY: usize = 64;

/// Details of an out-of-band client failure.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureDetails {
    /// Server the failure relates to.
    pub server: String,
    pub messages: Vec<String>,
    /// Failures reported for this server since the client started.
    pub total_failures: u64,
}

impl fmt::Display for FailureDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => write!(f, "{:?}", self),
        }
    }
}

/// Networked key-value operations used by the store.
///
/// Implementations must be safe to share between tasks; the store holds a
/// single handle and issues concurrent calls on it without locking.
pub trait CacheClient: Send + Sync + 'static {
    /// Error reported by the client. Stores pass it to callers unmodified.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the value stored under `key`, `None` on a miss.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send;

    /// Store `value` under `key` for `lifetime`.
    fn set(
        &self,
        key: &str,
        value: &Value,
        lifetime: Lifetime,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Remove `key`.
    fn del(&self, key: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Subscribe to out-of-band failure notifications, if the client has any.
    fn failure_events(&self) -> Option<broadcast::Receiver<FailureDetails>> {
        None
    }
}

/// Clients that can be built from a connection descriptor and options.
pub trait Connect: CacheClient + Sized {
    /// # Errors
    ///
    /// Returns the client's error if the descriptor or options are unusable.
    fn connect(connection: &str, options: &ClientOptions) -> Result<Self, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_details_display_is_json() {
        let details = FailureDetails {
            server: "localhost:11211".to_string(),
            messages: vec!["connect ECONNREFUSED".to_string()],
            total_failures: 3,
        };

        let shown = details.to_string();
        let parsed: FailureDetails = serde_json::from_str(&shown).unwrap();
        assert_eq!(parsed, details);
        assert!(shown.contains("localhost:11211"));
    }
}

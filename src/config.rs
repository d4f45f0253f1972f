//! Store configuration.
//!
//! A store is configured with a connection descriptor handed to the cache
//! client, client options (the entry lifetime plus anything the client
//! understands) and the policy for out-of-band client failures.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

/// Lifetime applied when none is configured, in seconds.
pub const DEFAULT_LIFETIME_SECS: u32 = 6000;

/// Time-to-live applied to every write, in whole seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lifetime(NonZeroU32);

impl Lifetime {
    /// Returns `None` for zero.
    pub fn from_secs(secs: u32) -> Option<Self> {
        NonZeroU32::new(secs).map(Lifetime)
    }

    /// Resolve a configured value: zero or nothing selects the default.
    pub fn resolve(secs: Option<u32>) -> Self {
        secs.and_then(Self::from_secs).unwrap_or_default()
    }

    pub fn as_secs(&self) -> u32 {
        self.0.get()
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.0.get()))
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Lifetime(NonZeroU32::new(DEFAULT_LIFETIME_SECS).unwrap_or(NonZeroU32::MIN))
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.0)
    }
}

/// Options handed to the cache client.
///
/// `lifetime` is read by the store; every other key is passed through to the
/// client untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifetime: Option<u32>,
    #[serde(flatten)]
    pub passthrough: Map<String, Value>,
}

impl ClientOptions {
    pub fn with_lifetime(mut self, secs: u32) -> Self {
        self.lifetime = Some(secs);
        self
    }

    /// Add a client specific option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.passthrough.insert(key.into(), value.into());
        self
    }

    /// Effective lifetime (default when unset or zero).
    pub fn lifetime(&self) -> Lifetime {
        Lifetime::resolve(self.lifetime)
    }

    /// Look up a passthrough option.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.passthrough.get(key)
    }

    /// Passthrough option as an unsigned integer, if present and numeric.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }
}

/// What to do when the cache client reports an out-of-band failure
/// (a node going down, the cluster degrading).
///
/// Such failures are never delivered to in-flight operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log and republish on the store's failure channel.
    #[default]
    Escalate,
    /// Log and abort the process.
    Terminate,
}

impl FromStr for FailurePolicy {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_lowercase().as_str() {
            "escalate" => Ok(FailurePolicy::Escalate),
            "terminate" => Ok(FailurePolicy::Terminate),
            _ => Err(Error::Config(format!("unknown failure policy: {}", value))),
        }
    }
}

// Same spelling rules as `FromStr`, so JSON and env configs agree.
impl<'de> Deserialize<'de> for FailurePolicy {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Escalate => write!(f, "escalate"),
            FailurePolicy::Terminate => write!(f, "terminate"),
        }
    }
}

/// Complete store configuration.
///
/// # Example
///
/// ```
/// use cache_store::config::StoreConfig;
///
/// let config = StoreConfig::from_json(
///     r#"{ "connection": "10.0.0.1:11211", "options": { "lifetime": 60, "pool_size": 4 } }"#,
/// ).unwrap();
///
/// assert_eq!(config.options.lifetime().as_secs(), 60);
/// assert_eq!(config.options.get_u64("pool_size"), Some(4));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Connection descriptor, interpreted by the client.
    #[serde(default)]
    pub connection: String,
    #[serde(default)]
    pub options: ClientOptions,
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

impl StoreConfig {
    pub fn new(connection: impl Into<String>) -> Self {
        StoreConfig {
            connection: connection.into(),
            ..Default::default()
        }
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    /// Parse a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the document does not match the expected shape.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("failed to parse store configuration: {}", e)))
    }

    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_STORE_CONNECTION` - connection descriptor (default: empty, client default)
    /// - `CACHE_STORE_LIFETIME` - entry lifetime in seconds (default: 6000)
    /// - `CACHE_STORE_ON_FAILURE` - `escalate` or `terminate` (default: escalate)
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let connection = std::env::var("CACHE_STORE_CONNECTION").unwrap_or_default();

        let lifetime = match std::env::var("CACHE_STORE_LIFETIME") {
            Ok(raw) => Some(raw.trim().parse::<u32>().map_err(|e| {
                Error::Config(format!("invalid CACHE_STORE_LIFETIME {:?}: {}", raw, e))
            })?),
            Err(_) => None,
        };

        let on_failure = match std::env::var("CACHE_STORE_ON_FAILURE") {
            Ok(raw) => raw.parse()?,
            Err(_) => FailurePolicy::default(),
        };

        Ok(StoreConfig {
            connection,
            options: ClientOptions {
                lifetime,
                passthrough: Map::new(),
            },
            on_failure,
        })
    }
}

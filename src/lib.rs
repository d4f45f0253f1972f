//! # cache-store
//!
//! A model storage adapter backed by a networked key-value cache.
//!
//! ## Features
//!
//! - **Primary-key CRUD:** read, create and delete records by primary key
//! - **Deterministic keys:** every record lives under `"{model}:{primary key}"`
//! - **Client Agnostic:** in-memory, Memcached and Redis clients, or your own
//!   [`CacheClient`]
//! - **Explicit limits:** update and filter are part of the contract and
//!   always rejected
//! - **Transparent errors:** client failures reach the caller unmodified
//!
//! ## Quick Start
//!
//! ```ignore
//! use cache_store::{
//!     client::MemcachedClient, config::StoreConfig, model::Schema, CacheStore, StoreService,
//! };
//! use serde_json::json;
//!
//! // 1. Connect (lifetime defaults to 6000 seconds)
//! let config = StoreConfig::from_json(
//!     r#"{ "connection": "localhost:11211", "options": { "lifetime": 300 } }"#,
//! )?;
//! let store = CacheStore::<MemcachedClient>::connect(config)?;
//!
//! // 2. Define models
//! let service = StoreService::new(store);
//! service.define("user", Schema::with_primary_key("id"));
//!
//! // 3. Use it
//! service.create("user", json!({ "id": "1", "name": "Ada" })).await?;
//! let user = service.get("user", "1").await?;
//! ```

#[macro_use]
extern crate log;

pub mod client;
pub mod config;
pub mod error;
pub mod key;
pub mod model;
pub mod service;
pub mod store;

// Re-exports for convenience
pub use client::{CacheClient, Connect, FailureDetails};
pub use config::{ClientOptions, FailurePolicy, Lifetime, StoreConfig};
pub use error::{Error, ErrorKind, Result};
pub use key::CacheKeyBuilder;
pub use model::{Model, Schema};
pub use service::StoreService;
pub use store::{CacheStore, Created, ModelStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

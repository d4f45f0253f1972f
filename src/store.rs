//! Cache-backed model store.
//!
//! [`CacheStore`] maps primary-key CRUD onto a [`CacheClient`]:
//!
//! | operation | client call            | result                         |
//! |-----------|------------------------|--------------------------------|
//! | read      | `get(key)`             | stored entry, or `NotFound`    |
//! | create    | `set(key, obj, ttl)`   | [`Created`]                    |
//! | delete    | `del(key)`             | the key                        |
//! | update    | none                   | always `Unsupported`           |
//! | filter    | none                   | always `Unsupported`           |
//!
//! where `key` is `"{model}:{primary key}"`. Each supported operation makes
//! exactly one client call and never retries.

use crate::client::{CacheClient, Connect, FailureDetails, FAILURE_CHANNEL_CAPACITY};
use crate::config::{ClientOptions, FailurePolicy, Lifetime, StoreConfig};
use crate::error::{self, Error, Result, UnsupportedOperation};
use crate::key::CacheKeyBuilder;
use crate::model::Model;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Outcome of a successful create.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Created {
    pub key: String,
    pub obj: Value,
    pub lifetime: Lifetime,
}

/// Model storage contract.
///
/// Implemented by [`CacheStore`]; [`crate::StoreService`] works against any
/// implementation.
pub trait ModelStore: Send + Sync + 'static {
    /// Fetch the record with primary key `pk`.
    fn read(&self, model: &Model, pk: &str) -> impl Future<Output = Result<Value>> + Send;

    /// Store a new record.
    fn create(&self, model: &Model, obj: Value) -> impl Future<Output = Result<Created>> + Send;

    /// Replace fields of an existing record.
    fn update(&self, model: &Model, obj: Value) -> impl Future<Output = Result<Created>> + Send;

    /// Find records matching a query.
    fn filter(&self, model: &Model, query: &Value)
        -> impl Future<Output = Result<Vec<Value>>> + Send;

    /// Remove the record identified by the query's primary key.
    fn delete(&self, model: &Model, query: &Value) -> impl Future<Output = Result<String>> + Send;
}

/// Model store backed by a cache client.
///
/// Holds one client handle for its whole life and a lifetime fixed at
/// construction. No state is kept between calls.
///
/// # Example
///
/// ```
/// use cache_store::client::InMemoryClient;
/// use cache_store::model::{Model, Schema};
/// use cache_store::{CacheStore, ModelStore};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> cache_store::Result<()> {
/// let store = CacheStore::from_client(InMemoryClient::new(), Default::default())?;
/// let model = Model::new("user", Schema::with_primary_key("id"));
///
/// let created = store.create(&model, json!({ "id": "1", "name": "Ada" })).await?;
/// assert_eq!(created.key, "user:1");
///
/// let user = store.read(&model, "1").await?;
/// assert_eq!(user["name"], "Ada");
/// # Ok(())
/// # }
/// ```
pub struct CacheStore<C: CacheClient> {
    client: C,
    lifetime: Lifetime,
    failures: broadcast::Sender<FailureDetails>,
    watcher: Option<JoinHandle<()>>,
}

impl<C: CacheClient> CacheStore<C> {
    /// Build a store from a client factory.
    ///
    /// The factory is called once with the configured connection and the
    /// client options, whose lifetime is resolved (default 6000 seconds)
    /// before the call.
    ///
    /// # Errors
    ///
    /// - `Error::Transport`: the factory failed
    /// - `Error::Config`: the client has a failure channel but no Tokio
    ///   runtime is available to watch it
    pub fn new<F, E>(factory: F, config: StoreConfig) -> Result<Self>
    where
        F: FnOnce(&str, &ClientOptions) -> std::result::Result<C, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let StoreConfig {
            connection,
            mut options,
            on_failure,
        } = config;

        let lifetime = options.lifetime();
        options.lifetime = Some(lifetime.as_secs());

        let client = factory(&connection, &options).map_err(Error::transport)?;
        debug!(
            "Cache store client created for {:?} (lifetime: {})",
            connection, lifetime
        );

        Self::assemble(client, lifetime, on_failure)
    }

    /// Build a store whose client connects itself.
    ///
    /// # Errors
    ///
    /// Same as [`CacheStore::new`].
    pub fn connect(config: StoreConfig) -> Result<Self>
    where
        C: Connect,
    {
        Self::new(C::connect, config)
    }

    /// Wrap an existing client handle with the default failure policy.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the client has a failure channel and no
    /// Tokio runtime is running.
    pub fn from_client(client: C, lifetime: Lifetime) -> Result<Self> {
        Self::assemble(client, lifetime, FailurePolicy::default())
    }

    fn assemble(client: C, lifetime: Lifetime, policy: FailurePolicy) -> Result<Self> {
        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);

        let watcher = match client.failure_events() {
            Some(events) => {
                let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
                    Error::Config(
                        "watching client failures requires a running Tokio runtime".to_string(),
                    )
                })?;
                debug!("Watching cache client failures (policy: {})", policy);
                Some(runtime.spawn(watch_failures(events, failures.clone(), policy)))
            }
            None => None,
        };

        Ok(CacheStore {
            client,
            lifetime,
            failures,
            watcher,
        })
    }

    /// Lifetime applied to every write.
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// Get client reference (for advanced use).
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Receive the client's out-of-band failures escalated by this store.
    pub fn subscribe_failures(&self) -> broadcast::Receiver<FailureDetails> {
        self.failures.subscribe()
    }
}

impl<C: CacheClient> Drop for CacheStore<C> {
    fn drop(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

impl<C: CacheClient> ModelStore for CacheStore<C> {
    async fn read(&self, model: &Model, pk: &str) -> Result<Value> {
        let key = CacheKeyBuilder::pk_key(model, pk);
        debug!("» Cache read for key: {}", key);

        let outcome = self.client.get(&key).await;
        error::map_read(&key, outcome)
    }

    async fn create(&self, model: &Model, obj: Value) -> Result<Created> {
        let pk = model
            .primary_key_of(&obj)
            .ok_or_else(|| Error::Validation("primary key is required".to_string()))?;

        let key = CacheKeyBuilder::pk_key(model, pk);
        debug!("» Cache create for key: {}", key);

        let outcome = self.client.set(&key, &obj, self.lifetime).await;
        error::map_write(outcome)?;

        Ok(Created {
            key,
            obj,
            lifetime: self.lifetime,
        })
    }

    async fn update(&self, _model: &Model, _obj: Value) -> Result<Created> {
        Err(Error::Unsupported(UnsupportedOperation::Update))
    }

    async fn filter(&self, _model: &Model, _query: &Value) -> Result<Vec<Value>> {
        Err(Error::Unsupported(UnsupportedOperation::Filter))
    }

    async fn delete(&self, model: &Model, query: &Value) -> Result<String> {
        let pk = model
            .primary_key_of(query)
            .ok_or_else(|| Error::Validation("primaryKey was not set in query".to_string()))?;

        let key = CacheKeyBuilder::pk_key(model, pk);
        debug!("» Cache delete for key: {}", key);

        let outcome = self.client.del(&key).await;
        error::map_write(outcome)?;

        Ok(key)
    }
}

/// Apply `policy` to every failure the client reports until its channel closes.
async fn watch_failures(
    mut events: broadcast::Receiver<FailureDetails>,
    escalate: broadcast::Sender<FailureDetails>,
    policy: FailurePolicy,
) {
    loop {
        match events.recv().await {
            Ok(details) => {
                error!("✗ Cache client failure: {}", details);
                match policy {
                    FailurePolicy::Escalate => {
                        let _ = escalate.send(details);
                    }
                    FailurePolicy::Terminate => {
                        error!("✗ Aborting process on cache client failure");
                        std::process::abort();
                    }
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                warn!("⚠ Missed {} cache client failure notifications", skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::InMemoryClient;
    use crate::error::ErrorKind;
    use crate::model::Schema;
    use serde_json::json;
    use std::time::Duration;

    fn test_model() -> Model {
        Model::new("test_model", Schema::with_primary_key("id"))
    }

    #[tokio::test]
    async fn test_create_then_read() {
        let store = CacheStore::from_client(InMemoryClient::new(), Lifetime::default()).unwrap();
        let model = test_model();
        let obj = json!({ "id": "1", "foo": "bar" });

        let created = store.create(&model, obj.clone()).await.unwrap();
        assert_eq!(created.key, "test_model:1");
        assert_eq!(created.obj, obj);
        assert_eq!(created.lifetime.as_secs(), 6000);

        assert_eq!(store.read(&model, "1").await.unwrap(), obj);
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let store = CacheStore::from_client(InMemoryClient::new(), Lifetime::default()).unwrap();
        let err = store.read(&test_model(), "1").await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            err.to_string(),
            "Could not find cached item with key test_model:1"
        );
    }

    #[tokio::test]
    async fn test_create_uses_configured_lifetime() {
        let client = InMemoryClient::new();
        let config = StoreConfig::default().with_options(ClientOptions::default().with_lifetime(1));
        let store = CacheStore::new(
            |_: &str, _: &ClientOptions| Ok::<_, std::convert::Infallible>(client.clone()),
            config,
        )
        .unwrap();

        let created = store
            .create(&test_model(), json!({ "id": "1" }))
            .await
            .unwrap();

        assert_eq!(created.lifetime.as_secs(), 1);
        assert!(client.ttl("test_model:1").unwrap() <= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_create_without_primary_key() {
        let client = InMemoryClient::new();
        let store = CacheStore::from_client(client.clone(), Lifetime::default()).unwrap();

        let err = store
            .create(&test_model(), json!({ "foo": "1" }))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.to_string(), "primary key is required");
        assert!(client.is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let client = InMemoryClient::new();
        let store = CacheStore::from_client(client.clone(), Lifetime::default()).unwrap();
        let model = test_model();

        store.create(&model, json!({ "id": "1" })).await.unwrap();
        let key = store.delete(&model, &json!({ "id": "1" })).await.unwrap();

        assert_eq!(key, "test_model:1");
        assert!(client.is_empty());
        assert!(store.read(&model, "1").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_without_primary_key() {
        let store = CacheStore::from_client(InMemoryClient::new(), Lifetime::default()).unwrap();
        let err = store
            .delete(&test_model(), &json!({ "foo": "1" }))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "primaryKey was not set in query");
    }

    #[tokio::test]
    async fn test_update_and_filter_unsupported() {
        let client = InMemoryClient::new();
        let store = CacheStore::from_client(client.clone(), Lifetime::default()).unwrap();
        let model = test_model();

        let err = store.update(&model, json!({ "id": "1" })).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
        assert_eq!(err.to_string(), "Store.prototype.update() is not supported");

        let err = store.filter(&model, &json!({ "id": "1" })).await.unwrap_err();
        assert_eq!(err.to_string(), "Store.prototype.filter() is not supported");

        assert!(client.is_empty());
    }

    #[tokio::test]
    async fn test_custom_primary_key_field() {
        let store = CacheStore::from_client(InMemoryClient::new(), Lifetime::default()).unwrap();
        let model = Model::new("account", Schema::with_primary_key("email"));

        let created = store
            .create(&model, json!({ "email": "a@b.c", "id": "ignored" }))
            .await
            .unwrap();
        assert_eq!(created.key, "account:a@b.c");
    }

    #[tokio::test]
    async fn test_failures_escalated_to_subscribers() {
        let client = InMemoryClient::with_failure_events();
        let store = CacheStore::from_client(client.clone(), Lifetime::default()).unwrap();
        let mut failures = store.subscribe_failures();

        let details = node_down();
        assert!(client.report_failure(details.clone()));

        let received = tokio::time::timeout(Duration::from_secs(1), failures.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, details);

        // operations are unaffected by the notification
        store.create(&test_model(), json!({ "id": "1" })).await.unwrap();
    }

    fn node_down() -> FailureDetails {
        FailureDetails {
            server: "10.0.0.1:11211".to_string(),
            messages: vec!["connection refused".to_string()],
            total_failures: 1,
        }
    }

    #[tokio::test]
    async fn test_configured_policy_reaches_watcher() {
        let client = InMemoryClient::with_failure_events();
        let factory_client = client.clone();
        let store = CacheStore::new(
            move |_: &str, _: &ClientOptions| Ok::<_, std::convert::Infallible>(factory_client),
            StoreConfig::default().with_failure_policy(FailurePolicy::Escalate),
        )
        .unwrap();
        let mut failures = store.subscribe_failures();

        assert!(client.report_failure(node_down()));

        let received = tokio::time::timeout(Duration::from_secs(1), failures.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, node_down());
    }

    #[tokio::test]
    async fn test_drop_stops_watching_failures() {
        let client = InMemoryClient::with_failure_events();
        let store = CacheStore::from_client(client.clone(), Lifetime::default()).unwrap();

        // the watcher is the only subscriber
        assert!(client.report_failure(node_down()));

        drop(store);

        // the aborted watcher releases its receiver once the runtime gets to it
        tokio::time::timeout(Duration::from_secs(1), async {
            while client.report_failure(node_down()) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("watcher still subscribed after the store was dropped");
    }

    #[test]
    fn test_failure_channel_requires_runtime() {
        let client = InMemoryClient::with_failure_events();
        let result = CacheStore::new(
            move |_: &str, _: &ClientOptions| Ok::<_, std::convert::Infallible>(client),
            StoreConfig::default(),
        );

        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_plain_client_needs_no_runtime() {
        let store = CacheStore::from_client(InMemoryClient::new(), Lifetime::default()).unwrap();
        assert_eq!(store.lifetime(), Lifetime::default());
    }
}

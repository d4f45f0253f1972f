//! Name-based store facade with a model registry.

use crate::error::{Error, Result};
use crate::model::{Model, Schema};
use crate::store::{Created, ModelStore};
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

/// Registry of defined models, keyed by name.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: DashMap<String, Arc<Model>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define (or redefine) a model.
    pub fn define(&self, name: impl Into<String>, schema: Schema) -> Arc<Model> {
        let name = name.into();
        let model = Arc::new(Model::new(name.clone(), schema));
        if self.models.insert(name.clone(), model.clone()).is_some() {
            debug!("Model {} redefined", name);
        }
        model
    }

    /// # Errors
    ///
    /// Returns `Error::UndefinedModel` if no model has this name.
    pub fn get(&self, name: &str) -> Result<Arc<Model>> {
        self.models
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| Error::UndefinedModel(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

struct Inner<S> {
    store: S,
    registry: ModelRegistry,
}

/// Thread-safe facade addressing models by name.
///
/// `Clone` is cheap (an `Arc` increment); every clone shares the store and
/// the model registry.
///
/// # Example
///
/// ```
/// use cache_store::client::InMemoryClient;
/// use cache_store::model::Schema;
/// use cache_store::{CacheStore, StoreService};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> cache_store::Result<()> {
/// let store = CacheStore::from_client(InMemoryClient::new(), Default::default())?;
/// let service = StoreService::new(store);
///
/// service.define("user", Schema::from_definition(&json!({
///     "id":   { "type": "String", "primaryKey": true },
///     "name": { "type": "String" }
/// }))?);
///
/// service.create("user", json!({ "id": "1", "name": "Ada" })).await?;
/// let user = service.get("user", "1").await?;
/// assert_eq!(user["name"], "Ada");
/// # Ok(())
/// # }
/// ```
pub struct StoreService<S: ModelStore> {
    inner: Arc<Inner<S>>,
}

impl<S: ModelStore> Clone for StoreService<S> {
    fn clone(&self) -> Self {
        StoreService {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: ModelStore> StoreService<S> {
    pub fn new(store: S) -> Self {
        StoreService {
            inner: Arc::new(Inner {
                store,
                registry: ModelRegistry::new(),
            }),
        }
    }

    /// Define a model; an existing model with the same name is replaced.
    pub fn define(&self, name: impl Into<String>, schema: Schema) -> Arc<Model> {
        self.inner.registry.define(name, schema)
    }

    /// Look up a defined model.
    ///
    /// # Errors
    ///
    /// Returns `Error::UndefinedModel` for unknown names.
    pub fn model(&self, name: &str) -> Result<Arc<Model>> {
        self.inner.registry.get(name)
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.inner.registry
    }

    /// Get store reference (for advanced use).
    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub async fn get(&self, model: &str, pk: &str) -> Result<Value> {
        let model = self.model(model)?;
        self.inner.store.read(&model, pk).await
    }

    pub async fn create(&self, model: &str, obj: Value) -> Result<Created> {
        let model = self.model(model)?;
        self.inner.store.create(&model, obj).await
    }

    pub async fn update(&self, model: &str, obj: Value) -> Result<Created> {
        let model = self.model(model)?;
        self.inner.store.update(&model, obj).await
    }

    pub async fn filter(&self, model: &str, query: &Value) -> Result<Vec<Value>> {
        let model = self.model(model)?;
        self.inner.store.filter(&model, query).await
    }

    pub async fn delete(&self, model: &str, query: &Value) -> Result<String> {
        let model = self.model(model)?;
        self.inner.store.delete(&model, query).await
    }
}

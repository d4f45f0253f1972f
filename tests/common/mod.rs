//! Scripted cache client shared by the integration tests.

#![allow(dead_code)]

use cache_store::client::CacheClient;
use cache_store::config::Lifetime;
use serde_json::Value;
use std::io;
use std::sync::{Arc, Mutex};

/// A call received by [`StubClient`].
#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Get(String),
    Set(String, Value, u32),
    Del(String),
}

/// Scripted reply for one kind of call.
#[derive(Clone, Debug)]
pub enum Reply {
    /// Succeed; for `get`, return the given data.
    Data(Option<Value>),
    /// Fail with an I/O error carrying this message.
    Fail(&'static str),
}

impl Default for Reply {
    fn default() -> Self {
        Reply::Data(None)
    }
}

/// Client that records every call and answers with scripted replies.
#[derive(Clone, Default)]
pub struct StubClient {
    calls: Arc<Mutex<Vec<Call>>>,
    pub get: Reply,
    pub set: Reply,
    pub del: Reply,
}

impl StubClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_get(mut self, reply: Reply) -> Self {
        self.get = reply;
        self
    }

    pub fn on_set(mut self, reply: Reply) -> Self {
        self.set = reply;
        self
    }

    pub fn on_del(mut self, reply: Reply) -> Self {
        self.del = reply;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl CacheClient for StubClient {
    type Error = io::Error;

    async fn get(&self, key: &str) -> Result<Option<Value>, Self::Error> {
        self.record(Call::Get(key.to_string()));
        match &self.get {
            Reply::Data(data) => Ok(data.clone()),
            Reply::Fail(message) => Err(io::Error::other(*message)),
        }
    }

    async fn set(&self, key: &str, value: &Value, lifetime: Lifetime) -> Result<(), Self::Error> {
        self.record(Call::Set(key.to_string(), value.clone(), lifetime.as_secs()));
        match &self.set {
            Reply::Data(_) => Ok(()),
            Reply::Fail(message) => Err(io::Error::other(*message)),
        }
    }

    async fn del(&self, key: &str) -> Result<(), Self::Error> {
        self.record(Call::Del(key.to_string()));
        match &self.del {
            Reply::Data(_) => Ok(()),
            Reply::Fail(message) => Err(io::Error::other(*message)),
        }
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

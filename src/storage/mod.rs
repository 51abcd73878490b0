//! Key-value storage shared by the agent, the page context and the control surface.
//!
//! Values are JSON. The agent's cache and settings live under the keys in [`keys`].

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub mod keys {
    pub const API_URL: &str = "apiUrl";
    pub const REFRESH_INTERVAL: &str = "refreshInterval";
    pub const AUTO_FETCH: &str = "autoFetch";
    pub const IS_CONNECTED: &str = "isConnected";
    pub const LAST_SIGNAL: &str = "lastSignal";
    pub const LAST_FETCH: &str = "lastFetch";
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("stored value could not be (de)serialized: {0}")]
    Serde(#[from] serde_json::Error),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Write several keys at once
    async fn set_many(&self, entries: Vec<(&'static str, Value)>) -> Result<(), StorageError>;

    async fn set(&self, key: &'static str, value: Value) -> Result<(), StorageError> {
        self.set_many(vec![(key, value)]).await
    }
}

/// Read and deserialize a key; a value of the wrong shape reads as absent
pub async fn load<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    Ok(store
        .get(key)
        .await?
        .and_then(|v| serde_json::from_value(v).ok()))
}

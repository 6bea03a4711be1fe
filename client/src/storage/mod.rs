//! Persistent key-value storage.
//!
//! Everything the client persists goes through [`KeyValueStore`]: string keys,
//! JSON string values, each call atomic per key.

mod json;
mod memory;
mod sqlite;

pub use json::*;
pub use memory::*;
pub use sqlite::*;

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Fixed keys used by the client.
pub mod keys {
    /// Cached job list
    pub const JOBS_CACHE: &str = "pitstop.jobs_cache";
    /// Cached parts inventory
    pub const INVENTORY_CACHE: &str = "pitstop.inventory_cache";
    /// Offline request queue
    pub const QUEUED_REQUESTS: &str = "pitstop.queued_requests";
    /// Last stored queue that could not be decoded
    pub const UNREADABLE_QUEUE: &str = "pitstop.queued_requests.unreadable";
}

/// Asynchronous string key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key).await
    }
}

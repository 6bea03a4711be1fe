//! Typed JSON values on top of a [`KeyValueStore`].

use super::KeyValueStore;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Reads and writes serde values under string keys.
#[derive(Debug, Clone)]
pub struct JsonStorage<S> {
    store: S,
}

impl<S: KeyValueStore> JsonStorage<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The wrapped store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load a value, falling back to `T::default()` when it is absent,
    /// unreadable or fails to decode. Failures are logged, never returned.
    pub async fn load<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.load_opt(key).await {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "stored value unusable, using default");
                T::default()
            }
        }
    }

    /// Load a value, reporting read and decode failures.
    pub async fn load_opt<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Serialize and store a value.
    pub async fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, &raw).await
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        self.store.remove(key).await
    }
}

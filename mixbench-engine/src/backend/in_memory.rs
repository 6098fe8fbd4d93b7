//! In-memory backend for dry runs and tests.
//!
//! This provides a [`Backend`] backed by a `HashMap`. The backend is [`Clone`] so tests can hold a
//! handle for direct inspection while the executor owns a shared copy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use tokio::io::AsyncReadExt;

use super::common::{Backend, BackendError, BackendResult, ObjectMeta, PutResponse};
use crate::payload::Payload;

type Store = HashMap<String, Bytes>;

/// A [`Backend`] keeping all objects in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    store: Arc<Mutex<Store>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn store(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` if the backend contains an object with the given key.
    pub fn contains(&self, key: &str) -> bool {
        self.store().contains_key(key)
    }

    /// Returns the number of stored objects.
    pub fn len(&self) -> usize {
        self.store().len()
    }

    /// Returns `true` if the backend has no stored objects.
    pub fn is_empty(&self) -> bool {
        self.store().is_empty()
    }

    /// Returns the keys of all stored objects, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.store().keys().cloned().collect();
        keys.sort_unstable();
        keys
    }
}

#[async_trait::async_trait]
impl Backend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn put_object(&self, key: &str, mut payload: Payload) -> BackendResult<PutResponse> {
        let mut contents = Vec::with_capacity(payload.len as usize);
        payload.read_to_end(&mut contents).await?;

        let size = contents.len() as u64;
        self.store().insert(key.to_owned(), contents.into());

        Ok(PutResponse { size, etag: None })
    }

    async fn get_object(&self, key: &str) -> BackendResult<Bytes> {
        self.store()
            .get(key)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(key.to_owned()))
    }

    async fn stat_object(&self, key: &str) -> BackendResult<ObjectMeta> {
        let size = self
            .store()
            .get(key)
            .map(|contents| contents.len() as u64)
            .ok_or_else(|| BackendError::NotFound(key.to_owned()))?;

        Ok(ObjectMeta { size, etag: None })
    }

    async fn delete_object(&self, key: &str) -> BackendResult<()> {
        match self.store().remove(key) {
            Some(_) => Ok(()),
            None => Err(BackendError::NotFound(key.to_owned())),
        }
    }
}

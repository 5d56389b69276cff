//! In-process object store
//!
//! Used by tests and dry runs. Keeps every object body and the fingerprint it
//! was written with, and can be told to fail writes.

use super::ObjectStore;
use crate::error::StorageError;
use crate::file::FileState;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub state: FileState,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    containers: Mutex<HashMap<String, BTreeMap<String, StoredObject>>>,
    writes: AtomicUsize,
    failing_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, BTreeMap<String, StoredObject>>> {
        self.containers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `count` writes fail
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn containers(&self) -> Vec<String> {
        let mut names: Vec<_> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn object(&self, container: &str, object: &str) -> Option<StoredObject> {
        self.lock().get(container)?.get(object).cloned()
    }

    /// Object names in `container`, sorted
    pub fn objects(&self, container: &str) -> Vec<String> {
        self.lock()
            .get(container)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn ensure_container(&self, container: &str) -> Result<(), StorageError> {
        self.lock().entry(container.to_string()).or_default();
        Ok(())
    }

    async fn object_state(&self, container: &str, object: &str) -> Result<Option<FileState>, StorageError> {
        Ok(self.object(container, object).map(|stored| stored.state))
    }

    async fn put_object(
        &self,
        container: &str,
        object: &str,
        body: Vec<u8>,
        state: &FileState,
    ) -> Result<(), StorageError> {
        let fail = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(StorageError::WriteObject {
                container: container.to_string(),
                object: object.to_string(),
                message: "injected failure".to_string(),
            });
        }

        let mut containers = self.lock();
        let objects = containers
            .get_mut(container)
            .ok_or_else(|| StorageError::WriteObject {
                container: container.to_string(),
                object: object.to_string(),
                message: "container does not exist".to_string(),
            })?;

        // only the fingerprint survives a round trip through object metadata
        let recorded = FileState {
            content_type: state.content_type.clone(),
            ..FileState::from_metadata(&state.to_metadata())
        };
        objects.insert(object.to_string(), StoredObject { body, state: recorded });
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

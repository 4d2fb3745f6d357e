use super::EntityStore;
use crate::error::StoreError;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct Buckets {
    documents: HashMap<(String, String), String>,
    counters: HashMap<(String, String), u64>,
}

/// In-process [`EntityStore`] with the same add/increment semantics as the
/// sqlite store. Used for dry runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Buckets>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents held in `bucket`, counters excluded.
    pub fn len(&self, bucket: &str) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .documents
            .keys()
            .filter(|(b, _)| b == bucket)
            .count()
    }

    fn with_buckets<T>(&self, f: impl FnOnce(&mut Buckets) -> T) -> Result<T, StoreError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| StoreError::Backend("memory store mutex poisoned".into()))?;
        Ok(f(&mut guard))
    }
}

fn key(bucket: &str, id: &str) -> (String, String) {
    (bucket.to_string(), id.to_string())
}

impl EntityStore for MemoryStore {
    fn get(&self, bucket: &str, id: &str) -> Result<Option<String>, StoreError> {
        self.with_buckets(|b| b.documents.get(&key(bucket, id)).cloned())
    }

    fn set(&self, bucket: &str, id: &str, body: &str) -> Result<(), StoreError> {
        self.with_buckets(|b| {
            b.documents.insert(key(bucket, id), body.to_string());
        })
    }

    fn add(&self, bucket: &str, id: &str, body: &str) -> Result<bool, StoreError> {
        self.with_buckets(|b| {
            let entry = key(bucket, id);
            if b.documents.contains_key(&entry) {
                return false;
            }
            b.documents.insert(entry, body.to_string());
            true
        })
    }

    fn remove(&self, bucket: &str, id: &str) -> Result<bool, StoreError> {
        self.with_buckets(|b| b.documents.remove(&key(bucket, id)).is_some())
    }

    fn increment(
        &self,
        bucket: &str,
        counter: &str,
        delta: u64,
        initial: u64,
    ) -> Result<u64, StoreError> {
        self.with_buckets(|b| {
            let value = b
                .counters
                .entry(key(bucket, counter))
                .and_modify(|v| *v += delta)
                .or_insert(initial);
            *value
        })
    }
}

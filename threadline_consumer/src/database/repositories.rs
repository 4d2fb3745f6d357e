use super::models::{
    CommentRecord, ThreadRecord, UserRecord, COMMENT_BUCKET, THREAD_BUCKET, USER_BUCKET,
};
use super::EntityStore;
use crate::error::{MutationError, MutationResult, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// A JSON document stored under its own id in a fixed bucket.
pub trait Document: Serialize + DeserializeOwned {
    const BUCKET: &'static str;

    fn id(&self) -> &str;
}

impl Document for UserRecord {
    const BUCKET: &'static str = USER_BUCKET;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Document for ThreadRecord {
    const BUCKET: &'static str = THREAD_BUCKET;

    fn id(&self) -> &str {
        &self.id
    }
}

impl Document for CommentRecord {
    const BUCKET: &'static str = COMMENT_BUCKET;

    fn id(&self) -> &str {
        &self.id
    }
}

/// Typed accessors over a raw [`EntityStore`].
#[derive(Clone, Copy)]
pub struct Repositories<'s> {
    store: &'s dyn EntityStore,
}

impl<'s> Repositories<'s> {
    pub fn new(store: &'s dyn EntityStore) -> Self {
        Self { store }
    }

    pub fn users(&self) -> Collection<'s, UserRecord> {
        Collection::new(self.store)
    }

    pub fn threads(&self) -> Collection<'s, ThreadRecord> {
        Collection::new(self.store)
    }

    pub fn comments(&self) -> Collection<'s, CommentRecord> {
        Collection::new(self.store)
    }
}

pub struct Collection<'s, D> {
    store: &'s dyn EntityStore,
    _document: PhantomData<D>,
}

impl<'s, D: Document> Collection<'s, D> {
    fn new(store: &'s dyn EntityStore) -> Self {
        Self {
            store,
            _document: PhantomData,
        }
    }

    pub fn get(&self, id: &str) -> Result<Option<D>, StoreError> {
        let Some(body) = self.store.get(D::BUCKET, id)? else {
            return Ok(None);
        };
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                bucket: D::BUCKET.to_string(),
                id: id.to_string(),
                source,
            })
    }

    /// Like [`get`](Self::get), but a missing document is a [`MutationError::NotFound`].
    pub fn require(&self, id: &str) -> MutationResult<D> {
        self.get(id)?.ok_or_else(|| MutationError::NotFound {
            bucket: D::BUCKET,
            id: id.to_string(),
        })
    }

    pub fn set(&self, document: &D) -> Result<(), StoreError> {
        let body = serde_json::to_string(document).map_err(StoreError::Encode)?;
        self.store.set(D::BUCKET, document.id(), &body)
    }

    /// Inserts a new document; an existing id is an [`MutationError::IdCollision`].
    pub fn add(&self, document: &D) -> MutationResult<()> {
        let body = serde_json::to_string(document).map_err(StoreError::Encode)?;
        if self.store.add(D::BUCKET, document.id(), &body)? {
            Ok(())
        } else {
            Err(MutationError::IdCollision {
                bucket: D::BUCKET,
                id: document.id().to_string(),
            })
        }
    }

    pub fn remove(&self, id: &str) -> Result<bool, StoreError> {
        self.store.remove(D::BUCKET, id)
    }

    /// Allocates the next id from the bucket's `<Bucket>Num` counter.
    pub fn next_id(&self) -> Result<String, StoreError> {
        let counter = format!("{}Num", D::BUCKET);
        let value = self.store.increment(D::BUCKET, &counter, 1, 1)?;
        Ok(value.to_string())
    }
}

use thiserror::Error;

/// Failures raised by an [`EntityStore`](crate::database::EntityStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store operation `{op}` on bucket {bucket} timed out")]
    Timeout { bucket: String, op: &'static str },
    #[error("store backend failure: {0}")]
    Backend(String),
    #[error("document {bucket}/{id} is not valid JSON for its type")]
    Corrupt {
        bucket: String,
        id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode document: {0}")]
    Encode(#[source] serde_json::Error),
}

impl StoreError {
    /// Timeouts and backend failures are transient from the consumer's point of
    /// view: the message is handed back to the queue for redelivery.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Timeout { .. } | StoreError::Backend(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("payload field `{0}` must not be empty")]
    Empty(&'static str),
}

#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("{bucket} {id} not found")]
    NotFound { bucket: &'static str, id: String },
    #[error("a {bucket} with id {id} already exists")]
    IdCollision { bucket: &'static str, id: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MutationError {
    pub fn is_retryable(&self) -> bool {
        match self {
            MutationError::Store(err) => err.is_retryable(),
            _ => false,
        }
    }

    /// Short label used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            MutationError::Decode(_) => "decode",
            MutationError::NotFound { .. } => "not_found",
            MutationError::IdCollision { .. } => "id_collision",
            MutationError::Store(StoreError::Timeout { .. }) => "store_timeout",
            MutationError::Store(_) => "store",
        }
    }
}

pub type MutationResult<T> = std::result::Result<T, MutationError>;

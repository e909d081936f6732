use thiserror::Error;

use crate::MarketBucket;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: u64 },

    #[error("invalid {what}: {value}")]
    InvalidScope { what: &'static str, value: String },

    #[error("not enough posts in {} market for a grade curve ({count})", bucket.label())]
    InsufficientData { bucket: MarketBucket, count: usize },

    #[error("store unavailable: {0}")]
    Store(String),
}

impl FeedError {
    pub fn not_found(entity: &'static str, id: u64) -> Self {
        FeedError::NotFound { entity, id }
    }

    pub fn invalid_scope(what: &'static str, value: impl Into<String>) -> Self {
        FeedError::InvalidScope {
            what,
            value: value.into(),
        }
    }

    /// Transient failures are worth retrying from the caller; the rest are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FeedError::Store(_))
    }
}

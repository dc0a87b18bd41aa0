//! Error type shared by the scheduling core.

use thiserror::Error;
use uuid::Uuid;

pub type DispatchResult<T> = Result<T, DispatchError>;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Admission counter error: {0}")]
    Counter(String),

    #[error("Overflow store error: {0}")]
    Overflow(String),

    #[error("Job store error: {0}")]
    Store(String),

    #[error("Compute platform error: {0}")]
    Compute(String),

    #[error("Object storage error: {0}")]
    Storage(String),

    #[error("Status sink error: {0}")]
    Sink(String),

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DispatchError {
    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    pub fn compute(msg: impl Into<String>) -> Self {
        Self::Compute(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Infrastructure errors are retried; everything else is final for the
    /// operation that raised it.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::JobNotFound(_) | Self::Json(_) | Self::Token(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_payloads_are_not_transient() {
        let err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(!DispatchError::from(err).is_transient());
        assert!(!DispatchError::JobNotFound(Uuid::nil()).is_transient());
        assert!(DispatchError::queue("channel closed").is_transient());
        assert!(DispatchError::Timeout("run_task".into()).is_transient());
    }
}

//! Application Error Types
//!
//! Centralized error taxonomy for the chat core.

/// Chat core error type.
///
/// Business errors (`Validation`, `NotFound`, `Forbidden`, `Unauthorized`,
/// `UnknownEvent`) are enveloped back to the originating connection only.
/// `Conflict` is internal control flow (duplicate direct group resolved by
/// re-fetch) and must not escape the group resolver. `Infrastructure` means
/// the backing store or registry is unreachable; it is retryable and is never
/// collapsed into a business outcome such as "user offline".
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl ChatError {
    /// True when retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChatError::Infrastructure(_))
    }
}

impl From<sqlx::Error> for ChatError {
    fn from(e: sqlx::Error) -> Self {
        // Unique violations are normal control flow for insert-or-fetch
        // creation paths; everything else is an unreachable/failed store.
        if let sqlx::Error::Database(db) = &e {
            if db.code().as_deref() == Some("23505") {
                return ChatError::Conflict(db.message().to_string());
            }
        }
        ChatError::Infrastructure(format!("database: {}", e))
    }
}

impl From<redis::RedisError> for ChatError {
    fn from(e: redis::RedisError) -> Self {
        ChatError::Infrastructure(format!("presence store: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_infrastructure_is_retryable() {
        assert!(ChatError::Infrastructure("down".into()).is_retryable());
        assert!(!ChatError::Validation("bad".into()).is_retryable());
        assert!(!ChatError::NotFound("gone".into()).is_retryable());
        assert!(!ChatError::Conflict("dup".into()).is_retryable());
    }

    #[test]
    fn test_redis_error_maps_to_infrastructure() {
        let err: ChatError = redis::RedisError::from((redis::ErrorKind::Io, "refused")).into();
        assert!(matches!(err, ChatError::Infrastructure(_)));
    }
}

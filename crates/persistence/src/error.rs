//! Persistence error types and SQLSTATE classification

use deadpool_postgres::PoolError;
use thiserror::Error;

pub use contracts::StorageError;

/// Errors raised while setting up a store
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Pool could not be built from the connection settings
    #[error("failed to create connection pool: {message}")]
    PoolCreation { message: String },

    /// Schema identifier rejected
    #[error("invalid schema identifier '{identifier}'")]
    InvalidIdentifier { identifier: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Classify a driver error by SQLSTATE
pub(crate) fn classify(error: &tokio_postgres::Error) -> StorageError {
    if error.is_closed() {
        return StorageError::connection(error.to_string());
    }
    let Some(state) = error.code() else {
        return StorageError::query(error.to_string());
    };

    let code = state.code();
    let message = error
        .as_db_error()
        .map(|db| db.message().to_string())
        .unwrap_or_else(|| error.to_string());

    classify_sqlstate(code, message)
}

pub(crate) fn classify_sqlstate(code: &str, message: String) -> StorageError {
    match code {
        "40001" | "40P01" => StorageError::Serialization {
            code: code.to_string(),
            message,
        },
        c if c.starts_with("08") => StorageError::Connection { message },
        c if c.starts_with("23") => StorageError::Constraint {
            code: code.to_string(),
            message,
        },
        _ => StorageError::Query { message },
    }
}

/// Pool failures: a backend error here means the connection could not be opened
pub(crate) fn from_pool_error(error: PoolError) -> StorageError {
    match error {
        PoolError::Backend(e) => StorageError::connection(e.to_string()),
        other => StorageError::pool(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlstate_classes() {
        assert_eq!(
            classify_sqlstate("08006", "gone".into()),
            StorageError::connection("gone")
        );
        assert!(matches!(
            classify_sqlstate("23505", "dup".into()),
            StorageError::Constraint { code, .. } if code == "23505"
        ));
        assert!(matches!(
            classify_sqlstate("23503", "fk".into()),
            StorageError::Constraint { .. }
        ));
        assert!(matches!(
            classify_sqlstate("40001", "retry".into()),
            StorageError::Serialization { .. }
        ));
        assert!(matches!(
            classify_sqlstate("40P01", "deadlock".into()),
            StorageError::Serialization { .. }
        ));
        assert_eq!(
            classify_sqlstate("42P01", "no table".into()),
            StorageError::query("no table")
        );
    }

    #[test]
    fn test_pool_timeout_is_pool_error() {
        let err = from_pool_error(PoolError::Timeout(deadpool_postgres::TimeoutType::Wait));
        assert_eq!(err.kind(), "pool");
    }
}

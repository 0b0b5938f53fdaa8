//! Error types for annotation access resolution.

use std::fmt;

use thiserror::Error;

/// Failure reported by a backing store (annotation, dashboard or grant store).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend rejected or failed the query.
    #[error("store error: {0}")]
    Backend(String),

    /// The store did not answer within the configured deadline.
    #[error("store '{store}' timed out after {after_ms} ms")]
    Timeout { store: String, after_ms: u64 },

    /// The store task panicked before producing a result.
    #[error("store task panicked: {0}")]
    Panicked(String),

    /// One or more stores of a composite failed.
    #[error("{0}")]
    Incomplete(JoinedStoreError),
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend(message.into())
    }
}

/// A single store failure inside a composite query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub store: String,
    pub error: StoreError,
}

/// Every failure observed during one composite fan-out.
///
/// Failures are kept in store registration order; no failure is dropped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JoinedStoreError {
    failures: Vec<SourceFailure>,
}

impl JoinedStoreError {
    pub fn new(failures: Vec<SourceFailure>) -> Self {
        Self { failures }
    }

    pub fn failures(&self) -> &[SourceFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether `err` is one of the joined failures, looking through nested joins.
    pub fn contains(&self, err: &StoreError) -> bool {
        self.failures.iter().any(|f| match &f.error {
            StoreError::Incomplete(inner) => inner.contains(err),
            other => other == err,
        })
    }
}

impl fmt::Display for JoinedStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", failure.store, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for JoinedStoreError {}

/// Errors surfaced to callers of the resolver and the repository.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The principal holds no grant that makes anything visible.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A store or query failed. Not retried here.
    #[error("internal error: {0}")]
    Internal(StoreError),

    /// At least one composite store failed; the merged result was discarded.
    #[error("incomplete annotation sources: {0}")]
    IncompleteSource(JoinedStoreError),
}

impl From<StoreError> for AccessError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Incomplete(joined) => AccessError::IncompleteSource(joined),
            other => AccessError::Internal(other),
        }
    }
}

impl AccessError {
    pub fn is_forbidden(&self) -> bool {
        matches!(self, AccessError::Forbidden(_))
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub type Result<T> = std::result::Result<T, AccessError>;

/// Configuration parsing failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid access config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid access config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joined_error_matches_every_failure() {
        let err1 = StoreError::backend("err1");
        let err2 = StoreError::backend("err2");
        let joined = JoinedStoreError::new(vec![
            SourceFailure {
                store: "sql".into(),
                error: err1.clone(),
            },
            SourceFailure {
                store: "history".into(),
                error: err2.clone(),
            },
        ]);

        assert!(joined.contains(&err1));
        assert!(joined.contains(&err2));
        assert!(!joined.contains(&StoreError::backend("err3")));
        assert_eq!(joined.to_string(), "sql: store error: err1\nhistory: store error: err2");
    }

    #[test]
    fn nested_joins_are_searched() {
        let leaf = StoreError::Panicked("boom".into());
        let inner = JoinedStoreError::new(vec![SourceFailure {
            store: "a".into(),
            error: leaf.clone(),
        }]);
        let outer = JoinedStoreError::new(vec![SourceFailure {
            store: "composite".into(),
            error: StoreError::Incomplete(inner),
        }]);
        assert!(outer.contains(&leaf));
    }

    #[test]
    fn incomplete_store_error_maps_to_incomplete_source() {
        let joined = JoinedStoreError::new(vec![SourceFailure {
            store: "a".into(),
            error: StoreError::backend("down"),
        }]);
        let err: AccessError = StoreError::Incomplete(joined).into();
        assert!(matches!(err, AccessError::IncompleteSource(ref j) if j.len() == 1));

        let err: AccessError = StoreError::backend("down").into();
        assert!(matches!(err, AccessError::Internal(_)));
        assert!(!err.is_forbidden());
    }
}

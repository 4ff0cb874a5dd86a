//! Evaluation and store error types.

use thiserror::Error;

/// Failures reported by a graph store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// A concurrent writer invalidated this transaction
    #[error("transaction conflict: {0}")]
    Conflict(String),

    /// The caller's cancellation token fired
    #[error("operation cancelled")]
    Cancelled,

    /// The caller's deadline passed
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A lock was poisoned (internal error)
    #[error("lock poisoned")]
    LockPoisoned,

    /// The store holds no rows of this entity type
    #[error("unknown entity type '{0}'")]
    UnknownEntity(String),

    /// Backend-specific failure
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether re-running the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Failures while evaluating a plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    /// A single-row reference matched nothing
    #[error("no {entity} matches {filter}")]
    NotFound { entity: String, filter: String },

    /// A single-row reference matched more than one row
    #[error("{count} {entity} rows match {filter}, expected one")]
    AmbiguousMatch {
        entity: String,
        filter: String,
        count: usize,
    },

    /// The principal lacks the permission needed to delegate
    #[error("{principal} may not {action} on {resource}: requires '{required}'")]
    Forbidden {
        principal: String,
        action: String,
        resource: String,
        required: String,
    },

    /// A value does not fit the declared field type
    #[error("field '{entity}.{field}' expects {expected}, got {actual}")]
    TypeMismatch {
        entity: String,
        field: String,
        expected: String,
        actual: String,
    },

    /// The plan was compiled for a different principal
    #[error("plan was compiled for {plan}, but the caller is {caller}")]
    PrincipalMismatch { plan: String, caller: String },

    /// The plan was compiled against a different schema
    #[error("plan schema {plan:08x} does not match current schema {current:08x}")]
    StaleSchema { plan: u32, current: u32 },

    /// The graph store failed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RuntimeError {
    /// Whether re-running the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, RuntimeError::Store(e) if e.is_retryable())
    }
}

/// A specialized `Result` type for evaluation.
pub type Result<T> = std::result::Result<T, RuntimeError>;

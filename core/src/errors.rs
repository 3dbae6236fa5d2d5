//! Error taxonomy for study operations.
//!
//! Every failure is reported to the immediate caller as a typed error.
//! Creation conflicts on the assignment store are resolved internally by a
//! single re-read and never appear here.

use thiserror::Error;

use crate::item::Category;
use crate::store::StoreError;

/// Error category for structured logging and transport mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Unknown participant, or no assignment yet
    NotFound,
    /// Task number outside {1,2,3,4}
    InvalidTask,
    /// Item pool cannot satisfy the assignment constraints
    InsufficientPool,
    /// Stored data violates an invariant that should always hold
    InvalidState,
    /// Caller input failed boundary checks
    Validation,
    /// Store backend failure
    Store,
}

impl ErrorCategory {
    /// Machine-readable code for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::InvalidTask => "INVALID_TASK",
            Self::InsufficientPool => "INSUFFICIENT_POOL",
            Self::InvalidState => "INVALID_STATE",
            Self::Validation => "VALIDATION",
            Self::Store => "STORE_ERROR",
        }
    }
}

/// Why the item pool could not produce an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolShortfall {
    /// Fewer than four items in the whole pool
    TooFewItems { available: usize },
    /// No item left in a category once the task 1 pick is excluded
    EmptyCategory { category: Category },
}

impl std::fmt::Display for PoolShortfall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewItems { available } => {
                write!(f, "need at least 4 items, pool has {available}")
            }
            Self::EmptyCategory { category } => {
                write!(f, "no assignable item in category '{category}'")
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum StudyError {
    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("invalid task number {task}: must be 1, 2, 3, or 4")]
    InvalidTask { task: i64 },

    #[error("insufficient item pool: {0}")]
    InsufficientPool(PoolShortfall),

    #[error("invalid state: {message}")]
    InvalidState { message: String },

    #[error("validation failed: {}", .errors.join("; "))]
    Validation { errors: Vec<String> },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StudyError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::InvalidTask { .. } => ErrorCategory::InvalidTask,
            Self::InsufficientPool(_) => ErrorCategory::InsufficientPool,
            Self::InvalidState { .. } => ErrorCategory::InvalidState,
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Store(_) => ErrorCategory::Store,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    pub fn validation(error: impl Into<String>) -> Self {
        Self::Validation {
            errors: vec![error.into()],
        }
    }
}

pub type Result<T> = std::result::Result<T, StudyError>;

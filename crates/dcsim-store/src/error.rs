//! Error types for the persistence layer

use dcsim_core::DcsimError;
use thiserror::Error;

/// Errors raised by persistence gateway and queue operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store could not execute a statement
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A result column did not hold the requested type
    #[error("Column {column} is not {expected}")]
    Decode {
        /// Position of the column in the row
        column: usize,
        /// Type that was requested
        expected: &'static str,
    },

    /// No experiment row exists for the id
    #[error("Experiment not found: {0}")]
    ExperimentNotFound(i64),

    /// Stored definitions do not form a valid model
    #[error("Invalid definition: {0}")]
    Definition(#[from] DcsimError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for persistence operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl StoreError {
    /// Check whether the error concerns one experiment's stored inputs rather than the store itself
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            StoreError::Definition(_) | StoreError::ExperimentNotFound(_)
        )
    }
}

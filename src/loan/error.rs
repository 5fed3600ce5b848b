use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::model::LoanState;
use crate::gateway::RepositoryError;

/// Errors raised by lifecycle operations
#[derive(Error, Debug)]
pub enum LoanError {
    #[error("loan not found: {0}")]
    NotFound(Uuid),

    #[error("loan cannot be {action} in state {state}")]
    InvalidTransition {
        action: &'static str,
        state: LoanState,
    },

    #[error("investment of {requested} exceeds remaining principal {remaining}")]
    Overfunding {
        requested: Decimal,
        remaining: Decimal,
    },

    #[error("{field} must be positive, got {value}")]
    InvalidAmount { field: &'static str, value: Decimal },

    #[error("{field} {value} exceeds the supported precision or magnitude")]
    AmountOutOfRange { field: &'static str, value: Decimal },

    #[error("persistence failure: {0}")]
    Persistence(RepositoryError),

    #[error("agreement generation failed: {0}")]
    DocumentGeneration(String),
}

impl From<RepositoryError> for LoanError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(id) => LoanError::NotFound(id),
            other => LoanError::Persistence(other),
        }
    }
}

impl LoanError {
    /// True for a lost optimistic-concurrency race; the operation can be replayed.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            LoanError::Persistence(RepositoryError::VersionConflict { .. })
        )
    }
}

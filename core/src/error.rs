//! Error taxonomy for ledger operations.
//!
//! Contention and unavailability are never errors: a seat another buyer won,
//! or one that is already sold, is simply absent from the returned result.
//! Only the failures below propagate to callers.

use thiserror::Error;

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur while reading or mutating the inventory ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// A single referenced entity does not exist.
    ///
    /// Batch operations skip missing ids instead of raising this.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of entity that was looked up (e.g. "event seat")
        entity: &'static str,
        /// The identifier that was looked up
        id: String,
    },

    /// Transient transaction failure (serialization conflict, deadlock,
    /// lock timeout, pool exhaustion). Safe to retry with the same inputs.
    #[error("Transient ledger failure: {0}")]
    Transient(String),

    /// Any other storage failure.
    #[error("Database error: {0}")]
    Database(String),

    /// A catalog record could not be created from the given input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl LedgerError {
    /// Build a [`LedgerError::NotFound`] for the given entity and id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

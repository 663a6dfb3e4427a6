//! Error types for the progression engine

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur while computing or persisting learner progress
#[derive(Debug, Error)]
pub enum EngineError {
    /// Score, stars or amount outside its domain
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Node id is not in the catalog
    #[error("Node not found: {0}")]
    NotFound(String),

    /// Node prerequisites are not yet completed
    #[error("Node is locked: {0}")]
    Locked(String),

    /// Gem spend exceeds the current balance
    #[error("Insufficient gems: requested {requested}, balance {balance}")]
    InsufficientFunds {
        /// Amount the caller tried to spend
        requested: u32,
        /// Balance at the time of the attempt
        balance: u64,
    },

    /// Bonus already claimed for this calendar day
    #[error("Already claimed: {0}")]
    AlreadyClaimed(String),

    /// Catalog or stored state violates a structural invariant
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// Stored state changed between load and save
    #[error("Write conflict for learner {learner_id}: expected version {expected}, found {found}")]
    Conflict {
        /// Learner whose state was written concurrently
        learner_id: String,
        /// Version the writer loaded
        expected: u64,
        /// Version currently stored
        found: u64,
    },

    /// Repository failure not covered by IO or JSON
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    /// Check if the operation can be retried against fresh state
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::Conflict { .. } | EngineError::Storage(_))
    }

    /// Check if the engine must refuse to operate
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::DataIntegrity(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_recoverable() {
        let err = EngineError::Conflict { learner_id: "ada".into(), expected: 1, found: 2 };
        assert!(err.is_recoverable());
        assert!(!err.is_fatal());
    }

    #[test]
    fn integrity_errors_are_fatal() {
        let err = EngineError::DataIntegrity("cycle".into());
        assert!(err.is_fatal());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn insufficient_funds_message_names_amounts() {
        let err = EngineError::InsufficientFunds { requested: 50, balance: 30 };
        assert_eq!(err.to_string(), "Insufficient gems: requested 50, balance 30");
    }
}

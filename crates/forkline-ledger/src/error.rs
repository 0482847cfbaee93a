use crate::reducer::ReducerError;

/// Errors produced by log operations.
///
/// Appending, forking, diffing, and merging never fail. Errors only arise
/// from the caller's reducer during materialization and from configuration
/// handling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error(transparent)]
    Reducer(#[from] ReducerError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

use thiserror::Error;

use crate::core::types::{EntityKind, IdT};

#[derive(Error, Debug)]
pub enum GameError {
    /// A programming error; the block must be aborted.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("{kind} {id} not found")]
    EntityNotFound { kind: EntityKind, id: IdT },

    #[error("A handle to {kind} {key} is already open")]
    HandleAlreadyOpen { kind: EntityKind, key: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transaction error: {0}")]
    Transaction(String),
}

impl GameError {
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, GameError>;

/// Returns an invariant violation from the enclosing function unless
/// the condition holds.
#[macro_export]
macro_rules! ensure_invariant {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::core::error::GameError::InvariantViolation(format!($($arg)+)));
        }
    };
}

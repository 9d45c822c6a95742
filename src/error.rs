//! Crate error types

use thiserror::Error;

use crate::persistence::StorageError;

/// Everything that can go wrong while setting up or playing a session.
///
/// None of these are fatal: the menu reports them and carries on.
#[derive(Debug, Error)]
pub enum GameError {
    /// Bad setup parameters or an input the current game cannot use
    #[error("invalid input: {0}")]
    Validation(String),
    /// Action attempted in the wrong session phase
    #[error("cannot {action} while session is {state}")]
    InvalidState {
        action: &'static str,
        state: &'static str,
    },
    /// Score store could not be written
    #[error("score store error: {0}")]
    Persistence(#[from] StorageError),
}

impl GameError {
    pub fn validation(msg: impl Into<String>) -> Self {
        GameError::Validation(msg.into())
    }
}

pub type Result<T, E = GameError> = std::result::Result<T, E>;

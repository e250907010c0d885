use thiserror::Error;

use crate::models::{SessionStatus, SetId};

/// Rejections produced by session commands.
///
/// None of these leave the session half-modified: a command either applies
/// completely or returns one of these and changes nothing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    /// The command is not allowed in the current state. Always a caller bug.
    #[error("`{command}` is not allowed while the session is {status}")]
    InvalidState {
        command: &'static str,
        status: SessionStatus,
    },

    #[error("no set with id {0} in the current session")]
    NotFound(SetId),

    #[error("invalid input: {0}")]
    Validation(String),
}

impl SessionError {
    pub(crate) fn invalid(command: &'static str, status: SessionStatus) -> Self {
        Self::InvalidState { command, status }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

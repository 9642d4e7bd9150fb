//! Error types for run control.
//!
//! `RcError` covers everything the state machine and the composite sequences can
//! report. Front-end glue (CLI, config loading) uses `anyhow` on top of it.

use crate::commands::Command;
use crate::model::State;
use thiserror::Error;

/// Convenience alias for results using the run-control error type.
pub type RcResult<T> = std::result::Result<T, RcError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RcError {
    /// The command's declared in-state does not match the current state.
    #[error("cannot send '{command}' from '{current}' (requires '{expected}')")]
    StateMismatch {
        command: Command,
        current: State,
        expected: State,
    },

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("'{command}' requires parameter '{parameter}'")]
    MissingParameter {
        command: Command,
        parameter: &'static str,
    },

    /// Another command is mid-execution against the same instance.
    #[error("'{running}' is still in progress")]
    Busy { running: Command },

    #[error("'{command}' failed: {message}")]
    Transport { command: Command, message: String },
}

impl RcError {
    /// True for the one failure class composite sequences treat as "skip this step".
    pub fn is_precondition(&self) -> bool {
        matches!(self, RcError::StateMismatch { .. })
    }
}

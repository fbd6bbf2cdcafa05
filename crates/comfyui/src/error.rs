//! Crate-level error combining every stage of the engine handshake.

use crate::api::ComfyUIApiError;
use crate::client::ComfyUIClientError;
use crate::history::FetchError;
use crate::waiter::WaitError;

/// Broad failure classes callers report on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection refused, non-2xx status, malformed body.
    Transport,
    /// The engine reported an error while executing the workflow.
    RemoteExecution,
    /// No terminal event within the wait budget.
    Timeout,
    /// The engine finished but the expected output is missing.
    ContractViolation,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Api(#[from] ComfyUIApiError),

    #[error(transparent)]
    Connection(#[from] ComfyUIClientError),

    #[error(transparent)]
    Wait(#[from] WaitError),

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Api(_) | EngineError::Connection(_) => ErrorKind::Transport,
            EngineError::Wait(WaitError::Timeout { .. }) => ErrorKind::Timeout,
            EngineError::Wait(WaitError::RemoteExecution { .. }) => ErrorKind::RemoteExecution,
            EngineError::Wait(_) => ErrorKind::Transport,
            EngineError::Fetch(FetchError::Api(_)) => ErrorKind::Transport,
            EngineError::Fetch(FetchError::NotReady { .. } | FetchError::NoResult { .. }) => {
                ErrorKind::ContractViolation
            }
        }
    }
}

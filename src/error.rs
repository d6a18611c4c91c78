use thiserror::Error;

use crate::{
    dao::storage::StorageError,
    state::{
        player::{PlayerStoreError, RecordError},
        trial::TrialError,
    },
};

/// Errors returned by the session command surface.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Another player already uses the requested name.
    #[error("duplicate name: {0}")]
    DuplicateName(String),
    /// Requested player was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Invalid input provided by the caller.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Storage backend failed; the in-memory state is intact.
    #[error("storage failure")]
    Storage(#[source] StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Storage(err)
    }
}

impl From<PlayerStoreError> for ServiceError {
    fn from(err: PlayerStoreError) -> Self {
        match err {
            PlayerStoreError::DuplicateName(name) => {
                ServiceError::DuplicateName(format!("player `{name}` already exists"))
            }
            PlayerStoreError::NotFound(name) => {
                ServiceError::NotFound(format!("player `{name}` not found"))
            }
            PlayerStoreError::InvalidName(message) => ServiceError::InvalidInput(message),
        }
    }
}

impl From<RecordError> for ServiceError {
    fn from(err: RecordError) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

impl From<TrialError> for ServiceError {
    fn from(err: TrialError) -> Self {
        match err {
            TrialError::InvalidState { .. } => ServiceError::InvalidState(err.to_string()),
            TrialError::Record(record) => record.into(),
        }
    }
}

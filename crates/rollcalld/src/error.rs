use crate::store::StoreError;
use rollcall_core::{PersonId, SessionId, SubjectId, VectorError};
use std::time::Duration;
use thiserror::Error;

/// Faults reported to callers. Expected business outcomes (window not open,
/// face not recognized, ...) are never errors; they travel as values.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unknown person {0}")]
    UnknownPerson(PersonId),
    #[error("unknown session {0}")]
    UnknownSession(SessionId),
    #[error("unknown subject {0}")]
    UnknownSubject(SubjectId),
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
    #[error("persistence timed out after {0:?}")]
    Timeout(Duration),
}

impl ServiceError {
    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Timeout(_))
    }
}

impl From<VectorError> for ServiceError {
    fn from(err: VectorError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<ServiceError> for zbus::fdo::Error {
    fn from(err: ServiceError) -> Self {
        if err.is_retryable() {
            zbus::fdo::Error::Failed(format!("{err} (retryable)"))
        } else {
            zbus::fdo::Error::InvalidArgs(err.to_string())
        }
    }
}

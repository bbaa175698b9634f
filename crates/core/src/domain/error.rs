// Domain Error Types

use crate::domain::job::JobState;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    /// A job was moved along an edge the lifecycle does not have
    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidStateTransition { from: JobState, to: JobState },
}

pub type Result<T> = std::result::Result<T, DomainError>;

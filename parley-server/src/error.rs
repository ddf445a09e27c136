//! Errors surfaced by the service operations.

use parley_proto::task::TaskId;

/// Failure of a single service call. No variant is fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The caller lacks permission for the operation.
    #[error("Unauthorized access")]
    Unauthorized,

    /// The referenced task does not exist.
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    /// Unexpected failure while orchestrating a chat send.
    #[error("failed to process message: {0}")]
    Internal(String),
}

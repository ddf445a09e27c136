//! Restart-safe snapshot of the service state.
//!
//! At shutdown every store is flattened into an ordered sequence of
//! key/value pairs and written as a single [`StateSnapshot`]. At startup the
//! snapshot rebuilds the live stores and is then discarded.
//!
//! Wire format: `[u16 version (LE)][postcard payload]`. The version prefix is
//! checked before the payload is touched, so a snapshot written by a newer
//! layout is rejected cleanly instead of being misread.

use serde::{Deserialize, Serialize};

use crate::message::{ChatMessage, MessageKey};
use crate::task::{Task, TaskId};

/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u16 = 1;

/// Error type for snapshot encode/decode operations.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// Serialization or deserialization failed.
    #[error("snapshot serialization error: {0}")]
    Serialization(String),
    /// The snapshot is shorter than its version prefix.
    #[error("snapshot truncated: {0} bytes")]
    Truncated(usize),
    /// The snapshot was written by an unknown layout version.
    #[error("unsupported snapshot version {found} (expected {})", SNAPSHOT_VERSION)]
    UnsupportedVersion {
        /// Version found in the prefix.
        found: u16,
    },
}

/// Flat, order-preserving form of all persistent state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Chat transcript entries keyed by message timestamp.
    pub messages: Vec<(MessageKey, ChatMessage)>,
    /// Task records keyed by task id.
    pub tasks: Vec<(TaskId, Task)>,
    /// Next value of the task-id counter.
    pub next_task_id: u64,
    /// Authorization entries (caller identity, permission flag).
    pub authorized: Vec<(String, bool)>,
}

impl StateSnapshot {
    /// Returns `true` if the snapshot carries no state at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
            && self.tasks.is_empty()
            && self.authorized.is_empty()
            && self.next_task_id == 0
    }
}

/// Encodes a snapshot with its version prefix.
///
/// # Errors
///
/// Returns `SnapshotError::Serialization` if the snapshot cannot be serialized.
pub fn encode(snapshot: &StateSnapshot) -> Result<Vec<u8>, SnapshotError> {
    let payload =
        postcard::to_allocvec(snapshot).map_err(|e| SnapshotError::Serialization(e.to_string()))?;
    let mut out = Vec::with_capacity(2 + payload.len());
    out.extend_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Decodes a snapshot, checking its version prefix first.
///
/// # Errors
///
/// Returns `SnapshotError::Truncated` if the prefix is missing,
/// `SnapshotError::UnsupportedVersion` for an unknown layout, or
/// `SnapshotError::Serialization` if the payload is corrupt.
pub fn decode(bytes: &[u8]) -> Result<StateSnapshot, SnapshotError> {
    let Some((prefix, payload)) = bytes.split_first_chunk::<2>() else {
        return Err(SnapshotError::Truncated(bytes.len()));
    };
    let found = u16::from_le_bytes(*prefix);
    if found != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion { found });
    }
    postcard::from_bytes(payload).map_err(|e| SnapshotError::Serialization(e.to_string()))
}

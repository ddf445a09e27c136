//! Task records and their status values.
//!
//! Task identifiers come from a process-wide counter and are rendered as
//! decimal text (`"0"`, `"1"`, ...). The status set is closed but carries no
//! transition table: any status may follow any other.

use serde::{Deserialize, Serialize};

/// Identifier of a task, the decimal rendering of a counter value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Creates the identifier for counter value `n`.
    #[must_use]
    pub fn from_counter(n: u64) -> Self {
        Self(n.to_string())
    }

    /// Returns the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    /// Newly created; every task starts here.
    Pending,
    /// Being worked on.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished unsuccessfully.
    Failed,
}

impl TaskStatus {
    /// All status values, in declaration order.
    pub const ALL: [Self; 4] = [Self::Pending, Self::InProgress, Self::Completed, Self::Failed];
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "inProgress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// A task record.
///
/// `id`, `description` and `created` are fixed at creation. Only `status`
/// and `updated` change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Counter-derived identifier.
    pub id: TaskId,
    /// Free-form description supplied by the creator.
    pub description: String,
    /// Current status.
    pub status: TaskStatus,
    /// Creation time, nanoseconds since the Unix epoch.
    pub created: u64,
    /// Time of the last status change, nanoseconds since the Unix epoch.
    pub updated: u64,
}

impl Task {
    /// Creates a `Pending` task with `created == updated == now`.
    #[must_use]
    pub fn new(id: TaskId, description: impl Into<String>, now: u64) -> Self {
        Self {
            id,
            description: description.into(),
            status: TaskStatus::Pending,
            created: now,
            updated: now,
        }
    }
}

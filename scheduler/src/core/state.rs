//! Task lifecycle states.

use serde::{Deserialize, Serialize};

/// Execution state of a task.
///
/// `Pending → Running ⇄ Paused → {Completed | Failed}`, with an explicit
/// reset path back to `Pending` so the same instance can be retried.
/// Terminal states are frozen: once a task completes or fails, further
/// transition attempts are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    /// Created, preconditions not yet satisfied.
    Pending,
    /// Actively advancing one step per tick.
    Running,
    /// Suspended by the scheduler; never stepped, clocks frozen.
    Paused,
    /// Finished successfully.
    Completed,
    /// Finished with a recorded failure.
    Failed,
}

impl TaskState {
    /// Whether the task has finished and can no longer transition.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }

    /// Whether `self → to` is a legal transition.
    pub(crate) fn allows(self, to: TaskState) -> bool {
        match self {
            TaskState::Pending => matches!(to, TaskState::Running | TaskState::Failed),
            TaskState::Running => matches!(
                to,
                TaskState::Paused | TaskState::Completed | TaskState::Failed
            ),
            TaskState::Paused => matches!(to, TaskState::Running | TaskState::Failed),
            TaskState::Completed | TaskState::Failed => false,
        }
    }
}

//! Per-task bookkeeping shared by every task implementation.
//!
//! A [`Lifecycle`] owns the state machine, priority, set-once failure
//! reason, and the tick-based inactivity timeout for one task instance.
//! Tasks embed one and expose it through the `Task` trait; the scheduler
//! drives transitions exclusively through it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::SchedulerConfig;
use crate::core::priority::TaskPriority;
use crate::core::state::TaskState;

/// Default inactivity budget, in ticks, before a task self-fails.
pub const DEFAULT_TIMEOUT_TICKS: u32 = 100;

/// Terminal failure recorded on a task. First call wins; later failures are
/// ignored once the task is terminal.
///
/// The `Display` form of [`TaskFailure::Timeout`] always starts with
/// `"timeout: "` so log and test consumers can pattern-match the timeout
/// sub-category without knowing the specific task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskFailure {
    /// No forward progress within the configured tick budget.
    #[error("timeout: no progress for {idle_ticks} ticks (limit {limit})")]
    Timeout { idle_ticks: u32, limit: u32 },
    /// The host requested an abort through the task context.
    #[error("aborted: {0}")]
    Aborted(String),
    /// Any other execution failure, in human-readable form.
    #[error("{0}")]
    Other(String),
}

impl TaskFailure {
    /// Convenience constructor for plain execution failures.
    pub fn message(reason: impl Into<String>) -> Self {
        TaskFailure::Other(reason.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, TaskFailure::Timeout { .. })
    }
}

/// Process-local task identity.
///
/// Providers construct fresh task values, so identity comparisons ("is this
/// the same task that is already current?") go through ids rather than
/// addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TaskId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// State machine and timing bookkeeping for one task instance.
#[derive(Debug)]
pub struct Lifecycle {
    id: TaskId,
    state: TaskState,
    priority: TaskPriority,
    failure: Option<TaskFailure>,
    timeout_ticks: u32,
    max_retries: u32,
    execution_ticks: u32,
    last_progress_tick: u32,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            id: TaskId::next(),
            state: TaskState::Pending,
            priority: TaskPriority::Normal,
            failure: None,
            timeout_ticks: DEFAULT_TIMEOUT_TICKS,
            max_retries: 0,
            execution_ticks: 0,
            last_progress_tick: 0,
        }
    }

    /// Construct with defaults taken from a [`SchedulerConfig`].
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            timeout_ticks: config.default_timeout_ticks,
            max_retries: config.default_max_retries,
            ..Self::new()
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_timeout_ticks(mut self, ticks: u32) -> Self {
        self.timeout_ticks = ticks;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    pub(crate) fn set_priority(&mut self, priority: TaskPriority) {
        self.priority = priority;
    }

    pub fn failure(&self) -> Option<&TaskFailure> {
        self.failure.as_ref()
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn execution_ticks(&self) -> u32 {
        self.execution_ticks
    }

    pub fn ticks_since_progress(&self) -> u32 {
        self.execution_ticks - self.last_progress_tick
    }

    // ------------------------------------------------------------------
    // Task-triggered transitions
    // ------------------------------------------------------------------

    /// Mark the task completed. Ignored once terminal; first outcome wins.
    pub fn complete(&mut self) {
        if !self.transition(TaskState::Completed) {
            return;
        }
        debug!(id = %self.id, ticks = self.execution_ticks, "task completed");
    }

    /// Mark the task failed. Ignored once terminal; the first recorded
    /// failure reason is frozen.
    pub fn fail(&mut self, failure: TaskFailure) {
        if self.state.is_terminal() {
            return;
        }
        debug!(id = %self.id, reason = %failure, ticks = self.execution_ticks, "task failed");
        self.failure = Some(failure);
        self.transition(TaskState::Failed);
    }

    /// Reset the inactivity window. Call whenever the task makes meaningful
    /// forward progress (phase advance, child completion, observed effect).
    pub fn record_progress(&mut self) {
        self.last_progress_tick = self.execution_ticks;
    }

    // ------------------------------------------------------------------
    // Scheduler-triggered transitions (crate-internal by design)
    // ------------------------------------------------------------------

    /// First successful precondition check moves Pending → Running.
    pub(crate) fn start(&mut self) {
        if self.state == TaskState::Pending {
            self.transition(TaskState::Running);
        }
    }

    /// Suspend a running task. A task still Pending stays Pending (it will
    /// re-check its precondition on the next step); terminal tasks are
    /// untouched.
    pub(crate) fn pause(&mut self) {
        if self.state == TaskState::Running {
            self.transition(TaskState::Paused);
        }
    }

    /// Restore Running after a pause, without re-running the precondition
    /// for the resumed point. A task paused while still Pending stays
    /// Pending.
    pub(crate) fn resume(&mut self) {
        if self.state == TaskState::Paused {
            self.transition(TaskState::Running);
        }
    }

    /// Advance the tick counter and apply the inactivity timeout. Returns
    /// false when the task just timed out (it is now Failed).
    ///
    /// Only ever called from a task's own execute path, so a paused task's
    /// clock is frozen by construction.
    pub(crate) fn advance_tick(&mut self) -> bool {
        self.execution_ticks += 1;
        let idle = self.ticks_since_progress();
        if idle > self.timeout_ticks {
            self.fail(TaskFailure::Timeout {
                idle_ticks: idle,
                limit: self.timeout_ticks,
            });
            return false;
        }
        true
    }

    /// Return to Pending with all per-attempt state cleared: tick counters,
    /// failure reason. Identity, priority, timeout, and retry budget are
    /// configuration and survive.
    pub(crate) fn reset(&mut self) {
        self.state = TaskState::Pending;
        self.failure = None;
        self.execution_ticks = 0;
        self.last_progress_tick = 0;
    }

    fn transition(&mut self, to: TaskState) -> bool {
        let from = self.state;
        if !from.allows(to) {
            warn!(id = %self.id, ?from, ?to, "ignoring invalid state transition");
            return false;
        }
        self.state = to;
        true
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

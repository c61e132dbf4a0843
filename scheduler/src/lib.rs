//! Tick-driven cooperative task scheduler for automation agents.
//!
//! The host owns the clock: it calls [`TaskExecutor::on_game_tick`] once
//! per tick and the scheduler advances at most one task by one small step.
//! The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure scheduling logic (state machines, combinators,
//!   timeouts). No I/O, fully testable in isolation.
//! - **Seams**: the host environment enters only through the
//!   [`TaskContext`](context::TaskContext) and provider traits, so tests
//!   drive the scheduler with plain structs.
//!
//! [`TaskExecutor`] coordinates the current task, the priority queue, and
//! the pause stack that makes preemption reversible.

pub mod config;
pub mod context;
pub mod core;
pub mod executor;
pub mod logging;
pub mod providers;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use config::{SchedulerConfig, load_config, write_config};
pub use context::{TaskContext, TickEvent};
pub use crate::core::{
    ChildFailure, CompletionHandle, CompositeTask, Lifecycle, PendingOperation, PendingStatus,
    StopCondition, Task, TaskFailure, TaskId, TaskPriority, TaskState, WaitForCondition,
};
pub use executor::{ExecutorStatus, QueueFull, TaskExecutor, TaskStatus};
pub use providers::{BehavioralProvider, EmergencyProvider};

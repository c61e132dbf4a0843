//! Pure scheduling logic: task state machines, combinators, and the
//! building blocks they share. Nothing in here touches the host runtime
//! directly; all environment access goes through the context and provider
//! seams.

pub mod composite;
pub mod condition;
pub mod lifecycle;
pub mod pending;
pub mod priority;
pub mod state;
pub mod task;
pub mod wait;

pub use composite::{ChildFailure, CompositeTask};
pub use condition::StopCondition;
pub use lifecycle::{DEFAULT_TIMEOUT_TICKS, Lifecycle, TaskFailure, TaskId};
pub use pending::{CompletionHandle, PendingOperation, PendingStatus};
pub use priority::TaskPriority;
pub use state::TaskState;
pub use task::Task;
pub use wait::WaitForCondition;

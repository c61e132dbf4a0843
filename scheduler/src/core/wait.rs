//! A task that completes once a context condition holds.

use tracing::debug;

use crate::core::condition::StopCondition;
use crate::core::lifecycle::Lifecycle;
use crate::core::priority::TaskPriority;
use crate::core::task::Task;

/// Waits, one tick at a time, for a condition on the host context.
///
/// Completes on the first tick the condition holds. An optional early-exit
/// condition also completes the task (successfully) so a wait embedded in a
/// sequence can stand down when it no longer matters. The usual inactivity
/// timeout bounds the wait; a condition that never comes true fails the
/// task with a timeout.
pub struct WaitForCondition<C> {
    lifecycle: Lifecycle,
    description: String,
    condition: Box<dyn StopCondition<C>>,
    early_exit: Option<Box<dyn StopCondition<C>>>,
}

impl<C> WaitForCondition<C> {
    pub fn new(description: impl Into<String>, condition: impl StopCondition<C> + 'static) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            description: description.into(),
            condition: Box::new(condition),
            early_exit: None,
        }
    }

    /// Also complete (without the awaited condition) once `condition` holds.
    pub fn with_early_exit(mut self, condition: impl StopCondition<C> + 'static) -> Self {
        self.early_exit = Some(Box::new(condition));
        self
    }

    /// Bound the wait; defaults to the standard inactivity timeout.
    pub fn with_timeout_ticks(mut self, ticks: u32) -> Self {
        self.lifecycle = self.lifecycle.with_timeout_ticks(ticks);
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.lifecycle = self.lifecycle.with_priority(priority);
        self
    }
}

impl<C> Task<C> for WaitForCondition<C> {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn can_execute(&self, _ctx: &C) -> bool {
        true
    }

    fn step(&mut self, ctx: &mut C) {
        if self.condition.is_met(ctx) {
            self.lifecycle.complete();
            return;
        }
        if let Some(early) = &self.early_exit
            && early.is_met(ctx)
        {
            debug!(id = %self.lifecycle.id(), description = %self.description, "wait ended early");
            self.lifecycle.complete();
        }
    }
}

//! The task seam: one cooperative unit of work.

use tracing::{error, trace};

use crate::core::lifecycle::Lifecycle;
use crate::core::state::TaskState;

/// A cooperative unit of work advanced one small step per tick.
///
/// Implementations embed a [`Lifecycle`] and put all per-tick work in
/// [`step`](Task::step). The provided [`execute`](Task::execute) drive wraps
/// each step with the precondition check, the `Pending → Running`
/// transition, and the inactivity timeout. Steps must stay small: the
/// scheduler runs on the host's tick thread and anything long blocks every
/// tick behind it.
pub trait Task<C> {
    fn lifecycle(&self) -> &Lifecycle;

    fn lifecycle_mut(&mut self) -> &mut Lifecycle;

    /// Short human-readable label used in logs and status snapshots.
    fn description(&self) -> &str;

    /// Whether the task's preconditions currently hold. Checked before
    /// every step, not just the first.
    fn can_execute(&self, ctx: &C) -> bool;

    /// Advance one increment of work. Call `self.lifecycle_mut().complete()`
    /// or `.fail(..)` when done, and `.record_progress()` whenever the step
    /// achieved something observable.
    fn step(&mut self, ctx: &mut C);

    /// Hook for clearing task-specific progress on a retry reset. The
    /// default does nothing.
    fn on_reset(&mut self) {}

    /// Drive one tick of this task. Called by the scheduler; composites
    /// call it on their children.
    fn execute(&mut self, ctx: &mut C) {
        let state = self.lifecycle().state();
        if state.is_terminal() {
            return;
        }
        if state == TaskState::Paused {
            // The scheduler never steps a paused task; reaching here means a
            // composite held onto a child the scheduler paused.
            error!(id = %self.lifecycle().id(), "refusing to step a paused task");
            debug_assert!(false, "execute called on a paused task");
            return;
        }

        let runnable = self.can_execute(ctx);
        if state == TaskState::Pending {
            if !runnable {
                trace!(
                    id = %self.lifecycle().id(),
                    description = self.description(),
                    "preconditions not met, staying pending"
                );
                return;
            }
            self.lifecycle_mut().start();
        }

        // The timeout clock runs even on skipped steps: a task whose
        // precondition never holds again must eventually fail rather than
        // occupy the slot forever.
        if !self.lifecycle_mut().advance_tick() {
            return;
        }
        if !runnable {
            trace!(
                id = %self.lifecycle().id(),
                description = self.description(),
                "preconditions lapsed, skipping step"
            );
            return;
        }
        self.step(ctx);
    }

    /// Reset this task to `Pending` for another attempt, clearing both the
    /// lifecycle and any task-specific progress.
    fn reset_for_retry(&mut self) {
        self.lifecycle_mut().reset();
        self.on_reset();
    }
}

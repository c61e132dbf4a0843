//! Provider seams consulted by the scheduler at tick time.

use crate::core::task::Task;

/// Source of safety-interrupt tasks, consulted at the top of every tick
/// (unless an urgent task is already live).
///
/// Returning `Some` hands the scheduler a fresh task to run at the urgent
/// tier; the provider should keep returning `Some` only while the hazard it
/// watches is actually present, since a live urgent task suppresses further
/// checks until it finishes.
pub trait EmergencyProvider<C> {
    fn check(&mut self, ctx: &C) -> Option<Box<dyn Task<C>>>;
}

/// Source of scheduled natural-behavior tasks (breaks, idling), consulted
/// only when the scheduler is at a safe point for an interruption.
pub trait BehavioralProvider<C> {
    fn scheduled_break(&mut self, ctx: &C) -> Option<Box<dyn Task<C>>>;
}

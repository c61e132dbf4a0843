//! The host seam: what the scheduler needs to know about its environment.

/// Host environment handle threaded through every task step.
///
/// The scheduler is generic over the concrete context; it only relies on
/// the two signals below. Everything else (world queries, action APIs) is
/// between the host and its task implementations.
pub trait TaskContext {
    /// Whether the controlled session is in a state where tasks can act.
    /// While false the scheduler idles without ticking any task.
    fn is_logged_in(&self) -> bool;

    /// Whether the host has asked for the current task to be abandoned.
    /// Checked once per tick; the current task fails with an abort reason.
    fn is_abort_requested(&self) -> bool;
}

/// Opaque per-tick token handed to [`TaskExecutor::on_game_tick`].
///
/// Carries only a sequence number for log correlation; tasks never see it.
///
/// [`TaskExecutor::on_game_tick`]: crate::executor::TaskExecutor::on_game_tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickEvent {
    pub seq: u64,
}

impl TickEvent {
    pub fn new(seq: u64) -> Self {
        Self { seq }
    }
}

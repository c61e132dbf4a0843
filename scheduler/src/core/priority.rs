//! Priority tiers governing queue placement and preemption.

use serde::{Deserialize, Serialize};

/// Priority tier of a task.
///
/// Totally ordered: `Urgent > Behavioral > Normal`. The pending queue pops
/// higher tiers first (FIFO within a tier), and a task may only be preempted
/// by a strictly higher tier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Baseline plan work.
    Normal,
    /// Scheduled natural-behavior interruptions (breaks, idling).
    Behavioral,
    /// Safety interruptions requiring immediate handling.
    Urgent,
}

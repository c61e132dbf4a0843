//! Sequence and loop combinators over boxed tasks.

use tracing::{debug, warn};

use crate::core::condition::StopCondition;
use crate::core::lifecycle::{Lifecycle, TaskFailure};
use crate::core::priority::TaskPriority;
use crate::core::state::TaskState;
use crate::core::task::Task;

/// What a loop does when its child fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChildFailure {
    /// Fail the loop, preserving the child's failure in the summary.
    #[default]
    Propagate,
    /// Reset the child and try again; the failed run does not count as an
    /// iteration.
    Restart,
}

enum Mode<C> {
    Sequence {
        children: Vec<Box<dyn Task<C>>>,
        index: usize,
    },
    Loop {
        child: Box<dyn Task<C>>,
        stop: Option<Box<dyn StopCondition<C>>>,
        max_iterations: Option<u32>,
        iterations: u32,
        on_child_failure: ChildFailure,
    },
}

/// A task built from other tasks: either a sequence run once in order, or a
/// single child repeated until a stop condition or iteration cap.
///
/// The composite presents a single [`Lifecycle`] to the scheduler; children
/// are an internal matter. Each tick drives exactly one child step, so a
/// composite is as cooperative as its leaves.
pub struct CompositeTask<C> {
    lifecycle: Lifecycle,
    description: String,
    mode: Mode<C>,
}

impl<C> CompositeTask<C> {
    /// Run `children` in order, completing after the last one completes.
    pub fn sequence(children: Vec<Box<dyn Task<C>>>) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            description: "sequence".to_owned(),
            mode: Mode::Sequence { children, index: 0 },
        }
    }

    /// Repeat `child` until a stop condition or iteration cap says
    /// otherwise. Without either bound the loop runs until the child fails
    /// or the composite times out.
    pub fn repeat(child: Box<dyn Task<C>>) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            description: "loop".to_owned(),
            mode: Mode::Loop {
                child,
                stop: None,
                max_iterations: None,
                iterations: 0,
                on_child_failure: ChildFailure::default(),
            },
        }
    }

    /// Stop the loop (successfully) once `condition` holds. Checked before
    /// each child step, so the loop can complete without running the child
    /// at all. Ignored by sequences.
    pub fn until_condition(mut self, condition: impl StopCondition<C> + 'static) -> Self {
        if let Mode::Loop { stop, .. } = &mut self.mode {
            *stop = Some(Box::new(condition));
        }
        self
    }

    /// Cap the number of completed child runs. Ignored by sequences.
    pub fn with_max_iterations(mut self, cap: u32) -> Self {
        if let Mode::Loop { max_iterations, .. } = &mut self.mode {
            *max_iterations = Some(cap);
        }
        self
    }

    /// Choose how the loop reacts to a child failure. Ignored by sequences.
    pub fn with_child_failure(mut self, policy: ChildFailure) -> Self {
        if let Mode::Loop {
            on_child_failure, ..
        } = &mut self.mode
        {
            *on_child_failure = policy;
        }
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.lifecycle = self.lifecycle.with_priority(priority);
        self
    }

    pub fn with_timeout_ticks(mut self, ticks: u32) -> Self {
        self.lifecycle = self.lifecycle.with_timeout_ticks(ticks);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.lifecycle = self.lifecycle.with_max_retries(retries);
        self
    }

    /// Completed child runs so far (loops only; always 0 for sequences).
    pub fn iterations(&self) -> u32 {
        match &self.mode {
            Mode::Loop { iterations, .. } => *iterations,
            Mode::Sequence { .. } => 0,
        }
    }
}

impl<C> Task<C> for CompositeTask<C> {
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
        match &self.mode {
            Mode::Sequence { children, .. } => {
                if children.is_empty() {
                    warn!(id = %self.lifecycle.id(), "sequence has no children");
                    return false;
                }
                true
            }
            Mode::Loop { .. } => true,
        }
    }

    fn step(&mut self, ctx: &mut C) {
        match &mut self.mode {
            Mode::Sequence { children, index } => {
                let Some(child) = children.get_mut(*index) else {
                    self.lifecycle.complete();
                    return;
                };
                child.execute(ctx);
                match child.lifecycle().state() {
                    TaskState::Completed => {
                        debug!(
                            id = %self.lifecycle.id(),
                            child = child.description(),
                            position = *index,
                            "sequence child completed"
                        );
                        self.lifecycle.record_progress();
                        *index += 1;
                        if *index == children.len() {
                            self.lifecycle.complete();
                        }
                    }
                    TaskState::Failed => {
                        let summary = format!("child task failed: {}", child.description());
                        self.lifecycle.fail(TaskFailure::message(summary));
                    }
                    _ => {}
                }
            }
            Mode::Loop {
                child,
                stop,
                max_iterations,
                iterations,
                on_child_failure,
            } => {
                if let Some(cap) = *max_iterations
                    && *iterations >= cap
                {
                    self.lifecycle.complete();
                    return;
                }
                if let Some(stop) = stop
                    && stop.is_met(ctx)
                {
                    self.lifecycle.complete();
                    return;
                }
                child.execute(ctx);
                match child.lifecycle().state() {
                    TaskState::Completed => {
                        *iterations += 1;
                        debug!(
                            id = %self.lifecycle.id(),
                            child = child.description(),
                            iterations = *iterations,
                            "loop iteration completed"
                        );
                        self.lifecycle.record_progress();
                        // The cap and stop condition get a look before the
                        // next run starts; reset now so the child is fresh
                        // if one is due.
                        child.reset_for_retry();
                    }
                    TaskState::Failed => match on_child_failure {
                        ChildFailure::Propagate => {
                            let summary = format!("child task failed: {}", child.description());
                            self.lifecycle.fail(TaskFailure::message(summary));
                        }
                        ChildFailure::Restart => {
                            debug!(
                                id = %self.lifecycle.id(),
                                child = child.description(),
                                "restarting failed loop child"
                            );
                            child.reset_for_retry();
                        }
                    },
                    _ => {}
                }
            }
        }
    }

    fn on_reset(&mut self) {
        match &mut self.mode {
            Mode::Sequence { children, index } => {
                *index = 0;
                for child in children.iter_mut() {
                    child.reset_for_retry();
                }
            }
            Mode::Loop {
                child, iterations, ..
            } => {
                *iterations = 0;
                child.reset_for_retry();
            }
        }
    }
}

//! The tick-driven scheduler.
//!
//! One [`TaskExecutor`] owns the current task, a priority-ordered pending
//! queue, and the pause stack. The host calls
//! [`on_game_tick`](TaskExecutor::on_game_tick) once per tick; at most one
//! task advances one step per call. Preemption works through the pause
//! stack: a higher-tier arrival pauses the current task and pushes it, and
//! interrupted tasks unwind in LIFO order as the interrupters finish.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::config::SchedulerConfig;
use crate::context::{TaskContext, TickEvent};
use crate::core::lifecycle::{TaskFailure, TaskId};
use crate::core::priority::TaskPriority;
use crate::core::state::TaskState;
use crate::core::task::Task;
use crate::providers::{BehavioralProvider, EmergencyProvider};

/// Rejected submission: the pending queue is at capacity. Carries the task
/// back so the caller can shed load its own way.
pub struct QueueFull<C>(pub Box<dyn Task<C>>);

impl<C> fmt::Debug for QueueFull<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("QueueFull").field(&self.0.description()).finish()
    }
}

impl<C> fmt::Display for QueueFull<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pending queue full, rejected task: {}", self.0.description())
    }
}

impl<C> std::error::Error for QueueFull<C> {}

struct QueuedTask<C> {
    priority: TaskPriority,
    sequence: u64,
    task: Box<dyn Task<C>>,
}

impl<C> PartialEq for QueuedTask<C> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}

impl<C> Eq for QueuedTask<C> {}

impl<C> PartialOrd for QueuedTask<C> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<C> Ord for QueuedTask<C> {
    /// Max-heap key: higher tier first, then earlier submission.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.priority, Reverse(self.sequence)).cmp(&(other.priority, Reverse(other.sequence)))
    }
}

struct PausedEntry<C> {
    task: Box<dyn Task<C>>,
    /// Tier of the task that displaced this one.
    interrupted_by: TaskPriority,
    /// Retry attempts already spent on this task, restored on resume.
    retries_used: u32,
}

/// Point-in-time snapshot of what the scheduler is doing, for status
/// surfaces and logs.
#[derive(Debug, Serialize)]
pub struct ExecutorStatus {
    pub started: bool,
    pub current: Option<TaskStatus>,
    pub queued: usize,
    pub paused: usize,
}

#[derive(Debug, Serialize)]
pub struct TaskStatus {
    pub id: TaskId,
    pub description: String,
    pub state: TaskState,
    pub priority: TaskPriority,
}

/// Cooperative task scheduler driven by host ticks.
pub struct TaskExecutor<C> {
    started: bool,
    current: Option<Box<dyn Task<C>>>,
    pending: BinaryHeap<QueuedTask<C>>,
    sequence: u64,
    pause_stack: Vec<PausedEntry<C>>,
    emergency: Option<Box<dyn EmergencyProvider<C>>>,
    behavioral: Option<Box<dyn BehavioralProvider<C>>>,
    idle: Option<Box<dyn FnMut(&C) -> Option<Box<dyn Task<C>>>>>,
    /// Host-signalled safe point for behavioral interruptions. Defaults to
    /// true and is only ever changed by the host.
    current_step_complete: bool,
    /// Retry attempts spent on the current slot's task.
    retry_count: u32,
    max_queue_len: usize,
}

impl<C> TaskExecutor<C> {
    pub fn new() -> Self {
        Self::with_config(&SchedulerConfig::default())
    }

    pub fn with_config(config: &SchedulerConfig) -> Self {
        Self {
            started: false,
            current: None,
            pending: BinaryHeap::new(),
            sequence: 0,
            pause_stack: Vec::new(),
            emergency: None,
            behavioral: None,
            idle: None,
            current_step_complete: true,
            retry_count: 0,
            max_queue_len: config.max_queue_len,
        }
    }

    pub fn set_emergency_provider(&mut self, provider: impl EmergencyProvider<C> + 'static) {
        self.emergency = Some(Box::new(provider));
    }

    pub fn set_behavioral_provider(&mut self, provider: impl BehavioralProvider<C> + 'static) {
        self.behavioral = Some(Box::new(provider));
    }

    /// Fallback task source consulted when the slot, pause stack, and queue
    /// are all empty. Idle tasks run at the normal tier.
    pub fn set_idle_provider(
        &mut self,
        provider: impl FnMut(&C) -> Option<Box<dyn Task<C>>> + 'static,
    ) {
        self.idle = Some(Box::new(provider));
    }

    pub fn start(&mut self) {
        if !self.started {
            info!("task executor started");
            self.started = true;
        }
    }

    /// Stop ticking. The current task and everything on the pause stack are
    /// failed as aborted; queued tasks stay queued for a later start.
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        info!("task executor stopped");
        self.started = false;
        if let Some(mut cur) = self.current.take() {
            cur.lifecycle_mut()
                .fail(TaskFailure::Aborted("executor stopped".to_owned()));
        }
        for mut entry in self.pause_stack.drain(..) {
            entry
                .task
                .lifecycle_mut()
                .fail(TaskFailure::Aborted("executor stopped".to_owned()));
        }
        self.retry_count = 0;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Submit a task at the priority its lifecycle already carries.
    pub fn queue_task(&mut self, task: Box<dyn Task<C>>) -> Result<(), QueueFull<C>> {
        let priority = task.lifecycle().priority();
        self.enqueue(task, priority)
    }

    /// Submit a task at an explicit priority, overriding the lifecycle's.
    pub fn queue_task_with_priority(
        &mut self,
        task: Box<dyn Task<C>>,
        priority: TaskPriority,
    ) -> Result<(), QueueFull<C>> {
        self.enqueue(task, priority)
    }

    fn enqueue(
        &mut self,
        mut task: Box<dyn Task<C>>,
        priority: TaskPriority,
    ) -> Result<(), QueueFull<C>> {
        if self.pending.len() >= self.max_queue_len {
            warn!(
                capacity = self.max_queue_len,
                description = task.description(),
                "pending queue full, rejecting task"
            );
            return Err(QueueFull(task));
        }
        task.lifecycle_mut().set_priority(priority);
        self.sequence += 1;
        debug!(
            id = %task.lifecycle().id(),
            description = task.description(),
            ?priority,
            "task queued"
        );
        self.pending.push(QueuedTask {
            priority,
            sequence: self.sequence,
            task,
        });
        Ok(())
    }

    pub fn clear_queue(&mut self) {
        let dropped = self.pending.len();
        if dropped > 0 {
            debug!(dropped, "pending queue cleared");
        }
        self.pending.clear();
    }

    pub fn queue_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pause_stack_depth(&self) -> usize {
        self.pause_stack.len()
    }

    pub fn current_task(&self) -> Option<&dyn Task<C>> {
        self.current.as_deref()
    }

    /// Paused tasks, oldest interruption first.
    pub fn paused_tasks(&self) -> impl Iterator<Item = &dyn Task<C>> {
        self.pause_stack.iter().map(|entry| entry.task.as_ref())
    }

    /// Queued tasks in no particular order.
    pub fn pending_tasks(&self) -> impl Iterator<Item = &dyn Task<C>> {
        self.pending.iter().map(|queued| queued.task.as_ref())
    }

    /// Signal whether the current task sits at a point where a behavioral
    /// interruption is acceptable. Defaults to true; the scheduler never
    /// changes it, only the host does.
    pub fn set_current_step_complete(&mut self, complete: bool) {
        self.current_step_complete = complete;
    }

    pub fn status(&self) -> ExecutorStatus {
        ExecutorStatus {
            started: self.started,
            current: self.current.as_ref().map(|task| {
                let lc = task.lifecycle();
                TaskStatus {
                    id: lc.id(),
                    description: task.description().to_owned(),
                    state: lc.state(),
                    priority: lc.priority(),
                }
            }),
            queued: self.pending.len(),
            paused: self.pause_stack.len(),
        }
    }
}

impl<C: TaskContext> TaskExecutor<C> {
    /// Advance the scheduler by one tick.
    ///
    /// Order within a tick: abort check, emergency provider, behavioral
    /// provider, slot refill (retry, pause stack, queue, idle provider),
    /// then at most one task step. A task installed by preemption or popped
    /// from the queue steps on the same tick; a task resumed from the pause
    /// stack steps on the next one, so resumption itself consumes the tick.
    pub fn on_game_tick(&mut self, ctx: &mut C, event: &TickEvent) {
        if !self.started {
            return;
        }
        if !ctx.is_logged_in() {
            trace!(tick = event.seq, "not logged in, skipping tick");
            return;
        }
        if ctx.is_abort_requested()
            && let Some(cur) = &mut self.current
            && !cur.lifecycle().state().is_terminal()
        {
            warn!(tick = event.seq, id = %cur.lifecycle().id(), "abort requested");
            cur.lifecycle_mut()
                .fail(TaskFailure::Aborted("abort requested".to_owned()));
        }

        // Safety interrupts outrank everything, but a live urgent task is
        // left to finish before the provider is asked again.
        let urgent_live = self.current.as_ref().is_some_and(|task| {
            let lc = task.lifecycle();
            lc.priority() == TaskPriority::Urgent && !lc.state().is_terminal()
        });
        if !urgent_live
            && let Some(provider) = &mut self.emergency
            && let Some(candidate) = provider.check(ctx)
        {
            self.switch_to(candidate, TaskPriority::Urgent, event);
        }

        // Behavioral interruptions wait for a safe point: a normal-tier
        // task whose host marked the current step complete, or a slot whose
        // next occupant would be normal work or idleness. They never cut
        // into live behavioral or urgent work, and never jump ahead of a
        // paused behavioral or urgent task waiting to resume.
        let slot_safe = match &self.current {
            Some(task) if !task.lifecycle().state().is_terminal() => {
                task.lifecycle().priority() == TaskPriority::Normal && self.current_step_complete
            }
            _ => self
                .pause_stack
                .last()
                .is_none_or(|entry| entry.task.lifecycle().priority() == TaskPriority::Normal),
        };
        if slot_safe
            && let Some(provider) = &mut self.behavioral
            && let Some(candidate) = provider.scheduled_break(ctx)
        {
            self.switch_to(candidate, TaskPriority::Behavioral, event);
        }

        if self
            .current
            .as_ref()
            .is_some_and(|task| task.lifecycle().state().is_terminal())
        {
            self.settle_terminal_current(event);
        }

        let mut resumed_this_tick = false;
        if self.current.is_none() {
            if let Some(entry) = self.pause_stack.pop() {
                let mut task = entry.task;
                task.lifecycle_mut().resume();
                info!(
                    tick = event.seq,
                    id = %task.lifecycle().id(),
                    description = task.description(),
                    interrupted_by = ?entry.interrupted_by,
                    "resuming interrupted task"
                );
                self.retry_count = entry.retries_used;
                self.current = Some(task);
                resumed_this_tick = true;
            } else if let Some(queued) = self.pending.pop() {
                debug!(
                    tick = event.seq,
                    id = %queued.task.lifecycle().id(),
                    description = queued.task.description(),
                    priority = ?queued.priority,
                    "dequeued next task"
                );
                self.retry_count = 0;
                self.current = Some(queued.task);
            } else if let Some(provider) = &mut self.idle
                && let Some(task) = provider(ctx)
            {
                debug!(
                    tick = event.seq,
                    description = task.description(),
                    "installing idle task"
                );
                self.retry_count = 0;
                self.current = Some(task);
            }
        }

        if !resumed_this_tick
            && let Some(cur) = &mut self.current
        {
            cur.execute(ctx);
        }
    }

    /// Install `candidate` at `tier`, displacing the current task. A live
    /// current task is paused onto the stack; a failed one with retry
    /// budget left is reset and stacked so the budget survives the
    /// interruption; anything else is finalized. The candidate steps on
    /// this same tick.
    fn switch_to(&mut self, mut candidate: Box<dyn Task<C>>, tier: TaskPriority, event: &TickEvent) {
        candidate.lifecycle_mut().set_priority(tier);
        if let Some(mut cur) = self.current.take() {
            let state = cur.lifecycle().state();
            if !state.is_terminal() {
                cur.lifecycle_mut().pause();
                debug!(
                    tick = event.seq,
                    id = %cur.lifecycle().id(),
                    description = cur.description(),
                    interrupted_by = ?tier,
                    "pausing current task"
                );
                self.pause_stack.push(PausedEntry {
                    task: cur,
                    interrupted_by: tier,
                    retries_used: self.retry_count,
                });
            } else if self.failed_with_retry_budget(cur.as_ref()) {
                let retries_used = self.retry_count + 1;
                cur.reset_for_retry();
                debug!(
                    tick = event.seq,
                    id = %cur.lifecycle().id(),
                    attempt = retries_used,
                    "stacking failed task for retry after interruption"
                );
                self.pause_stack.push(PausedEntry {
                    task: cur,
                    interrupted_by: tier,
                    retries_used,
                });
            } else {
                self.finalize(cur.as_ref(), event);
            }
        }
        info!(
            tick = event.seq,
            id = %candidate.lifecycle().id(),
            description = candidate.description(),
            priority = ?tier,
            "switching to interrupting task"
        );
        self.retry_count = 0;
        self.current = Some(candidate);
    }

    /// The current task finished on an earlier tick; either reset it for an
    /// in-place retry or finalize it and free the slot.
    fn settle_terminal_current(&mut self, event: &TickEvent) {
        let Some(mut cur) = self.current.take() else {
            return;
        };
        if self.failed_with_retry_budget(cur.as_ref()) {
            self.retry_count += 1;
            warn!(
                tick = event.seq,
                id = %cur.lifecycle().id(),
                description = cur.description(),
                attempt = self.retry_count,
                max = cur.lifecycle().max_retries(),
                "retrying failed task"
            );
            cur.reset_for_retry();
            self.current = Some(cur);
        } else {
            self.finalize(cur.as_ref(), event);
            self.retry_count = 0;
        }
    }

    /// Failed, not aborted, and retry budget remains.
    fn failed_with_retry_budget(&self, task: &dyn Task<C>) -> bool {
        let lc = task.lifecycle();
        lc.state() == TaskState::Failed
            && !matches!(lc.failure(), Some(TaskFailure::Aborted(_)))
            && self.retry_count < lc.max_retries()
    }

    fn finalize(&self, task: &dyn Task<C>, event: &TickEvent) {
        let lc = task.lifecycle();
        match lc.state() {
            TaskState::Completed => info!(
                tick = event.seq,
                id = %lc.id(),
                description = task.description(),
                ticks = lc.execution_ticks(),
                "task finished"
            ),
            TaskState::Failed => warn!(
                tick = event.seq,
                id = %lc.id(),
                description = task.description(),
                reason = %lc.failure().map_or_else(String::new, ToString::to_string),
                "task failed"
            ),
            other => debug!(tick = event.seq, id = %lc.id(), state = ?other, "dropping task"),
        }
    }
}

impl<C> Default for TaskExecutor<C> {
    fn default() -> Self {
        Self::new()
    }
}

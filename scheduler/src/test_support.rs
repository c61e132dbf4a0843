//! Test-only context, tasks, and providers for exercising the scheduler.

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::context::TaskContext;
use crate::core::lifecycle::{Lifecycle, TaskFailure};
use crate::core::priority::TaskPriority;
use crate::core::task::Task;
use crate::providers::{BehavioralProvider, EmergencyProvider};

/// Minimal host context with directly settable signals.
#[derive(Debug)]
pub struct TestContext {
    logged_in: bool,
    abort_requested: bool,
    flag: bool,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            logged_in: true,
            abort_requested: false,
            flag: false,
        }
    }

    pub fn set_logged_in(&mut self, logged_in: bool) {
        self.logged_in = logged_in;
    }

    pub fn set_abort_requested(&mut self, abort: bool) {
        self.abort_requested = abort;
    }

    /// Free-form boolean used as a precondition or stop condition target.
    pub fn flag(&self) -> bool {
        self.flag
    }

    pub fn set_flag(&mut self, flag: bool) {
        self.flag = flag;
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskContext for TestContext {
    fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    fn is_abort_requested(&self) -> bool {
        self.abort_requested
    }
}

/// Deterministic task that completes after a fixed number of steps, with
/// optional scripted failure and an optional shared step counter.
pub struct StepTask {
    lifecycle: Lifecycle,
    name: String,
    steps_needed: u32,
    steps_done: u32,
    /// Attempts begun before the current one; survives resets.
    attempts: u32,
    fail_at: Option<u32>,
    fail_once: bool,
    gated_on_flag: bool,
    probe: Option<Rc<Cell<u32>>>,
}

impl StepTask {
    pub fn new(name: &str, steps_needed: u32) -> Self {
        Self {
            lifecycle: Lifecycle::new(),
            name: name.to_string(),
            steps_needed,
            steps_done: 0,
            attempts: 0,
            fail_at: None,
            fail_once: false,
            gated_on_flag: false,
            probe: None,
        }
    }

    /// Fail (on every attempt) when the given 1-based step is reached.
    pub fn failing_at(mut self, step: u32) -> Self {
        self.fail_at = Some(step);
        self.fail_once = false;
        self
    }

    /// Fail at the given step on the first attempt only.
    pub fn failing_once_at(mut self, step: u32) -> Self {
        self.fail_at = Some(step);
        self.fail_once = true;
        self
    }

    /// Gate `can_execute` on [`TestContext::flag`].
    pub fn gated_on_flag(mut self) -> Self {
        self.gated_on_flag = true;
        self
    }

    /// Count every executed step into a shared cell. The count accumulates
    /// across resets.
    pub fn with_probe(mut self, probe: Rc<Cell<u32>>) -> Self {
        self.probe = Some(probe);
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
}

impl Task<TestContext> for StepTask {
    fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    fn lifecycle_mut(&mut self) -> &mut Lifecycle {
        &mut self.lifecycle
    }

    fn description(&self) -> &str {
        &self.name
    }

    fn can_execute(&self, ctx: &TestContext) -> bool {
        !self.gated_on_flag || ctx.flag()
    }

    fn step(&mut self, _ctx: &mut TestContext) {
        let step_index = self.steps_done + 1;
        if let Some(fail_at) = self.fail_at
            && step_index == fail_at
            && (!self.fail_once || self.attempts == 0)
        {
            self.lifecycle
                .fail(TaskFailure::message(format!("scripted failure at step {fail_at}")));
            return;
        }
        self.steps_done = step_index;
        if let Some(probe) = &self.probe {
            probe.set(probe.get() + 1);
        }
        self.lifecycle.record_progress();
        if self.steps_done >= self.steps_needed {
            self.lifecycle.complete();
        }
    }

    fn on_reset(&mut self) {
        self.steps_done = 0;
        self.attempts += 1;
    }
}

/// Provider double serving a scripted sequence of tasks, one per consult.
pub struct ScriptedProvider {
    script: VecDeque<Box<dyn Task<TestContext>>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
        }
    }

    pub fn push(&mut self, task: Box<dyn Task<TestContext>>) {
        self.script.push_back(task);
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EmergencyProvider<TestContext> for ScriptedProvider {
    fn check(&mut self, _ctx: &TestContext) -> Option<Box<dyn Task<TestContext>>> {
        self.script.pop_front()
    }
}

impl BehavioralProvider<TestContext> for ScriptedProvider {
    fn scheduled_break(&mut self, _ctx: &TestContext) -> Option<Box<dyn Task<TestContext>>> {
        self.script.pop_front()
    }
}

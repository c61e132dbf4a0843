//! Scheduler-level tests for full preemption lifecycle scenarios.
//!
//! These tests drive `on_game_tick` across many ticks to verify end-to-end
//! behavior: tier preemption, LIFO unwinding of interrupted work, timeout
//! bookkeeping across pauses, and exact tick accounting.

use std::cell::Cell;
use std::rc::Rc;

use scheduler::test_support::{ScriptedProvider, StepTask, TestContext};
use scheduler::{
    CompositeTask, Task, TaskExecutor, TaskId, TaskPriority, TaskState, TickEvent,
    WaitForCondition,
};

struct Harness {
    exec: TaskExecutor<TestContext>,
    ctx: TestContext,
    seq: u64,
}

impl Harness {
    fn new() -> Self {
        let mut exec = TaskExecutor::new();
        exec.start();
        Self {
            exec,
            ctx: TestContext::new(),
            seq: 0,
        }
    }

    fn tick(&mut self) {
        self.seq += 1;
        let event = TickEvent::new(self.seq);
        self.exec.on_game_tick(&mut self.ctx, &event);
        self.assert_at_most_one_running();
    }

    fn ticks(&mut self, n: u32) {
        for _ in 0..n {
            self.tick();
        }
    }

    fn current_id(&self) -> TaskId {
        self.exec
            .current_task()
            .expect("a current task")
            .lifecycle()
            .id()
    }

    fn current_state(&self) -> TaskState {
        self.exec
            .current_task()
            .expect("a current task")
            .lifecycle()
            .state()
    }

    /// Samples every task the scheduler holds and checks the global
    /// single-RUNNING invariant.
    fn assert_at_most_one_running(&self) {
        let running = self
            .exec
            .current_task()
            .into_iter()
            .chain(self.exec.paused_tasks())
            .chain(self.exec.pending_tasks())
            .filter(|task| task.lifecycle().state() == TaskState::Running)
            .count();
        assert!(running <= 1, "found {running} RUNNING tasks");
    }
}

/// End-to-end tick accounting across a behavioral interruption.
///
/// Sequence:
/// 1. Tick 1: a 5-step normal task runs (1/5 done).
/// 2. Tick 2: a 3-step behavioral candidate preempts it at the safe point;
///    the normal task is paused and the break does its first step.
/// 3. Ticks 3-5: the break finishes and the normal task is resumed;
///    resumption consumes tick 5, so no plan step runs on it.
/// 4. Ticks 6-9: exactly 4 further ticks finish the plan (5 steps total,
///    the paused stretch cost it nothing beyond the resumption tick).
#[test]
fn behavioral_interruption_costs_only_the_resumption_tick() {
    let mut h = Harness::new();
    let plan_steps = Rc::new(Cell::new(0));
    let break_steps = Rc::new(Cell::new(0));

    h.exec
        .queue_task(Box::new(
            StepTask::new("plan", 5).with_probe(Rc::clone(&plan_steps)),
        ))
        .expect("queue");
    h.tick();
    assert_eq!(plan_steps.get(), 1);
    assert_eq!(h.current_state(), TaskState::Running);
    let plan_id = h.current_id();

    let mut breaks = ScriptedProvider::new();
    breaks.push(Box::new(
        StepTask::new("break", 3).with_probe(Rc::clone(&break_steps)),
    ));
    h.exec.set_behavioral_provider(breaks);

    h.tick();
    assert_eq!(h.exec.current_task().unwrap().description(), "break");
    assert_eq!(break_steps.get(), 1);
    let paused = h.exec.paused_tasks().next().expect("plan on the stack");
    assert_eq!(paused.lifecycle().id(), plan_id);
    assert_eq!(paused.lifecycle().state(), TaskState::Paused);

    h.ticks(3);
    assert_eq!(break_steps.get(), 3);
    assert_eq!(h.current_id(), plan_id);
    assert_eq!(h.current_state(), TaskState::Running);
    // Resumption consumed the third tick; no plan step ran on it.
    assert_eq!(plan_steps.get(), 1);

    h.ticks(3);
    assert_eq!(plan_steps.get(), 4);
    assert_eq!(h.current_state(), TaskState::Running);

    h.tick();
    assert_eq!(plan_steps.get(), 5);
    assert_eq!(h.current_state(), TaskState::Completed);
}

/// Nested preemption unwinds in strict LIFO order: urgent over behavioral
/// over normal, verified by task identity at each stage. A live behavioral
/// task is never re-preempted by another behavioral candidate while the
/// normal task waits beneath it.
#[test]
fn nested_interruptions_unwind_lifo() {
    let mut h = Harness::new();

    h.exec
        .queue_task(Box::new(StepTask::new("plan", 10)))
        .expect("queue");
    h.tick();
    let plan_id = h.current_id();

    let mut breaks = ScriptedProvider::new();
    breaks.push(Box::new(StepTask::new("break", 3)));
    breaks.push(Box::new(StepTask::new("second-break", 1)));
    h.exec.set_behavioral_provider(breaks);

    h.tick();
    let break_id = h.current_id();
    assert_ne!(break_id, plan_id);
    assert_eq!(h.exec.pause_stack_depth(), 1);

    let mut emergencies = ScriptedProvider::new();
    emergencies.push(Box::new(StepTask::new("hazard", 2)));
    h.exec.set_emergency_provider(emergencies);

    h.tick();
    let hazard_id = h.current_id();
    assert_eq!(
        h.exec.current_task().unwrap().lifecycle().priority(),
        TaskPriority::Urgent
    );
    assert_eq!(h.exec.pause_stack_depth(), 2);

    // Hazard finishes; the break (not the plan) resumes.
    h.ticks(2);
    assert_eq!(h.current_id(), break_id);
    assert_ne!(h.current_id(), hazard_id);
    assert_eq!(h.exec.pause_stack_depth(), 1);

    // The resumed break runs to completion undisturbed: the scripted
    // second break must not re-preempt it while the plan still waits
    // beneath it on the stack.
    h.ticks(2);
    assert_eq!(h.current_id(), break_id);
    assert_eq!(h.current_state(), TaskState::Completed);
    assert_eq!(h.exec.pause_stack_depth(), 1);

    // With the break finished, the slot about to be refilled belongs to
    // normal work, so the second break may now cut ahead of the plan.
    h.tick();
    assert_eq!(h.exec.current_task().unwrap().description(), "second-break");
    assert_eq!(h.current_state(), TaskState::Completed);

    h.tick();
    assert_eq!(h.current_id(), plan_id);
    assert_eq!(h.current_state(), TaskState::Running);
    assert_eq!(h.exec.pause_stack_depth(), 0);
}

/// A paused task's timeout clock is frozen: a long interruption must not
/// count against the paused task's inactivity budget.
#[test]
fn pause_freezes_the_timeout_clock() {
    let mut h = Harness::new();

    // Never progresses on its own; budget of 5 executed ticks.
    h.exec
        .queue_task(Box::new(
            WaitForCondition::new("await flag", |ctx: &TestContext| ctx.flag())
                .with_timeout_ticks(5),
        ))
        .expect("queue");
    let wait_steps = 3;
    h.ticks(wait_steps);
    let wait_id = h.current_id();
    assert_eq!(h.current_state(), TaskState::Running);

    // A 10-step break holds the wait paused for far longer than its
    // remaining budget.
    let mut breaks = ScriptedProvider::new();
    breaks.push(Box::new(StepTask::new("break", 10)));
    h.exec.set_behavioral_provider(breaks);
    h.ticks(10); // break steps 1..10
    h.tick(); // resumption tick for the wait
    assert_eq!(h.current_id(), wait_id);

    h.tick(); // 4th executed tick of the wait
    assert_eq!(h.current_state(), TaskState::Running);

    h.ctx.set_flag(true);
    h.tick(); // 5th executed tick: condition observed, still within budget
    assert_eq!(h.current_id(), wait_id);
    assert_eq!(h.current_state(), TaskState::Completed);
    assert!(h.exec.current_task().unwrap().lifecycle().failure().is_none());
}

/// A task whose precondition is false sits in the slot as PENDING without
/// burning its budget, then starts normally once the precondition holds.
#[test]
fn gated_task_stays_pending_until_preconditions_hold() {
    let mut h = Harness::new();

    h.exec
        .queue_task(Box::new(StepTask::new("gated", 2).gated_on_flag()))
        .expect("queue");

    h.ticks(3);
    assert_eq!(h.current_state(), TaskState::Pending);
    assert_eq!(h.exec.current_task().unwrap().lifecycle().execution_ticks(), 0);

    h.ctx.set_flag(true);
    h.tick();
    assert_eq!(h.current_state(), TaskState::Running);
    h.tick();
    assert_eq!(h.current_state(), TaskState::Completed);
}

/// Composite tasks schedule like any other: a capped loop queued at the
/// normal tier runs its child the exact number of times and survives an
/// urgent interruption mid-loop.
#[test]
fn capped_loop_survives_an_urgent_interruption() {
    let mut h = Harness::new();
    let unit_steps = Rc::new(Cell::new(0));

    let looped = CompositeTask::repeat(Box::new(
        StepTask::new("unit", 2).with_probe(Rc::clone(&unit_steps)),
    ))
    .with_max_iterations(3)
    .with_description("gather loop");
    h.exec.queue_task(Box::new(looped)).expect("queue");

    h.ticks(3); // one iteration done, second underway
    assert_eq!(unit_steps.get(), 3);
    let loop_id = h.current_id();

    let mut emergencies = ScriptedProvider::new();
    emergencies.push(Box::new(StepTask::new("hazard", 1)));
    h.exec.set_emergency_provider(emergencies);
    h.tick(); // hazard preempts and completes
    h.tick(); // finalize hazard, resume the loop
    assert_eq!(h.current_id(), loop_id);
    assert_eq!(unit_steps.get(), 3);

    // 3 ticks finish the remaining child work, one more notices the cap.
    h.ticks(4);
    assert_eq!(unit_steps.get(), 6);
    assert_eq!(h.current_state(), TaskState::Completed);
}

/// An armed scheduler with no tasks and no providers just idles; absent
/// collaborators mean "no candidate, ever", not an error.
#[test]
fn empty_scheduler_ticks_are_noops() {
    let mut h = Harness::new();
    h.ticks(25);
    assert!(h.exec.current_task().is_none());
    assert_eq!(h.exec.queue_len(), 0);
    assert_eq!(h.exec.pause_stack_depth(), 0);
}

/// A failed normal task is logged and dropped; the next queued task runs on
/// the following tick rather than the scheduler halting.
#[test]
fn failure_moves_on_to_the_next_queued_task() {
    let mut h = Harness::new();

    h.exec
        .queue_task(Box::new(StepTask::new("doomed", 5).failing_at(2)))
        .expect("queue");
    h.exec
        .queue_task(Box::new(StepTask::new("next", 1)))
        .expect("queue");

    h.ticks(2);
    assert_eq!(h.current_state(), TaskState::Failed);
    let reason = h
        .exec
        .current_task()
        .unwrap()
        .lifecycle()
        .failure()
        .expect("reason recorded")
        .to_string();
    assert!(reason.contains("scripted failure"));

    h.tick();
    assert_eq!(h.exec.current_task().unwrap().description(), "next");
    assert_eq!(h.current_state(), TaskState::Completed);
}

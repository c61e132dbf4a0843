//! One-shot bridge for work finishing off the tick thread.
//!
//! A task that hands work to a background worker still has to return from
//! its step immediately. [`PendingOperation`] holds the receiving half of a
//! single-use channel; the task polls it on later ticks and the worker
//! resolves the [`CompletionHandle`] whenever it finishes.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

/// Result of polling a [`PendingOperation`] on a tick.
#[derive(Debug, PartialEq, Eq)]
pub enum PendingStatus<T> {
    /// Nothing was started; `begin` has not been called since the last
    /// resolution.
    Idle,
    /// Started but not yet resolved.
    InFlight,
    /// The worker resolved with this value. The operation is idle again.
    Resolved(T),
    /// The worker dropped its handle without resolving. The operation is
    /// idle again; the task decides whether that is a failure.
    Abandoned,
}

/// Resolver side of a [`PendingOperation`], given to the background worker.
/// Consuming it with [`resolve`](CompletionHandle::resolve) delivers the
/// value; dropping it unresolved surfaces as
/// [`PendingStatus::Abandoned`].
#[derive(Debug)]
pub struct CompletionHandle<T> {
    tx: Sender<T>,
}

impl<T> CompletionHandle<T> {
    pub fn resolve(self, value: T) {
        // The receiver may already be gone if the task was dropped; the
        // worker has nowhere to report that and nothing to do about it.
        let _ = self.tx.send(value);
    }
}

/// Tick-side half of a one-shot background operation.
#[derive(Debug)]
pub struct PendingOperation<T> {
    rx: Option<Receiver<T>>,
}

impl<T> PendingOperation<T> {
    pub fn new() -> Self {
        Self { rx: None }
    }

    /// Start an operation, returning the handle for the worker. Returns
    /// `None` while a previous operation is still outstanding, so a step
    /// that retries `begin` every tick cannot double-fire.
    pub fn begin(&mut self) -> Option<CompletionHandle<T>> {
        if self.rx.is_some() {
            return None;
        }
        let (tx, rx) = mpsc::channel();
        self.rx = Some(rx);
        Some(CompletionHandle { tx })
    }

    /// Non-blocking check, intended to be called once per tick.
    pub fn poll(&mut self) -> PendingStatus<T> {
        let Some(rx) = &self.rx else {
            return PendingStatus::Idle;
        };
        match rx.try_recv() {
            Ok(value) => {
                self.rx = None;
                PendingStatus::Resolved(value)
            }
            Err(TryRecvError::Empty) => PendingStatus::InFlight,
            Err(TryRecvError::Disconnected) => {
                self.rx = None;
                PendingStatus::Abandoned
            }
        }
    }

    pub fn is_outstanding(&self) -> bool {
        self.rx.is_some()
    }
}

impl<T> Default for PendingOperation<T> {
    fn default() -> Self {
        Self::new()
    }
}

//! # One-time synchronization primitives used by the orchestrator.
//!
//! - [`InitGate`]: single-fire gate shared by the members of one replica set.
//!   Whichever member becomes ready first fires it; the others observe it
//!   already fired and do nothing.
//! - [`StartupLatch`]: barrier opened once the config replica set is
//!   initiated. Waiting also observes a cancellation token.
//!
//! ```text
//! data-0-0 ready ──► gate.fire(initiate) ──► Some(result)   (runs the command)
//! data-0-1 ready ──► gate.fire(initiate) ──► None           (already fired)
//!
//! cfg ready ──► initiate ──► latch.open()
//!                               └──► wait() in data/routing stages → Opened
//! ```

use std::future::Future;

use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

/// State of an [`InitGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Nobody has fired the gate yet.
    Pending,
    /// The gate fired; later callers are no-ops.
    Initiated,
}

/// Single-fire gate.
///
/// The first caller of [`fire`](InitGate::fire) runs its action while holding
/// the gate, so concurrent callers wait until it finishes and then observe
/// [`GateState::Initiated`]. The gate is marked fired whether the action
/// succeeds or fails; a failure is fatal to the caller's scope anyway.
#[derive(Debug)]
pub struct InitGate {
    state: Mutex<GateState>,
}

impl Default for InitGate {
    fn default() -> Self {
        Self::new()
    }
}

impl InitGate {
    /// Creates a pending gate.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Pending),
        }
    }

    /// Runs `action` if the gate is still pending.
    ///
    /// Returns `Some(output)` for the caller that fired the gate and `None`
    /// for everyone else.
    pub async fn fire<F, Fut, T>(&self, action: F) -> Option<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let mut state = self.state.lock().await;
        if *state == GateState::Initiated {
            return None;
        }
        *state = GateState::Initiated;
        Some(action().await)
    }

    /// Current state.
    pub async fn state(&self) -> GateState {
        *self.state.lock().await
    }
}

/// State of a [`StartupLatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchState {
    /// Dependents are blocked.
    Closed,
    /// Dependents may proceed.
    Open,
}

/// Outcome of [`StartupLatch::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatchOutcome {
    /// The latch opened.
    Opened,
    /// The token was cancelled first.
    Canceled,
}

/// One-way barrier: starts [`LatchState::Closed`], [`open`](StartupLatch::open) is idempotent.
#[derive(Debug)]
pub struct StartupLatch {
    tx: watch::Sender<LatchState>,
}

impl Default for StartupLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl StartupLatch {
    /// Creates a closed latch.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(LatchState::Closed);
        Self { tx }
    }

    /// Opens the latch, releasing every current and future waiter.
    pub fn open(&self) {
        self.tx.send_replace(LatchState::Open);
    }

    /// Current state.
    pub fn state(&self) -> LatchState {
        *self.tx.borrow()
    }

    /// Waits until the latch opens or `cancel` fires, whichever comes first.
    ///
    /// Cancellation wins if both are already true.
    pub async fn wait(&self, cancel: &CancellationToken) -> LatchOutcome {
        let mut rx = self.tx.subscribe();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => LatchOutcome::Canceled,
            res = rx.wait_for(|s| *s == LatchState::Open) => match res {
                Ok(_) => LatchOutcome::Opened,
                Err(_closed) => LatchOutcome::Canceled,
            },
        }
    }
}

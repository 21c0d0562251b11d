//! # Task group: first fatal error cancels the subtree.
//!
//! A [`TaskGroup`] owns a child [`CancellationToken`] of its parent scope and a
//! [`JoinSet`] of member futures. Members receive the group token (or a child
//! of it) and must return once it is cancelled.
//!
//! ```text
//! parent token
//!   └─► group token ──► member 1, member 2, ... (spawned on the JoinSet)
//!
//! wait():
//!   join_next() ─► Ok(())   → keep waiting
//!               ─► Err(e)   → remember e if first, cancel group token
//!               ─► panic    → ClusterError::Panicked, same as Err
//!   all joined  ─► first error or Ok(())
//! ```
//!
//! ## Rules
//! - Only the **first** error is returned; later ones are dropped.
//! - Cancelling the group never cancels the parent.
//! - Dropping the group aborts every member still running.

use std::future::Future;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{ClusterError, Result};

/// Group of concurrently running fallible futures with shared cancellation.
pub struct TaskGroup {
    token: CancellationToken,
    set: JoinSet<Result<()>>,
}

impl TaskGroup {
    /// Creates a group whose scope is a child of `parent`.
    pub fn new(parent: &CancellationToken) -> Self {
        Self {
            token: parent.child_token(),
            set: JoinSet::new(),
        }
    }

    /// Group scope; cancelled by the first failing member.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Spawns a member onto the runtime.
    pub fn spawn<F>(&mut self, fut: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        self.set.spawn(fut);
    }

    /// Waits for every member and returns the first error, if any.
    pub async fn wait(mut self) -> Result<()> {
        let mut first: Option<ClusterError> = None;

        while let Some(joined) = self.set.join_next().await {
            let err = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(je) if je.is_cancelled() => ClusterError::Canceled,
                Err(je) => ClusterError::Panicked {
                    reason: je.to_string(),
                },
            };
            if first.is_none() {
                first = Some(err);
                self.token.cancel();
            }
        }

        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

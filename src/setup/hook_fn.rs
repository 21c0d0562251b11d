//! # Function-backed setup hook (`SetupFn`)
//!
//! [`SetupFn`] wraps a closure `F: Fn(CancellationToken, ClientRef) -> Fut`,
//! producing a fresh future per call.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use shardvisor::{BoxError, ClientRef, SetupFn, SetupRef};
//!
//! let hook: SetupRef = SetupFn::arc("seed", |_ctx: CancellationToken, client: ClientRef| async move {
//!     client.create_collection("cloud", "events").await?;
//!     Ok::<_, BoxError>(())
//! });
//!
//! assert_eq!(hook.name(), "seed");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::client::ClientRef;
use crate::error::BoxError;
use crate::setup::hook::SetupHook;

/// Function-backed setup hook.
#[derive(Debug)]
pub struct SetupFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> SetupFn<F> {
    /// Creates a new function-backed hook.
    ///
    /// Prefer [`SetupFn::arc`] when you immediately need a [`SetupRef`](crate::SetupRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the hook and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut> SetupHook for SetupFn<F>
where
    F: Fn(CancellationToken, ClientRef) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&self, ctx: CancellationToken, client: ClientRef) -> Result<(), BoxError> {
        (self.f)(ctx, client).await
    }
}

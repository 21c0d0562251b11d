//! # Post-formation setup hook.
//!
//! A [`SetupHook`] runs exactly once, on the router, after every shard has
//! been registered and sharding was enabled for the target database. Its
//! failure is fatal to the bring-up.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::client::ClientRef;
use crate::error::BoxError;

/// # Caller-supplied setup step.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use shardvisor::{BoxError, ClientRef, SetupHook};
///
/// struct CreateIndexes;
///
/// #[async_trait]
/// impl SetupHook for CreateIndexes {
///     fn name(&self) -> &str { "create-indexes" }
///
///     async fn setup(&self, _ctx: CancellationToken, client: ClientRef) -> Result<(), BoxError> {
///         client.create_collection("cloud", "users").await?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait SetupHook: Send + Sync + 'static {
    /// Returns a stable, human-readable hook name (used in logs).
    fn name(&self) -> &str;

    /// Runs the setup against the router client.
    ///
    /// `ctx` is cancelled when the cluster scope unwinds.
    async fn setup(&self, ctx: CancellationToken, client: ClientRef) -> Result<(), BoxError>;
}

/// Shared handle to a setup hook.
pub type SetupRef = Arc<dyn SetupHook>;

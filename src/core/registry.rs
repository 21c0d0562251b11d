//! # Service registry: name → cancellation handle.
//!
//! Every supervised server registers its scope token under its logical name
//! before it starts waiting on its process and client legs. The registry is
//! what makes a single server killable while the rest of the cluster keeps
//! running.
//!
//! ## Architecture
//! ```text
//! run_server("data-0-0") ──► register(name, scope token)
//!
//! Cluster::services() ──► list()    → sorted names
//! Cluster::kill(name)  ──► kill()    → remove entry, cancel token
//!                                      ├─► process leg kills the child
//!                                      ├─► client leg unwinds
//!                                      └─► state directory guard drops
//! ```
//!
//! ## Rules
//! - Registry owns only the tokens; the tasks are owned by their task groups
//! - Entries are not pruned when a server exits on its own
//! - `kill` of an unknown name has no side effects

use std::collections::HashMap;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{ClusterError, Result};

/// Concurrency-safe registry of killable services.
#[derive(Debug, Default)]
pub struct Registry {
    services: RwLock<HashMap<String, CancellationToken>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `token` under `name`.
    ///
    /// A previous entry with the same name is replaced; its token is left untouched.
    pub async fn register(&self, name: &str, token: CancellationToken) {
        let mut services = self.services.write().await;
        if services.insert(name.to_string(), token).is_some() {
            tracing::warn!(service = name, "Service registered twice; replacing handle");
        }
    }

    /// Returns sorted list of registered service names.
    pub async fn list(&self) -> Vec<String> {
        let services = self.services.read().await;
        let mut names: Vec<String> = services.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Removes `name` and cancels its token.
    pub async fn kill(&self, name: &str) -> Result<()> {
        let token = self.take(name).await.ok_or_else(|| ClusterError::ServiceNotFound {
            name: name.to_string(),
        })?;
        token.cancel();
        Ok(())
    }

    /// Atomically remove a handle from the registry.
    async fn take(&self, name: &str) -> Option<CancellationToken> {
        self.services.write().await.remove(name)
    }
}

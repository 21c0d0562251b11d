//! Error types used by the cluster runtime and the admin client seam.
//!
//! This module defines two main error enums:
//!
//! - [`ClusterError`]: errors raised while bringing up or supervising the cluster.
//! - [`ClientError`]: errors raised by an [`AdminClient`](crate::AdminClient) implementation.
//!
//! Both types provide helper methods (`as_label`) for logging, and
//! [`ClusterError`] adds classification helpers such as [`ClusterError::is_not_found`].

use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Boxed error returned by user-supplied hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for cluster operations.
pub type Result<T, E = ClusterError> = std::result::Result<T, E>;

/// Administrative step executed during topology formation.
///
/// Carried by [`ClusterError::Command`] so the caller can tell which stage of
/// the bring-up failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// `replSetInitiate` on a config or data replica set.
    ReplicaSetInitiate,
    /// `addShard` on the router.
    AddShard,
    /// Placeholder collection creation on the router.
    CreateDatabase,
    /// `enableSharding` on the router.
    EnableSharding,
}

impl Stage {
    /// Returns a short stable label (snake_case).
    pub fn as_label(&self) -> &'static str {
        match self {
            Stage::ReplicaSetInitiate => "replset_initiate",
            Stage::AddShard => "add_shard",
            Stage::CreateDatabase => "create_database",
            Stage::EnableSharding => "enable_sharding",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// # Errors produced by the cluster runtime.
///
/// The first fatal error observed in a task group cancels that group and is
/// the one surfaced to the caller; later errors are discarded.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ClusterError {
    /// Cluster specification failed validation.
    #[error("invalid cluster spec: {reason}")]
    InvalidSpec {
        /// What is wrong with the spec.
        reason: String,
    },

    /// State directory of a stateful server could not be created.
    #[error("{service}: ensure dir {path:?}: {source}")]
    StateDir {
        /// Logical service name.
        service: String,
        /// Directory that could not be created.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Server process could not be started.
    #[error("{service}: spawn {binary:?}: {source}")]
    Spawn {
        /// Logical service name.
        service: String,
        /// Binary that failed to start.
        binary: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting for the server process failed.
    #[error("{service}: wait: {source}")]
    Wait {
        /// Logical service name.
        service: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Server process exited on its own with a failure status.
    #[error("{service}: process exited: {status}")]
    ProcessExited {
        /// Logical service name.
        service: String,
        /// Exit status reported by the OS.
        status: ExitStatus,
    },

    /// Admin client could not be created for the server.
    #[error("{service}: connect: {source}")]
    Connect {
        /// Logical service name.
        service: String,
        /// Underlying client error.
        #[source]
        source: ClientError,
    },

    /// Server did not answer a ping before the setup deadline.
    #[error("{service}: not ready after {deadline:?} (last error: {})", last.as_deref().unwrap_or("none"))]
    ReadinessTimeout {
        /// Logical service name.
        service: String,
        /// Configured setup deadline.
        deadline: Duration,
        /// Last probe error, if any attempt completed.
        last: Option<String>,
    },

    /// An administrative command failed.
    #[error("{service}: {stage}: {source}")]
    Command {
        /// Logical service name the command was sent to.
        service: String,
        /// Bring-up stage that issued the command.
        stage: Stage,
        /// Underlying client error.
        #[source]
        source: ClientError,
    },

    /// The caller-supplied setup hook failed.
    #[error("setup: {source}")]
    Setup {
        /// Error returned by the hook.
        #[source]
        source: BoxError,
    },

    /// No registered service has this name.
    #[error("no service {name}")]
    ServiceNotFound {
        /// Requested name.
        name: String,
    },

    /// A supervised task panicked.
    #[error("task panicked: {reason}")]
    Panicked {
        /// Panic description from the join error.
        reason: String,
    },

    /// The enclosing scope was cancelled.
    #[error("context cancelled")]
    Canceled,
}

impl ClusterError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use shardvisor::ClusterError;
    ///
    /// let err = ClusterError::ServiceNotFound { name: "data-9-9".into() };
    /// assert_eq!(err.as_label(), "service_not_found");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ClusterError::InvalidSpec { .. } => "invalid_spec",
            ClusterError::StateDir { .. } => "state_dir",
            ClusterError::Spawn { .. } => "spawn",
            ClusterError::Wait { .. } => "wait",
            ClusterError::ProcessExited { .. } => "process_exited",
            ClusterError::Connect { .. } => "connect",
            ClusterError::ReadinessTimeout { .. } => "readiness_timeout",
            ClusterError::Command { stage, .. } => stage.as_label(),
            ClusterError::Setup { .. } => "setup",
            ClusterError::ServiceNotFound { .. } => "service_not_found",
            ClusterError::Panicked { .. } => "panicked",
            ClusterError::Canceled => "canceled",
        }
    }

    /// Returns the logical service this error is attributed to, if any.
    pub fn service(&self) -> Option<&str> {
        match self {
            ClusterError::StateDir { service, .. }
            | ClusterError::Spawn { service, .. }
            | ClusterError::Wait { service, .. }
            | ClusterError::ProcessExited { service, .. }
            | ClusterError::Connect { service, .. }
            | ClusterError::ReadinessTimeout { service, .. }
            | ClusterError::Command { service, .. } => Some(service),
            ClusterError::ServiceNotFound { name } => Some(name),
            _ => None,
        }
    }

    /// True for [`ClusterError::ServiceNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClusterError::ServiceNotFound { .. })
    }

    /// True for [`ClusterError::ReadinessTimeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClusterError::ReadinessTimeout { .. })
    }

    /// True for [`ClusterError::Canceled`].
    pub fn is_canceled(&self) -> bool {
        matches!(self, ClusterError::Canceled)
    }

    pub(crate) fn invalid_spec(reason: impl Into<String>) -> Self {
        ClusterError::InvalidSpec {
            reason: reason.into(),
        }
    }

    pub(crate) fn command(service: impl Into<String>, stage: Stage, source: ClientError) -> Self {
        ClusterError::Command {
            service: service.into(),
            stage,
            source,
        }
    }
}

/// # Errors produced by an admin client.
///
/// Implementations of [`AdminClient`](crate::AdminClient) and
/// [`Connector`](crate::Connector) map their driver errors onto these.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Could not establish a connection.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The server rejected a command.
    #[error("command {command} failed: {message}")]
    Command {
        /// Command name (first key of the command document).
        command: String,
        /// Server-provided message.
        message: String,
    },

    /// Operation did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Client was already disconnected.
    #[error("client closed")]
    Closed,
}

impl ClientError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ClientError::Connect(_) => "client_connect",
            ClientError::Command { .. } => "client_command",
            ClientError::Timeout(_) => "client_timeout",
            ClientError::Closed => "client_closed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_names_service_and_stage() {
        let err = ClusterError::command(
            "routing",
            Stage::AddShard,
            ClientError::Command {
                command: "addShard".into(),
                message: "host unreachable".into(),
            },
        );
        assert_eq!(
            err.to_string(),
            "routing: add_shard: command addShard failed: host unreachable"
        );
        assert_eq!(err.as_label(), "add_shard");
        assert_eq!(err.service(), Some("routing"));
    }

    #[test]
    fn test_classification() {
        assert!(ClusterError::ServiceNotFound { name: "x".into() }.is_not_found());
        assert!(ClusterError::Canceled.is_canceled());
        let timeout = ClusterError::ReadinessTimeout {
            service: "cfg".into(),
            deadline: Duration::from_secs(1),
            last: None,
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_canceled());
        assert_eq!(
            timeout.to_string(),
            "cfg: not ready after 1s (last error: none)"
        );
    }
}

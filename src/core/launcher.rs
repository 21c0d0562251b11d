//! # Process launcher seam.
//!
//! The supervisor describes what to start as a [`Launch`]; a [`Launcher`]
//! turns it into a [`tokio::process::Command`]. The supervisor then wires
//! stdio, kill-on-drop and spawns it.
//!
//! [`BinaryLauncher`] runs the binary with the computed arguments. Tests and
//! embedders can substitute their own launcher (e.g. to wrap the server in a
//! sandbox or to stand in for it entirely).

use std::path::PathBuf;

use tokio::process::Command;

use crate::core::ServerRole;

/// Everything needed to start one server process.
#[derive(Clone, Debug, PartialEq)]
pub struct Launch {
    /// Logical service name.
    pub service: String,
    /// Server role.
    pub role: ServerRole,
    /// Binary to execute.
    pub binary: PathBuf,
    /// Command-line arguments.
    pub args: Vec<String>,
    /// Working directory (state directory for stateful roles).
    pub dir: Option<PathBuf>,
}

/// Builds the command for a [`Launch`].
pub trait Launcher: Send + Sync + 'static {
    /// Returns an unspawned command; stdio and kill-on-drop are set by the caller.
    fn command(&self, launch: &Launch) -> Command;
}

/// Runs `launch.binary` with `launch.args` inside `launch.dir`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryLauncher;

impl Launcher for BinaryLauncher {
    fn command(&self, launch: &Launch) -> Command {
        let mut cmd = Command::new(&launch.binary);
        cmd.args(&launch.args);
        if let Some(dir) = &launch.dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

//! Exclusive per-instance state directory.
//!
//! [`StateDir`] creates `<base>/<service>/` before a stateful server starts.
//! The normal exit path calls [`StateDir::remove`], which deletes the tree
//! off the runtime's worker threads. If the owning future is dropped first,
//! `Drop` removes it synchronously instead, so the directory goes away on
//! every exit path.

use std::io;
use std::path::{Path, PathBuf};

/// Guard over a server state directory.
#[derive(Debug)]
pub struct StateDir {
    path: PathBuf,
    armed: bool,
}

impl StateDir {
    /// Creates `base/name` (and missing parents) with owner-only permissions on unix.
    pub async fn create(base: &Path, name: &str) -> io::Result<Self> {
        let path = base.join(name);
        let mut builder = tokio::fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(0o700);
        builder.create(&path).await?;
        Ok(Self { path, armed: true })
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the directory tree and disarms the drop fallback.
    pub async fn remove(mut self) {
        self.armed = false;
        report(&self.path, tokio::fs::remove_dir_all(&self.path).await);
    }
}

impl Drop for StateDir {
    fn drop(&mut self) {
        if self.armed {
            report(&self.path, std::fs::remove_dir_all(&self.path));
        }
    }
}

fn report(path: &Path, res: io::Result<()>) {
    match res {
        Ok(()) => tracing::debug!(dir = %path.display(), "State directory removed"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(dir = %path.display(), error = %e, "Failed to remove state directory");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_created_and_removed() {
        let base = tempfile::tempdir().unwrap();
        let dir = StateDir::create(base.path(), "data-0-0").await.unwrap();
        let path = dir.path().to_path_buf();
        std::fs::write(path.join("WiredTiger.lock"), b"x").unwrap();
        assert!(path.is_dir());

        dir.remove().await;
        assert!(!path.exists());
        assert!(base.path().exists());
    }

    #[tokio::test]
    async fn test_removed_on_drop() {
        let base = tempfile::tempdir().unwrap();
        let dir = StateDir::create(base.path(), "cfg").await.unwrap();
        let path = dir.path().to_path_buf();
        std::fs::create_dir(path.join("journal")).unwrap();

        drop(dir);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_reuses_existing_directory() {
        let base = tempfile::tempdir().unwrap();
        std::fs::create_dir(base.path().join("cfg")).unwrap();
        let dir = StateDir::create(base.path(), "cfg").await.unwrap();
        assert!(dir.path().is_dir());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_owner_only_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let base = tempfile::tempdir().unwrap();
        let dir = StateDir::create(base.path(), "data-1-0").await.unwrap();
        let mode = std::fs::metadata(dir.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}

//! Single-instance guard for the agent.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use fs2::FileExt;

/// Exclusive lock on a file beside the database, held for the agent's
/// lifetime. Released when dropped.
#[derive(Debug)]
pub struct AgentLock {
    file: File,
    path: PathBuf,
}

impl AgentLock {
    /// Takes the lock without waiting.
    ///
    /// # Errors
    ///
    /// Fails if another process holds the lock or the file cannot be opened.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("failed to create data directory")?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("failed to open lock file {}", path.display()))?;
        if file.try_lock_exclusive().is_err() {
            bail!(
                "another tabpulse agent is already running (lock held on {})",
                path.display()
            );
        }
        tracing::debug!(path = %path.display(), "agent lock acquired");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for AgentLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_released() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tabpulse.lock");

        let first = AgentLock::acquire(&path).unwrap();
        assert_eq!(first.path(), path);
        let err = AgentLock::acquire(&path).unwrap_err();
        assert!(err.to_string().contains("already running"));

        drop(first);
        assert!(AgentLock::acquire(&path).is_ok());
    }
}

//! Cooperative lock file shared between independent terminal instances.
//!
//! The signal is the mere existence of a path. Any process may create or
//! delete it; there is no owner token and writes are last-writer-wins. It
//! exists so a person can temporarily hand the transport to another tool
//! (a flasher, a second terminal) without killing this one.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use thiserror::Error;

/// Delay applied whenever a check finds the lock present.
pub const LOCK_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("transport is not locked ({path} does not exist)")]
    NotLocked { path: PathBuf },

    #[error("failed to update lock file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Resulting state of a [`LockCoordinator::toggle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Locked,
    Unlocked,
}

#[derive(Debug, Clone)]
pub struct LockCoordinator {
    path: PathBuf,
    debounce: Duration,
}

impl LockCoordinator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            debounce: LOCK_DEBOUNCE,
        }
    }

    /// Override the debounce delay (tests use a zero delay).
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-derive the lock state from the filesystem.
    ///
    /// Sleeps for the debounce delay when locked so callers polling in a loop
    /// do not spin.
    pub fn is_locked(&self) -> bool {
        let locked = self.path.exists();
        if locked && !self.debounce.is_zero() {
            thread::sleep(self.debounce);
        }
        locked
    }

    /// Create the lock file. Succeeds when it already exists.
    pub fn lock(&self) -> Result<(), LockError> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map(drop)
            .map_err(|source| LockError::Io {
                path: self.path.clone(),
                source,
            })
    }

    /// Remove the lock file.
    ///
    /// Unlocking while unlocked is reported to the user and returned as
    /// [`LockError::NotLocked`]; the filesystem is left untouched.
    pub fn unlock(&self) -> Result<(), LockError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                tracing::error!(path = %self.path.display(), "cannot unlock: transport is not locked");
                Err(LockError::NotLocked {
                    path: self.path.clone(),
                })
            }
            Err(source) => Err(LockError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub fn toggle(&self) -> Result<LockState, LockError> {
        if self.path.exists() {
            self.unlock()?;
            Ok(LockState::Unlocked)
        } else {
            self.lock()?;
            Ok(LockState::Locked)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn coordinator(dir: &TempDir) -> LockCoordinator {
        LockCoordinator::new(dir.path().join("serterm.lock")).with_debounce(Duration::ZERO)
    }

    #[test]
    fn lock_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let lock = coordinator(&dir);

        lock.lock().unwrap();
        lock.lock().unwrap();
        assert!(lock.is_locked());
    }

    #[test]
    fn unlock_when_unlocked_errors_and_changes_nothing() {
        let dir = TempDir::new().unwrap();
        let lock = coordinator(&dir);

        let result = lock.unlock();
        assert!(matches!(result, Err(LockError::NotLocked { .. })));
        assert!(!lock.path().exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn toggle_flips_state() {
        let dir = TempDir::new().unwrap();
        let lock = coordinator(&dir);

        assert_eq!(lock.toggle().unwrap(), LockState::Locked);
        assert!(lock.is_locked());
        assert_eq!(lock.toggle().unwrap(), LockState::Unlocked);
        assert!(!lock.is_locked());
    }

    #[test]
    fn lock_keeps_existing_contents() {
        let dir = TempDir::new().unwrap();
        let lock = coordinator(&dir);
        std::fs::write(lock.path(), b"held by flasher").unwrap();

        lock.lock().unwrap();
        assert_eq!(std::fs::read(lock.path()).unwrap(), b"held by flasher");
    }

    #[test]
    fn locked_check_is_debounced() {
        let dir = TempDir::new().unwrap();
        let lock = LockCoordinator::new(dir.path().join("serterm.lock"))
            .with_debounce(Duration::from_millis(50));
        lock.lock().unwrap();

        let start = std::time::Instant::now();
        assert!(lock.is_locked());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    /// Two coordinators on the same path are not mutually exclusive: either
    /// one can release the other's lock. This is the accepted race window.
    #[test]
    fn any_instance_can_release_the_signal() {
        let dir = TempDir::new().unwrap();
        let first = coordinator(&dir);
        let second = coordinator(&dir);

        first.lock().unwrap();
        second.unlock().unwrap();
        assert!(!first.is_locked());
    }
}

//! Advisory file locks guarding a cache slot.
//!
//! A slot is locked through `<dir>/<name>.lock` so that two synchronizations
//! of the same slot, in this process or another, never interleave.

use std::{
    fs::{File, OpenOptions},
    path::{Path, PathBuf},
};

use nix::{
    errno::Errno,
    fcntl::{Flock, FlockArg},
};

use crate::{
    error::{LockError, LockResult},
    fs::ensure_dir_exists,
};

/// An exclusive lock held through `flock`.
///
/// The lock is released when `FileLock` is dropped.
pub struct FileLock {
    _file: Flock<File>,
    path: PathBuf,
}

impl FileLock {
    /// Generate the lock file path for `name` inside `dir`.
    pub fn lock_path<P: AsRef<Path>>(dir: P, name: &str) -> PathBuf {
        let sanitized = name
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect::<String>();

        dir.as_ref().join(format!("{sanitized}.lock"))
    }

    fn open(dir: &Path, name: &str) -> LockResult<(File, PathBuf)> {
        ensure_dir_exists(dir).map_err(|err| LockError::AcquireFailed(err.to_string()))?;
        let lock_path = Self::lock_path(dir, name);

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        Ok((file, lock_path))
    }

    /// Acquire an exclusive lock, blocking until it is available.
    pub fn acquire<P: AsRef<Path>>(dir: P, name: &str) -> LockResult<Self> {
        let (file, lock_path) = Self::open(dir.as_ref(), name)?;

        let file = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, err)| {
            LockError::AcquireFailed(format!("{}: {}", lock_path.display(), err))
        })?;

        Ok(FileLock {
            path: lock_path,
            _file: file,
        })
    }

    /// Try to acquire an exclusive lock without blocking.
    ///
    /// Returns `None` if the lock is already held elsewhere.
    pub fn try_acquire<P: AsRef<Path>>(dir: P, name: &str) -> LockResult<Option<Self>> {
        let (file, lock_path) = Self::open(dir.as_ref(), name)?;

        match Flock::lock(file, FlockArg::LockExclusiveNonblock) {
            Ok(file) => {
                Ok(Some(FileLock {
                    path: lock_path,
                    _file: file,
                }))
            }
            Err((_, Errno::EWOULDBLOCK)) => Ok(None),
            Err((_, err)) => {
                Err(LockError::AcquireFailed(format!(
                    "{}: {}",
                    lock_path.display(),
                    err
                )))
            }
        }
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

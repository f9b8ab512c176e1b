//! Exclusive advisory lock over the log file.
//!
//! Mutations hold this lock across the whole read-validate-append span so
//! that two writers cannot both validate against the same projection and
//! then append conflicting records. The lock is a `.lock` sidecar next to
//! the log, locked via the OS advisory mechanism, so it is released by the
//! kernel even if the holder dies.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("cannot create lock file {path:?}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot lock {path:?}: {source}")]
    Acquire {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Held exclusive lock; unlocked on drop.
#[derive(Debug)]
pub struct LogLock {
    path: PathBuf,
    file: File,
}

impl LogLock {
    /// Block until the exclusive lock on `<log>.lock` is held.
    pub fn acquire(log_path: &Path) -> Result<Self, LockError> {
        let path = Self::lock_path(log_path);
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| LockError::Create {
                path: path.clone(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| LockError::Create {
                path: path.clone(),
                source,
            })?;

        file.lock_exclusive().map_err(|source| LockError::Acquire {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(path = %path.display(), "acquired plan lock");
        Ok(Self { path, file })
    }

    /// Try once; `Ok(None)` when another writer holds the lock.
    pub fn try_acquire(log_path: &Path) -> Result<Option<Self>, LockError> {
        let path = Self::lock_path(log_path);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| LockError::Create {
                path: path.clone(),
                source,
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { path, file })),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(source) => Err(LockError::Acquire { path, source }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(log_path: &Path) -> PathBuf {
        let mut name = log_path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "plan".into());
        name.push(".lock");
        log_path.with_file_name(name)
    }
}

impl Drop for LogLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}

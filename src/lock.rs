//! Process-exclusion lock file.
//!
//! A database directory may only be open in one process (and one handle)
//! at a time. Exclusion uses an advisory exclusive lock on a `lock` file
//! inside the directory, taken non-blocking at open. The lock is released
//! when the guard is dropped, which also happens implicitly when the
//! process exits.

use std::fs::OpenOptions;
use std::path::PathBuf;

use fs2::FileExt;

use crate::error::{Error, Result};

/// Holds the advisory lock on a database directory for its lifetime.
#[derive(Debug)]
pub(crate) struct DirLock {
    file: std::fs::File,
}

impl DirLock {
    /// Create the lock file if needed and take the exclusive lock.
    ///
    /// Fails with [`Error::Lock`] if any other handle, in this process or
    /// another, currently holds it.
    pub(crate) fn acquire(path: PathBuf) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|source| Error::Lock {
                path: path.clone(),
                source,
            })?;

        file.try_lock_exclusive()
            .map_err(|source| Error::Lock { path, source })?;

        Ok(Self { file })
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_acquire_fails_until_released() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lock");

        let held = DirLock::acquire(path.clone()).unwrap();
        let err = DirLock::acquire(path.clone()).unwrap_err();
        assert!(matches!(err, Error::Lock { .. }));

        drop(held);
        DirLock::acquire(path).unwrap();
    }
}

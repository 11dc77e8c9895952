use super::Locker;
use crate::error::{LockError, Result};
use fs2::FileExt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Check if an I/O error indicates lock contention (file locked by another owner)
pub(crate) fn is_lock_contention(e: &io::Error) -> bool {
    // Check for WouldBlock (Unix)
    if e.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    // Check for Windows-specific lock errors
    // ERROR_LOCK_VIOLATION (33) - file region is locked
    // ERROR_SHARING_VIOLATION (32) - file in use by another process
    #[cfg(windows)]
    if let Some(code) = e.raw_os_error() {
        if code == 33 || code == 32 {
            return true;
        }
    }
    false
}

/// Exclusive advisory lock on an existing file or directory.
///
/// The lock belongs to the open descriptor, not to the path, so the OS drops
/// it as soon as the descriptor is closed, including when the owning process
/// crashes. No stale state is ever left behind.
///
/// The target is opened read-only and never read or written.
#[derive(Debug)]
pub struct FileLock {
    file: Option<File>,
    path: PathBuf,
    locked: bool,
}

impl FileLock {
    /// Open `path` for locking. The lock is not taken yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| LockError::Open {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(FileLock {
            file: Some(file),
            path: path.to_path_buf(),
            locked: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn file(&self) -> Result<&File> {
        self.file
            .as_ref()
            .ok_or_else(|| LockError::Released(self.path.clone()))
    }
}

impl Locker for FileLock {
    fn lock(&mut self) -> Result<()> {
        debug!("Acquiring lock: {} (blocking)", self.path.display());

        self.file()?
            .lock_exclusive()
            .map_err(|e| LockError::Acquire {
                path: self.path.clone(),
                source: e,
            })?;
        self.locked = true;

        debug!("Lock acquired: {}", self.path.display());
        Ok(())
    }

    fn try_lock(&mut self) -> Result<bool> {
        let attempt = self.file()?.try_lock_exclusive();
        match attempt {
            Ok(()) => {
                self.locked = true;
                debug!("Lock acquired: {}", self.path.display());
                Ok(true)
            }
            Err(e) if is_lock_contention(&e) => {
                debug!("Lock busy: {}", self.path.display());
                Ok(false)
            }
            Err(e) => Err(LockError::Acquire {
                path: self.path.clone(),
                source: e,
            }),
        }
    }

    /// Release the lock and close the descriptor.
    ///
    /// A second call returns [`LockError::Released`].
    fn unlock(&mut self) -> Result<()> {
        let file = self
            .file
            .take()
            .ok_or_else(|| LockError::Released(self.path.clone()))?;

        let result = if self.locked {
            FileExt::unlock(&file).map_err(|e| LockError::Release {
                path: self.path.clone(),
                source: e,
            })
        } else {
            Ok(())
        };
        self.locked = false;

        // Closing the descriptor drops the OS lock even if the unlock call failed
        drop(file);
        debug!("Lock released: {}", self.path.display());
        result
    }

    fn target(&self) -> String {
        self.path.display().to_string()
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Lock is automatically released when the file handle is dropped
        if self.locked {
            debug!("Lock released on drop: {}", self.path.display());
        }
    }
}

use super::path::{derive_marker_path, DEFAULT_MARKER_NAME};
use super::Locker;
use crate::error::{LockError, Result};
use crate::retry::RetryPolicy;
use std::fs::{self, DirBuilder};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Lock held by the existence of a marker directory.
///
/// Creating a directory is atomic, so among racing processes exactly one sees
/// the create succeed. The marker is an empty directory, created owner-only.
///
/// # Stale markers
///
/// Unlike [`FileLock`](super::FileLock) and [`PortLock`](super::PortLock), the
/// OS does **not** release this lock when the owner dies. Dropping a held lock
/// removes the marker, but a crash, `kill -9` or `abort` leaves it on disk and
/// every later `lock()` spins until someone removes it by hand (or calls
/// [`unlock`](Locker::unlock) on an instance for the same base).
///
/// Only the owner that created the marker should remove it; a second remover
/// may delete a marker that a third process has since created.
#[derive(Debug)]
pub struct DirectoryLock {
    base: PathBuf,
    marker: PathBuf,
    held: bool,
}

impl DirectoryLock {
    /// Lock on `base` using the `.lock` marker name
    pub fn new(base: impl AsRef<Path>) -> Result<Self> {
        Self::with_name(base, DEFAULT_MARKER_NAME)
    }

    /// Lock on `base` using a custom marker name
    pub fn with_name(base: impl AsRef<Path>, name: &str) -> Result<Self> {
        let base = base.as_ref();
        let marker = derive_marker_path(base, name)?;
        debug!("Directory lock for {} uses marker {}", base.display(), marker.display());

        Ok(DirectoryLock {
            base: base.to_path_buf(),
            marker,
            held: false,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker
    }

    /// Whether this instance created the marker and has not removed it
    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Whether a marker exists on disk, whoever created it
    pub fn is_marked(&self) -> bool {
        fs::symlink_metadata(&self.marker).is_ok()
    }

    fn create_marker(&self) -> io::Result<()> {
        let mut builder = DirBuilder::new();

        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }

        builder.create(&self.marker)
    }
}

impl Locker for DirectoryLock {
    /// Spin on `try_lock` with a short fixed sleep until the marker is ours.
    ///
    /// Returns early only for creation failures other than "already exists".
    fn lock(&mut self) -> Result<()> {
        self.lock_with(&RetryPolicy::directory(), None)
    }

    fn try_lock(&mut self) -> Result<bool> {
        if self.held {
            return Ok(true);
        }

        match self.create_marker() {
            Ok(()) => {
                self.held = true;
                debug!("Lock acquired: {}", self.marker.display());
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(LockError::CreateMarker {
                path: self.marker.clone(),
                source: e,
            }),
        }
    }

    /// Remove the marker directory. A missing marker is an error.
    fn unlock(&mut self) -> Result<()> {
        fs::remove_dir(&self.marker).map_err(|e| LockError::RemoveMarker {
            path: self.marker.clone(),
            source: e,
        })?;
        self.held = false;

        debug!("Lock released: {}", self.marker.display());
        Ok(())
    }

    fn target(&self) -> String {
        self.marker.display().to_string()
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        if !self.held {
            return;
        }
        match fs::remove_dir(&self.marker) {
            Ok(()) => debug!("Lock released on drop: {}", self.marker.display()),
            Err(e) => warn!("Failed to remove lock marker {}: {}", self.marker.display(), e),
        }
    }
}

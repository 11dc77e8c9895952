use super::{FileLock, Locker};
use crate::error::{LockError, Result};
use std::path::Path;
use tracing::{debug, warn};

/// Several file locks taken together, all or nothing.
///
/// Construction either returns a set holding every requested lock or an error
/// with none of them held. A busy member yields [`LockError::AlreadyLocked`].
#[derive(Debug)]
pub struct FileLockSet {
    locks: Vec<FileLock>,
}

impl FileLockSet {
    /// Open and try-lock each path in order, rolling back on the first failure.
    pub fn acquire<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let mut pending = Rollback { locks: Vec::new() };

        for path in paths {
            let path = path.as_ref();
            let mut lock = FileLock::open(path)?;
            if !lock.try_lock()? {
                debug!(
                    "Lock set aborted, {} is held elsewhere (rolling back {})",
                    path.display(),
                    pending.locks.len()
                );
                return Err(LockError::already_locked(path));
            }
            pending.locks.push(lock);
        }

        Ok(FileLockSet {
            locks: pending.commit(),
        })
    }

    /// Release every member, even if some releases fail.
    ///
    /// Returns the first release error after all members were attempted.
    pub fn unlock(mut self) -> Result<()> {
        match release_all(&mut self.locks) {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.locks.iter().map(FileLock::path)
    }
}

/// Locks taken so far; released on drop unless committed.
struct Rollback {
    locks: Vec<FileLock>,
}

impl Rollback {
    fn commit(mut self) -> Vec<FileLock> {
        std::mem::take(&mut self.locks)
    }
}

impl Drop for Rollback {
    fn drop(&mut self) {
        release_all(&mut self.locks);
    }
}

fn release_all(locks: &mut Vec<FileLock>) -> Option<LockError> {
    let mut first_error = None;
    for mut lock in locks.drain(..) {
        if let Err(e) = lock.unlock() {
            warn!("Failed to release lock {}: {}", lock.path().display(), e);
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }
    first_error
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rollback_releases_uncommitted_locks() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a");
        std::fs::write(&path, b"").unwrap();

        {
            let mut lock = FileLock::open(&path).unwrap();
            assert!(lock.try_lock().unwrap());
            let _pending = Rollback { locks: vec![lock] };
        }

        let mut again = FileLock::open(&path).unwrap();
        assert!(again.try_lock().unwrap());
    }

    #[test]
    fn test_release_all_continues_after_failure() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        std::fs::write(&a, b"").unwrap();
        std::fs::write(&b, b"").unwrap();

        let mut released = FileLock::open(&a).unwrap();
        released.unlock().unwrap();
        let mut held = FileLock::open(&b).unwrap();
        assert!(held.try_lock().unwrap());

        let mut locks = vec![released, held];
        let err = release_all(&mut locks);
        assert!(matches!(err, Some(LockError::Released(_))));
        assert!(locks.is_empty());

        let mut again = FileLock::open(&b).unwrap();
        assert!(again.try_lock().unwrap());
    }
}

mod directory;
mod file;
mod path;
mod port;
mod set;

pub use directory::DirectoryLock;
pub use file::FileLock;
pub use path::{derive_marker_path, validate_marker_name, DEFAULT_MARKER_NAME};
pub use port::PortLock;
pub use set::FileLockSet;

use crate::error::Result;
use crate::retry::{retry, CancelToken, RetryPolicy};

/// Common operations of the single-resource locks.
///
/// A lock instance has one logical owner. Sharing an instance between threads
/// needs the caller's own synchronization; independent instances on the same
/// resource are arbitrated by the OS.
pub trait Locker {
    /// Acquire the lock, blocking until it becomes available.
    fn lock(&mut self) -> Result<()>;

    /// Try to acquire the lock without blocking.
    /// Returns `Ok(false)` if another owner holds it.
    fn try_lock(&mut self) -> Result<bool>;

    /// Release the lock.
    fn unlock(&mut self) -> Result<()>;

    /// Human-readable name of the locked resource, used in errors and logs.
    fn target(&self) -> String;

    /// Acquire the lock by polling `try_lock` under `policy`, giving up on
    /// timeout, exhausted attempts or cancellation.
    fn lock_with(&mut self, policy: &RetryPolicy, cancel: Option<&CancelToken>) -> Result<()> {
        let target = self.target();
        retry(&target, policy, cancel, || Ok(self.try_lock()?.then_some(())))
    }
}

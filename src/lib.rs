//! Mutual-exclusion primitives for coordinating independent processes
//!
//! Three interchangeable strategies, each with `lock`, `try_lock` and `unlock`
//! through the [`Locker`] trait:
//!
//! - [`FileLock`]: OS advisory lock on an open descriptor ([`FileLockSet`] takes several at once)
//! - [`DirectoryLock`]: existence of a marker directory (not released if the owner crashes)
//! - [`PortLock`]: a listening socket on a loopback TCP port
//!
//! All operations run synchronously on the caller's thread.

pub mod error;
pub mod lock;
pub mod retry;

pub use error::{LockError, Result};
pub use lock::{DirectoryLock, FileLock, FileLockSet, Locker, PortLock};
pub use retry::{Backoff, CancelToken, RetryPolicy};

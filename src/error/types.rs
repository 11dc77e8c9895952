use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Failed to open {path} for locking: {source}")]
    Open { path: PathBuf, source: io::Error },

    #[error("Failed to acquire lock on {0}: already locked by another owner")]
    AlreadyLocked(PathBuf),

    #[error("Failed to acquire lock on {path}: {source}")]
    Acquire { path: PathBuf, source: io::Error },

    #[error("Failed to release lock on {path}: {source}")]
    Release { path: PathBuf, source: io::Error },

    #[error("Lock on {0} was already released")]
    Released(PathBuf),

    #[error("Failed to inspect lock base {path}: {source}")]
    Inspect { path: PathBuf, source: io::Error },

    #[error("Invalid lock marker name '{0}': must be a single path component")]
    InvalidMarkerName(String),

    #[error("Failed to create lock marker {path}: {source}")]
    CreateMarker { path: PathBuf, source: io::Error },

    #[error("Failed to remove lock marker {path}: {source}")]
    RemoveMarker { path: PathBuf, source: io::Error },

    #[error("Failed to bind lock address {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("Failed to acquire lock on {target}: timeout after {duration:?}")]
    Timeout { target: String, duration: Duration },

    #[error("Failed to acquire lock on {target}: gave up after {attempts} attempts")]
    RetriesExhausted { target: String, attempts: u32 },

    #[error("Acquisition of lock on {0} was cancelled")]
    Cancelled(String),

    /// Lets callers mixing their own I/O with lock calls use `?` on both
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl LockError {
    /// True when another owner holds the resource, as opposed to the lock being broken.
    pub fn is_contention(&self) -> bool {
        matches!(
            self,
            LockError::AlreadyLocked(_)
                | LockError::Timeout { .. }
                | LockError::RetriesExhausted { .. }
        )
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            e if e.is_contention() => 2,
            LockError::Cancelled(_) => 3,
            LockError::Io(e) if e.kind() == io::ErrorKind::Interrupted => 3,
            _ => 1,
        }
    }

    pub fn already_locked(path: impl Into<PathBuf>) -> Self {
        LockError::AlreadyLocked(path.into())
    }
}

pub type Result<T> = std::result::Result<T, LockError>;

use crate::error::{LockError, Result};
use std::fs;
use std::path::{self, Component, Path, PathBuf};

/// Marker name used by [`DirectoryLock::new`](super::DirectoryLock::new)
pub const DEFAULT_MARKER_NAME: &str = ".lock";

/// Derive the marker directory path for a lock on `base`.
///
/// A directory base gets the marker inside it (`base/.lock`); anything else
/// gets a sibling with the name appended (`data.db` -> `data.db.lock`).
/// Symlinks are not followed, so a link to a directory counts as "anything else".
pub fn derive_marker_path(base: &Path, name: &str) -> Result<PathBuf> {
    validate_marker_name(name)?;

    let metadata = fs::symlink_metadata(base).map_err(|e| LockError::Inspect {
        path: base.to_path_buf(),
        source: e,
    })?;

    if metadata.is_dir() {
        return Ok(base.join(name));
    }

    let mut marker = base.as_os_str().to_os_string();
    marker.push(name);
    Ok(PathBuf::from(marker))
}

/// Validate that a marker name is a single plain path component
pub fn validate_marker_name(name: &str) -> Result<()> {
    if name.chars().any(path::is_separator) {
        return Err(LockError::InvalidMarkerName(name.to_string()));
    }

    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(LockError::InvalidMarkerName(name.to_string())),
    }
}

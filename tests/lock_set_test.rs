mod common;

use common::touch;
use locking::{FileLock, FileLockSet, LockError, Locker};
use tempfile::TempDir;

#[test]
fn test_set_locks_every_path() {
    common::init_tracing();
    let temp = TempDir::new().unwrap();
    let paths = vec![
        touch(temp.path(), "a"),
        touch(temp.path(), "b"),
        touch(temp.path(), "c"),
    ];

    let set = FileLockSet::acquire(&paths).unwrap();
    assert_eq!(set.len(), 3);
    assert!(!set.is_empty());
    assert_eq!(
        set.paths().collect::<Vec<_>>(),
        paths.iter().map(|p| p.as_path()).collect::<Vec<_>>()
    );

    for path in &paths {
        let mut probe = FileLock::open(path).unwrap();
        assert!(!probe.try_lock().unwrap(), "{} should be held", path.display());
    }
}

#[test]
fn test_busy_member_rolls_back_earlier_members() {
    common::init_tracing();
    let temp = TempDir::new().unwrap();
    let a = touch(temp.path(), "a");
    let b = touch(temp.path(), "b");
    let c = touch(temp.path(), "c");

    let mut other_owner = FileLock::open(&b).unwrap();
    assert!(other_owner.try_lock().unwrap());

    let err = FileLockSet::acquire([&a, &b, &c]).unwrap_err();
    match &err {
        LockError::AlreadyLocked(path) => assert_eq!(path, &b),
        other => panic!("expected AlreadyLocked, got {:?}", other),
    }
    assert!(err.is_contention());

    // a was taken before b failed and must have been released
    let mut probe_a = FileLock::open(&a).unwrap();
    assert!(probe_a.try_lock().unwrap());

    // c was never touched
    let mut probe_c = FileLock::open(&c).unwrap();
    assert!(probe_c.try_lock().unwrap());
}

#[test]
fn test_missing_member_rolls_back_and_reports_io_error() {
    let temp = TempDir::new().unwrap();
    let a = touch(temp.path(), "a");
    let missing = temp.path().join("missing");

    let err = FileLockSet::acquire([&a, &missing]).unwrap_err();
    assert!(matches!(err, LockError::Open { .. }));
    assert!(!err.is_contention());

    let mut probe = FileLock::open(&a).unwrap();
    assert!(probe.try_lock().unwrap());
}

#[test]
fn test_unlock_releases_all_members() {
    let temp = TempDir::new().unwrap();
    let paths = [touch(temp.path(), "a"), touch(temp.path(), "b")];

    let set = FileLockSet::acquire(&paths).unwrap();
    set.unlock().unwrap();

    let again = FileLockSet::acquire(&paths).unwrap();
    assert_eq!(again.len(), 2);
}

#[test]
fn test_dropping_set_releases_all_members() {
    let temp = TempDir::new().unwrap();
    let paths = [touch(temp.path(), "a"), touch(temp.path(), "b")];

    drop(FileLockSet::acquire(&paths).unwrap());

    for path in &paths {
        let mut probe = FileLock::open(path).unwrap();
        assert!(probe.try_lock().unwrap());
    }
}

#[test]
fn test_empty_set() {
    let set = FileLockSet::acquire(Vec::<std::path::PathBuf>::new()).unwrap();
    assert!(set.is_empty());
    set.unlock().unwrap();
}

#[cfg(unix)]
#[test]
fn test_set_of_data_directories() {
    let temp = TempDir::new().unwrap();
    let dirs = [temp.path().join("data1"), temp.path().join("data2")];
    for dir in &dirs {
        std::fs::create_dir(dir).unwrap();
    }

    let set = FileLockSet::acquire(&dirs).unwrap();
    let err = FileLockSet::acquire(&dirs).unwrap_err();
    assert!(matches!(err, LockError::AlreadyLocked(_)));

    set.unlock().unwrap();
    assert!(FileLockSet::acquire(&dirs).is_ok());
}

//! Archive operations against a real directory tree.
//!
//! These run the actual `mv`, `cp --archive --link` and `rm` binaries
//! (GNU coreutils) inside a temporary directory.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

use hlsnap_archive::{Archive, ArchiveError, RealFilesystem};
use hlsnap_exec::SystemRunner;
use tempfile::tempdir;

fn open(base: &Path, max_count: usize) -> Archive<SystemRunner, RealFilesystem> {
    Archive::new(base, max_count, SystemRunner, RealFilesystem).expect("open archive")
}

fn make_slot(archive: &Archive<SystemRunner, RealFilesystem>, suffix: usize, content: &str) {
    let dir = archive.dir(suffix);
    fs::create_dir_all(dir.join("sub")).expect("mkdir");
    fs::write(dir.join("marker"), content).expect("write");
    fs::write(dir.join("sub").join("data"), format!("data-{}", content)).expect("write");
}

fn marker(archive: &Archive<SystemRunner, RealFilesystem>, suffix: usize) -> String {
    fs::read_to_string(archive.dir(suffix).join("marker")).expect("read marker")
}

#[test]
fn test_missing_base_fails_before_mutation() {
    let root = tempdir().expect("tempdir");
    let base = root.path().join("absent");

    let err = Archive::new(&base, 3, SystemRunner, RealFilesystem).unwrap_err();
    assert!(matches!(err, ArchiveError::MissingBase(_)));
    assert!(!base.exists());
}

#[test]
fn test_shift_two_slots() {
    let root = tempdir().expect("tempdir");
    let archive = open(root.path(), 3);
    make_slot(&archive, 0, "zero");
    make_slot(&archive, 1, "one");

    archive.shift(1).expect("shift");

    assert_eq!(archive.occupied(), vec![0, 2]);
    assert_eq!(marker(&archive, 0), "zero");
    assert_eq!(marker(&archive, 2), "one");
}

#[test]
fn test_copy_shares_inodes() {
    let root = tempdir().expect("tempdir");
    let archive = open(root.path(), 3);
    make_slot(&archive, 0, "zero");

    archive.copy_slot(0, 1).expect("copy");

    let a = fs::metadata(archive.dir(0).join("sub").join("data")).expect("meta");
    let b = fs::metadata(archive.dir(1).join("sub").join("data")).expect("meta");
    assert_eq!(a.ino(), b.ino());
    assert_eq!(a.nlink(), 2);
    assert_eq!(marker(&archive, 1), "zero");
}

#[test]
fn test_clone_survives_source_delete() {
    let root = tempdir().expect("tempdir");
    let archive = open(root.path(), 3);
    make_slot(&archive, 0, "zero");
    let before = fs::metadata(archive.dir(0).join("marker")).expect("meta").ino();

    archive.copy_slot(0, 1).expect("copy");
    archive.delete_slot(0).expect("delete");

    assert!(!archive.exists(0));
    assert_eq!(marker(&archive, 1), "zero");
    let after = fs::metadata(archive.dir(1).join("marker")).expect("meta");
    assert_eq!(after.ino(), before);
    assert_eq!(after.nlink(), 1);
}

#[test]
fn test_copy_into_occupied_leaves_both_unchanged() {
    let root = tempdir().expect("tempdir");
    let archive = open(root.path(), 3);
    make_slot(&archive, 0, "zero");
    make_slot(&archive, 1, "one");

    let err = archive.copy_slot(0, 1).unwrap_err();
    assert!(matches!(err, ArchiveError::SlotOccupied(_)));

    assert_eq!(marker(&archive, 0), "zero");
    assert_eq!(marker(&archive, 1), "one");
    // cp into an existing directory would nest the source; make sure it did not
    assert!(!archive.dir(1).join("snapshot.0").exists());
}

#[test]
fn test_move_into_occupied_leaves_both_unchanged() {
    let root = tempdir().expect("tempdir");
    let archive = open(root.path(), 3);
    make_slot(&archive, 0, "zero");
    make_slot(&archive, 2, "two");

    assert!(archive.move_slot(0, 2).is_err());
    assert_eq!(marker(&archive, 0), "zero");
    assert_eq!(marker(&archive, 2), "two");
    assert!(!archive.dir(2).join("snapshot.0").exists());
}

#[test]
fn test_move_missing_source_reports_mv_error() {
    let root = tempdir().expect("tempdir");
    let archive = open(root.path(), 3);

    let err = archive.move_slot(0, 1).unwrap_err();
    let cmd = err.command_error().expect("command error");
    assert!(!cmd.message().is_empty());
}

#[test]
fn test_compact_idempotent_on_disk() {
    let root = tempdir().expect("tempdir");
    let archive = open(root.path(), 6);
    make_slot(&archive, 1, "a");
    make_slot(&archive, 4, "b");
    make_slot(&archive, 5, "c");

    archive.compact().expect("compact");
    assert_eq!(archive.occupied(), vec![0, 1, 2]);
    assert_eq!(marker(&archive, 0), "a");
    assert_eq!(marker(&archive, 1), "b");
    assert_eq!(marker(&archive, 2), "c");

    let again = archive.compact().expect("compact again");
    assert!(again.is_noop());
    assert_eq!(archive.occupied(), vec![0, 1, 2]);
}

#[test]
fn test_purge_after_lowering_count() {
    let root = tempdir().expect("tempdir");
    let wide = open(root.path(), 5);
    for s in 0..5 {
        make_slot(&wide, s, &s.to_string());
    }
    fs::create_dir(root.path().join("lost+found")).expect("mkdir");

    let narrow = open(root.path(), 3);
    let removed = narrow.purge().expect("purge");

    assert_eq!(removed.len(), 2);
    assert_eq!(narrow.occupied(), vec![0, 1, 2]);
    assert!(!root.path().join("snapshot.3").exists());
    assert!(!root.path().join("snapshot.4").exists());
    assert!(root.path().join("lost+found").is_dir());
}

#[test]
fn test_slot_info_reads_mtimes() {
    let root = tempdir().expect("tempdir");
    let archive = open(root.path(), 3);
    make_slot(&archive, 0, "zero");

    let info = archive.slot_info().expect("info");
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].path, archive.dir(0));
}

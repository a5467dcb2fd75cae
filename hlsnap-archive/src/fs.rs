//! Filesystem abstraction for hlsnap.
//!
//! The archive never caches occupancy: every query goes through this trait
//! and reaches the filesystem. Mutations are not part of the trait; they run
//! as external commands through a `ProcessRunner`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

use thiserror::Error;

/// Errors from filesystem queries.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("path error: {0}")]
    Path(String),
}

impl FsError {
    fn io(path: &Path, source: io::Error) -> Self {
        FsError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Trait for filesystem queries.
/// Abstracted for testing with mock implementations.
pub trait Filesystem: Send + Sync {
    /// Check if a path exists (any file type).
    fn exists(&self, path: &Path) -> bool;

    /// Check if a path is a directory, following symlinks.
    fn is_dir(&self, path: &Path) -> bool;

    /// List the direct children of a directory, sorted by path.
    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, FsError>;

    /// Modification time of a path.
    fn modified(&self, path: &Path) -> Result<SystemTime, FsError>;

    /// Read file contents as a string.
    fn read_file(&self, path: &Path) -> Result<String, FsError>;
}

impl<F: Filesystem + ?Sized> Filesystem for &F {
    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        (**self).is_dir(path)
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, FsError> {
        (**self).list_dir(dir)
    }

    fn modified(&self, path: &Path) -> Result<SystemTime, FsError> {
        (**self).modified(path)
    }

    fn read_file(&self, path: &Path) -> Result<String, FsError> {
        (**self).read_file(path)
    }
}

/// Real filesystem implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFilesystem;

impl Filesystem for RealFilesystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, FsError> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| FsError::io(dir, e))? {
            let entry = entry.map_err(|e| FsError::io(dir, e))?;
            entries.push(entry.path());
        }
        entries.sort();
        Ok(entries)
    }

    fn modified(&self, path: &Path) -> Result<SystemTime, FsError> {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| FsError::io(path, e))
    }

    fn read_file(&self, path: &Path) -> Result<String, FsError> {
        fs::read_to_string(path).map_err(|e| FsError::io(path, e))
    }
}

/// Mock filesystem for testing.
/// Cloning creates a new handle to the same underlying data.
///
/// Directories and files live in separate maps. The tree helpers operate on
/// a path and everything below it, which is enough to model `mv`, `cp -al`
/// and `rm -rf` from a test runner.
#[derive(Debug, Clone, Default)]
pub struct MockFilesystem {
    dirs: Arc<RwLock<BTreeSet<PathBuf>>>,
    files: Arc<RwLock<BTreeMap<PathBuf, Vec<u8>>>>,
    mtimes: Arc<RwLock<BTreeMap<PathBuf, SystemTime>>>,
}

impl MockFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory (for test setup). Parents are not created.
    pub fn add_dir(&self, path: impl Into<PathBuf>) {
        self.dirs.write().unwrap().insert(path.into());
    }

    /// Add a file directly (for test setup).
    pub fn add_file(&self, path: impl Into<PathBuf>, data: Vec<u8>) {
        self.files.write().unwrap().insert(path.into(), data);
    }

    /// Get content of a specific file.
    pub fn get_file(&self, path: &Path) -> Option<Vec<u8>> {
        self.files.read().unwrap().get(path).cloned()
    }

    /// Set the modification time of a path.
    pub fn set_modified(&self, path: impl Into<PathBuf>, time: SystemTime) {
        self.mtimes.write().unwrap().insert(path.into(), time);
    }

    /// All directories, sorted.
    pub fn dirs(&self) -> Vec<PathBuf> {
        self.dirs.read().unwrap().iter().cloned().collect()
    }

    /// Move `from` and everything below it to `to`.
    pub fn rename_tree(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        if !self.exists(from) {
            return Err(FsError::Path(format!("{} not found", from.display())));
        }
        self.copy_tree(from, to)?;
        self.remove_tree(from);
        Ok(())
    }

    /// Copy `from` and everything below it to `to`.
    pub fn copy_tree(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        if !self.exists(from) {
            return Err(FsError::Path(format!("{} not found", from.display())));
        }
        if self.exists(to) {
            return Err(FsError::Path(format!("{} already exists", to.display())));
        }

        let relocate = |p: &Path| -> Option<PathBuf> {
            p.strip_prefix(from).ok().map(|rel| {
                if rel.as_os_str().is_empty() {
                    to.to_path_buf()
                } else {
                    to.join(rel)
                }
            })
        };

        let new_dirs: Vec<PathBuf> = self
            .dirs
            .read()
            .unwrap()
            .iter()
            .filter_map(|p| relocate(p.as_path()))
            .collect();
        let new_files: Vec<(PathBuf, Vec<u8>)> = self
            .files
            .read()
            .unwrap()
            .iter()
            .filter_map(|(p, data)| relocate(p.as_path()).map(|np| (np, data.clone())))
            .collect();
        let new_mtimes: Vec<(PathBuf, SystemTime)> = self
            .mtimes
            .read()
            .unwrap()
            .iter()
            .filter_map(|(p, t)| relocate(p.as_path()).map(|np| (np, *t)))
            .collect();

        self.dirs.write().unwrap().extend(new_dirs);
        self.files.write().unwrap().extend(new_files);
        self.mtimes.write().unwrap().extend(new_mtimes);
        Ok(())
    }

    /// Remove `path` and everything below it. Missing paths are ignored.
    pub fn remove_tree(&self, path: &Path) {
        self.dirs.write().unwrap().retain(|p| !p.starts_with(path));
        self.files.write().unwrap().retain(|p, _| !p.starts_with(path));
        self.mtimes.write().unwrap().retain(|p, _| !p.starts_with(path));
    }
}

impl Filesystem for MockFilesystem {
    fn exists(&self, path: &Path) -> bool {
        self.dirs.read().unwrap().contains(path) || self.files.read().unwrap().contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.read().unwrap().contains(path)
    }

    fn list_dir(&self, dir: &Path) -> Result<Vec<PathBuf>, FsError> {
        if !self.is_dir(dir) {
            return Err(FsError::Io {
                path: dir.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "not a directory"),
            });
        }

        let is_child = |p: &&PathBuf| p.parent() == Some(dir);
        let mut entries: Vec<PathBuf> = self
            .dirs
            .read()
            .unwrap()
            .iter()
            .filter(is_child)
            .cloned()
            .collect();
        entries.extend(self.files.read().unwrap().keys().filter(is_child).cloned());
        entries.sort();
        Ok(entries)
    }

    fn modified(&self, path: &Path) -> Result<SystemTime, FsError> {
        if !self.exists(path) {
            return Err(FsError::Io {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "not found"),
            });
        }
        Ok(self
            .mtimes
            .read()
            .unwrap()
            .get(path)
            .copied()
            .unwrap_or(SystemTime::UNIX_EPOCH))
    }

    fn read_file(&self, path: &Path) -> Result<String, FsError> {
        let files = self.files.read().unwrap();
        match files.get(path) {
            Some(data) => String::from_utf8(data.clone())
                .map_err(|e| FsError::Path(format!("invalid utf8: {}", e))),
            None => Err(FsError::Io {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::NotFound, "file not found"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    // ===========================================
    // RealFilesystem
    // ===========================================

    #[test]
    fn test_real_is_dir() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("f");
        fs::write(&file, b"x").expect("write");

        let rfs = RealFilesystem;
        assert!(rfs.is_dir(dir.path()));
        assert!(!rfs.is_dir(&file));
        assert!(rfs.exists(&file));
        assert!(!rfs.exists(&dir.path().join("missing")));
    }

    #[test]
    fn test_real_list_dir_sorted() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("b")).expect("mkdir");
        fs::create_dir(dir.path().join("a")).expect("mkdir");
        fs::write(dir.path().join("c"), b"").expect("write");

        let entries = RealFilesystem.list_dir(dir.path()).expect("list");
        assert_eq!(
            entries,
            vec![dir.path().join("a"), dir.path().join("b"), dir.path().join("c")]
        );
    }

    #[test]
    fn test_real_list_dir_missing() {
        let dir = tempdir().expect("tempdir");
        let result = RealFilesystem.list_dir(&dir.path().join("nope"));
        assert!(matches!(result, Err(FsError::Io { .. })));
    }

    #[test]
    fn test_real_read_file() {
        let dir = tempdir().expect("tempdir");
        let file = dir.path().join("config.toml");
        fs::write(&file, "max_count = 3\n").expect("write");

        assert_eq!(RealFilesystem.read_file(&file).expect("read"), "max_count = 3\n");
    }

    #[test]
    fn test_real_modified() {
        let dir = tempdir().expect("tempdir");
        assert!(RealFilesystem.modified(dir.path()).is_ok());
    }

    // ===========================================
    // MockFilesystem
    // ===========================================

    #[test]
    fn test_mock_dirs_and_files() {
        let mfs = MockFilesystem::new();
        mfs.add_dir("/base");
        mfs.add_file("/base/f", b"data".to_vec());

        assert!(mfs.is_dir(Path::new("/base")));
        assert!(!mfs.is_dir(Path::new("/base/f")));
        assert!(mfs.exists(Path::new("/base/f")));
        assert_eq!(mfs.read_file(Path::new("/base/f")).expect("read"), "data");
    }

    #[test]
    fn test_mock_list_dir_only_children() {
        let mfs = MockFilesystem::new();
        mfs.add_dir("/base");
        mfs.add_dir("/base/snapshot.0");
        mfs.add_file("/base/snapshot.0/deep", vec![]);
        mfs.add_file("/base/stray", vec![]);

        let entries = mfs.list_dir(Path::new("/base")).expect("list");
        assert_eq!(
            entries,
            vec![PathBuf::from("/base/snapshot.0"), PathBuf::from("/base/stray")]
        );
    }

    #[test]
    fn test_mock_rename_tree() {
        let mfs = MockFilesystem::new();
        mfs.add_dir("/base/snapshot.0");
        mfs.add_dir("/base/snapshot.0/etc");
        mfs.add_file("/base/snapshot.0/etc/hosts", b"127.0.0.1".to_vec());

        mfs.rename_tree(Path::new("/base/snapshot.0"), Path::new("/base/snapshot.1"))
            .expect("rename");

        assert!(!mfs.exists(Path::new("/base/snapshot.0")));
        assert!(mfs.is_dir(Path::new("/base/snapshot.1/etc")));
        assert_eq!(
            mfs.get_file(Path::new("/base/snapshot.1/etc/hosts")),
            Some(b"127.0.0.1".to_vec())
        );
    }

    #[test]
    fn test_mock_rename_does_not_touch_sibling_prefixes() {
        let mfs = MockFilesystem::new();
        mfs.add_dir("/base/snapshot.1");
        mfs.add_dir("/base/snapshot.10");

        mfs.rename_tree(Path::new("/base/snapshot.1"), Path::new("/base/snapshot.2"))
            .expect("rename");

        assert!(mfs.is_dir(Path::new("/base/snapshot.10")));
        assert!(mfs.is_dir(Path::new("/base/snapshot.2")));
    }

    #[test]
    fn test_mock_copy_tree_refuses_existing() {
        let mfs = MockFilesystem::new();
        mfs.add_dir("/a");
        mfs.add_dir("/b");
        assert!(mfs.copy_tree(Path::new("/a"), Path::new("/b")).is_err());
    }

    #[test]
    fn test_mock_copy_tree_keeps_source() {
        let mfs = MockFilesystem::new();
        mfs.add_dir("/a");
        mfs.add_file("/a/x", b"1".to_vec());

        mfs.copy_tree(Path::new("/a"), Path::new("/b")).expect("copy");

        assert_eq!(mfs.get_file(Path::new("/a/x")), Some(b"1".to_vec()));
        assert_eq!(mfs.get_file(Path::new("/b/x")), Some(b"1".to_vec()));
    }

    #[test]
    fn test_mock_remove_tree() {
        let mfs = MockFilesystem::new();
        mfs.add_dir("/a");
        mfs.add_file("/a/x", vec![]);
        mfs.remove_tree(Path::new("/a"));
        assert!(!mfs.exists(Path::new("/a")));
        assert!(!mfs.exists(Path::new("/a/x")));
        // Missing paths are fine
        mfs.remove_tree(Path::new("/a"));
    }

    #[test]
    fn test_mock_modified_default_and_set() {
        let mfs = MockFilesystem::new();
        mfs.add_dir("/a");
        assert_eq!(mfs.modified(Path::new("/a")).expect("mtime"), SystemTime::UNIX_EPOCH);

        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        mfs.set_modified("/a", t);
        assert_eq!(mfs.modified(Path::new("/a")).expect("mtime"), t);
        assert!(mfs.modified(Path::new("/missing")).is_err());
    }

    #[test]
    fn test_mock_clone_shares_state() {
        let mfs = MockFilesystem::new();
        let other = mfs.clone();
        other.add_dir("/shared");
        assert!(mfs.is_dir(Path::new("/shared")));
    }
}

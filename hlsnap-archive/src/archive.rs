//! Rotating snapshot archive.
//!
//! An archive is a base directory holding up to `max_count` snapshot
//! directories named `SUBDIR.0` (newest) through `SUBDIR.(max_count-1)`
//! (oldest). Occupancy is never cached: every operation re-checks the
//! filesystem, so external cleanup between calls is always observed.
//!
//! Mutations run as external commands:
//! - move: `mv SRC DST`
//! - copy: `cp --archive --link SRC DST` (hard-link clone)
//! - delete: `rm --recursive --force PATH`

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use hlsnap_exec::{CommandError, CommandLine, ProcessRunner};
use thiserror::Error;

use crate::fs::{Filesystem, FsError};

/// Default snapshot directory prefix.
pub const DEFAULT_SUBDIR_NAME: &str = "snapshot";

/// Errors from archive operations.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("{} doesn't exist", .0.display())]
    MissingBase(PathBuf),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("max count must be at least 1, got {0}")]
    InvalidMaxCount(usize),

    #[error("invalid snapshot directory name {0:?}")]
    InvalidSubdirName(String),

    #[error("{} already exists", .0.display())]
    SlotOccupied(PathBuf),

    #[error("slot {suffix} is out of range for an archive of {max_count} slots")]
    SlotOutOfRange { suffix: usize, max_count: usize },

    #[error("{0}")]
    Command(#[from] CommandError),

    #[error(transparent)]
    Fs(#[from] FsError),
}

impl ArchiveError {
    /// The command failure behind this error, if any.
    pub fn command_error(&self) -> Option<&CommandError> {
        match self {
            ArchiveError::Command(e) => Some(e),
            _ => None,
        }
    }
}

/// Result of a shift (rotation).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShiftReport {
    /// Oldest slot deleted to make room, if it was occupied.
    pub evicted: Option<usize>,

    /// `(from, to)` moves performed, oldest first.
    pub moved: Vec<(usize, usize)>,
}

/// Result of a compaction.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompactReport {
    /// `(from, to)` moves performed, newest first.
    pub moved: Vec<(usize, usize)>,
}

impl CompactReport {
    /// True when the archive was already contiguous.
    pub fn is_noop(&self) -> bool {
        self.moved.is_empty()
    }
}

/// An occupied slot as observed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotInfo {
    pub suffix: usize,
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Fixed-depth rotating index of snapshot directories.
#[derive(Debug, Clone)]
pub struct Archive<R, F> {
    base: PathBuf,
    subdir: String,
    max_count: usize,
    runner: R,
    fs: F,
}

impl<R: ProcessRunner, F: Filesystem> Archive<R, F> {
    /// Open an archive with the default `snapshot` directory prefix.
    pub fn new(
        base: impl Into<PathBuf>,
        max_count: usize,
        runner: R,
        fs: F,
    ) -> Result<Self, ArchiveError> {
        Self::open(base, DEFAULT_SUBDIR_NAME, max_count, runner, fs)
    }

    /// Open an archive.
    ///
    /// Validates the configuration and that `base` is an existing directory.
    /// Nothing on disk is created or changed.
    pub fn open(
        base: impl Into<PathBuf>,
        subdir: impl Into<String>,
        max_count: usize,
        runner: R,
        fs: F,
    ) -> Result<Self, ArchiveError> {
        let base = base.into();
        let subdir = subdir.into();

        if max_count == 0 {
            return Err(ArchiveError::InvalidMaxCount(max_count));
        }
        if subdir.is_empty() || subdir.contains('/') || subdir == "." || subdir == ".." {
            return Err(ArchiveError::InvalidSubdirName(subdir));
        }
        if !fs.exists(&base) {
            return Err(ArchiveError::MissingBase(base));
        }
        if !fs.is_dir(&base) {
            return Err(ArchiveError::NotADirectory(base));
        }

        Ok(Self {
            base,
            subdir,
            max_count,
            runner,
            fs,
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn subdir_name(&self) -> &str {
        &self.subdir
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Path of the slot with the given suffix: `BASE/SUBDIR.suffix`.
    pub fn dir(&self, suffix: usize) -> PathBuf {
        self.base.join(format!("{}.{}", self.subdir, suffix))
    }

    /// True iff the slot is currently a directory.
    pub fn exists(&self, suffix: usize) -> bool {
        self.fs.is_dir(&self.dir(suffix))
    }

    /// Occupied suffixes within `0..max_count`, ascending.
    pub fn occupied(&self) -> Vec<usize> {
        (0..self.max_count).filter(|&s| self.exists(s)).collect()
    }

    /// Rename slot `from` to slot `to`. Never overwrites an occupied slot.
    pub fn move_slot(&self, from: usize, to: usize) -> Result<(), ArchiveError> {
        self.check_range(from)?;
        self.check_range(to)?;
        self.check_free(to)?;

        let cmd = CommandLine::new("mv").arg(self.dir(from)).arg(self.dir(to));
        self.runner.execute(&cmd)?;
        Ok(())
    }

    /// Hard-link clone of slot `from` into slot `to`. Never overwrites an
    /// occupied slot.
    pub fn copy_slot(&self, from: usize, to: usize) -> Result<(), ArchiveError> {
        self.check_range(from)?;
        self.check_range(to)?;
        self.check_free(to)?;

        let cmd = CommandLine::new("cp")
            .arg("--archive")
            .arg("--link")
            .arg(self.dir(from))
            .arg(self.dir(to));
        self.runner.execute(&cmd)?;
        Ok(())
    }

    /// Recursively remove a slot.
    pub fn delete_slot(&self, suffix: usize) -> Result<(), ArchiveError> {
        self.check_range(suffix)?;
        self.remove_path(&self.dir(suffix))
    }

    /// Rotate slots upward, evicting the oldest.
    ///
    /// Deletes slot `max_count-1` if present, then for each suffix from
    /// `max_count-1` down to `upto+1` moves slot `suffix-1` into it when
    /// occupied. Oldest-first ordering guarantees each destination has been
    /// vacated before it is filled. Missing sources leave gaps.
    pub fn shift(&self, upto: usize) -> Result<ShiftReport, ArchiveError> {
        let oldest = self.max_count - 1;
        let mut report = ShiftReport::default();

        if self.exists(oldest) {
            self.delete_slot(oldest)?;
            report.evicted = Some(oldest);
        }

        for suffix in (upto + 1..=oldest).rev() {
            if self.exists(suffix - 1) {
                self.move_slot(suffix - 1, suffix)?;
                report.moved.push((suffix - 1, suffix));
            }
        }

        Ok(report)
    }

    /// Close gaps so occupied slots are contiguous from 0, keeping their
    /// relative order.
    pub fn compact(&self) -> Result<CompactReport, ArchiveError> {
        let mut report = CompactReport::default();
        let mut target = 0;

        for suffix in 0..self.max_count {
            if self.exists(suffix) {
                if suffix != target {
                    self.move_slot(suffix, target)?;
                    report.moved.push((suffix, target));
                }
                target += 1;
            }
        }

        Ok(report)
    }

    /// Remove slot-named entries beyond `max_count` (e.g. `snapshot.9` after
    /// lowering the count to 7). Other entries in the base are left alone,
    /// including names that only look numeric such as `snapshot.01`.
    pub fn purge(&self) -> Result<Vec<PathBuf>, ArchiveError> {
        let keep: BTreeSet<PathBuf> = (0..self.max_count).map(|s| self.dir(s)).collect();
        let mut removed = Vec::new();

        for path in self.fs.list_dir(&self.base)? {
            // Suffixes too large for usize are still beyond max_count
            if keep.contains(&path) || self.slot_digits(&path).is_none() {
                continue;
            }
            self.remove_path(&path)?;
            removed.push(path);
        }

        Ok(removed)
    }

    /// Occupied slots with their modification times, newest slot first.
    pub fn slot_info(&self) -> Result<Vec<SlotInfo>, ArchiveError> {
        let mut slots = Vec::new();
        for suffix in self.occupied() {
            let path = self.dir(suffix);
            let modified = self.fs.modified(&path)?;
            slots.push(SlotInfo {
                suffix,
                path,
                modified,
            });
        }
        Ok(slots)
    }

    /// Parse the suffix out of a `BASE/SUBDIR.N` path. Only the exact form
    /// `dir` produces is accepted, so `snapshot.01` has no suffix.
    pub fn slot_suffix(&self, path: &Path) -> Option<usize> {
        self.slot_digits(path)?.parse().ok()
    }

    fn slot_digits<'p>(&self, path: &'p Path) -> Option<&'p str> {
        if path.parent() != Some(self.base.as_path()) {
            return None;
        }
        let name = path.file_name()?.to_str()?;
        let digits = name.strip_prefix(self.subdir.as_str())?.strip_prefix('.')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if digits.len() > 1 && digits.starts_with('0') {
            return None;
        }
        Some(digits)
    }

    fn remove_path(&self, path: &Path) -> Result<(), ArchiveError> {
        let cmd = CommandLine::new("rm")
            .arg("--recursive")
            .arg("--force")
            .arg(path);
        self.runner.execute(&cmd)?;
        Ok(())
    }

    fn check_range(&self, suffix: usize) -> Result<(), ArchiveError> {
        if suffix >= self.max_count {
            return Err(ArchiveError::SlotOutOfRange {
                suffix,
                max_count: self.max_count,
            });
        }
        Ok(())
    }

    fn check_free(&self, suffix: usize) -> Result<(), ArchiveError> {
        if self.exists(suffix) {
            return Err(ArchiveError::SlotOccupied(self.dir(suffix)));
        }
        Ok(())
    }
}

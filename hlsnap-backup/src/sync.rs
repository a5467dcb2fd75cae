//! Sync tool invocation.
//!
//! The sync tool mirrors one or more sources into a destination directory:
//!
//! ```text
//! rsync --archive --delete --delete-excluded [--exclude=PATTERN]... SOURCE... DEST
//! ```
//!
//! `SyncCommand` keeps flags, excludes, sources and destination apart and
//! always renders them in that order, whatever order the builder was called in.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use hlsnap_exec::{CommandLine, ExitPolicy};

/// Sync program used when none is configured.
pub const DEFAULT_SYNC_PROGRAM: &str = "rsync";

/// rsync: partial transfer due to error.
pub const RSYNC_PARTIAL_TRANSFER: i32 = 23;

/// rsync: partial transfer because source files vanished.
pub const RSYNC_VANISHED_SOURCE: i32 = 24;

/// The external sync program and how its exit codes are judged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTool {
    program: OsString,
    exit_policy: ExitPolicy,
}

impl Default for SyncTool {
    fn default() -> Self {
        Self {
            program: OsString::from(DEFAULT_SYNC_PROGRAM),
            exit_policy: ExitPolicy::tolerating([RSYNC_PARTIAL_TRANSFER, RSYNC_VANISHED_SOURCE]),
        }
    }
}

impl SyncTool {
    pub fn new(program: impl Into<OsString>, exit_policy: ExitPolicy) -> Self {
        Self {
            program: program.into(),
            exit_policy,
        }
    }

    /// Builder: use a different program (e.g. `/usr/bin/rsync`).
    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    /// Builder: replace the exit code allow-list.
    pub fn with_exit_policy(mut self, exit_policy: ExitPolicy) -> Self {
        self.exit_policy = exit_policy;
        self
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }

    pub fn exit_policy(&self) -> &ExitPolicy {
        &self.exit_policy
    }
}

/// Mirror-mode flags, rendered before everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncFlag {
    /// Recurse and preserve metadata.
    Archive,
    /// Delete destination paths missing from the sources.
    Delete,
    /// Also delete destination paths matching an exclude pattern.
    DeleteExcluded,
}

impl SyncFlag {
    pub fn as_arg(&self) -> &'static str {
        match self {
            SyncFlag::Archive => "--archive",
            SyncFlag::Delete => "--delete",
            SyncFlag::DeleteExcluded => "--delete-excluded",
        }
    }
}

/// A sync invocation under construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCommand {
    program: OsString,
    flags: Vec<SyncFlag>,
    excludes: Vec<String>,
    sources: Vec<PathBuf>,
    destination: PathBuf,
}

impl SyncCommand {
    /// Mirror into `destination` with `--archive --delete --delete-excluded`.
    pub fn mirror(tool: &SyncTool, destination: impl Into<PathBuf>) -> Self {
        Self {
            program: tool.program.clone(),
            flags: vec![SyncFlag::Archive, SyncFlag::Delete, SyncFlag::DeleteExcluded],
            excludes: Vec::new(),
            sources: Vec::new(),
            destination: destination.into(),
        }
    }

    /// Builder: add one exclude pattern.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excludes.push(pattern.into());
        self
    }

    /// Builder: add exclude patterns, preserving their order.
    pub fn excludes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Builder: add one source path.
    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(path.into());
        self
    }

    /// Builder: add source paths, preserving their order.
    pub fn sources<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.sources.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Render as flags, excludes, sources, destination.
    pub fn to_command_line(&self) -> CommandLine {
        CommandLine::new(self.program.clone())
            .args(self.flags.iter().map(SyncFlag::as_arg))
            .args(self.excludes.iter().map(|p| format!("--exclude={}", p)))
            .args(&self.sources)
            .arg(&self.destination)
    }
}

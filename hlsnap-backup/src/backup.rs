//! One backup cycle.
//!
//! Steps, each aborting the run on failure:
//! 1. compact (optional)
//! 2. rotate: `shift(1)` frees slot 1 and evicts the oldest
//! 3. clone: hard-link copy of slot 0 into slot 1, when slot 0 exists
//! 4. sync: mirror the sources into slot 0
//! 5. touch slot 0 so its mtime records the capture time
//! 6. purge stale slots (optional)
//!
//! Nothing is rolled back. A failed run leaves the archive as the completed
//! steps left it; the next run resumes from there. An interrupted run stops
//! at the next step boundary the same way.

use std::fmt;
use std::path::{Path, PathBuf};

use hlsnap_archive::{Archive, ArchiveError, CompactReport, Filesystem, ShiftReport};
use hlsnap_exec::{CommandError, CommandLine, Outcome, ProcessRunner};
use thiserror::Error;

use crate::sync::{SyncCommand, SyncTool};

/// Steps of a backup run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupStep {
    Compact,
    Rotate,
    Clone,
    Sync,
    Touch,
    Purge,
}

impl fmt::Display for BackupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackupStep::Compact => "compact",
            BackupStep::Rotate => "rotate",
            BackupStep::Clone => "clone",
            BackupStep::Sync => "sync",
            BackupStep::Touch => "touch",
            BackupStep::Purge => "purge",
        };
        f.write_str(name)
    }
}

/// Errors from a backup run.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("no source paths configured")]
    NoSources,

    #[error("compaction failed: {0}")]
    Compact(#[source] ArchiveError),

    #[error("rotation failed: {0}")]
    Rotate(#[source] ArchiveError),

    #[error("cloning latest snapshot failed: {0}")]
    Clone(#[source] ArchiveError),

    #[error("sync into {} failed: {source}", .destination.display())]
    Sync {
        destination: PathBuf,
        #[source]
        source: CommandError,
    },

    #[error("updating timestamp of {} failed: {source}", .destination.display())]
    Touch {
        destination: PathBuf,
        #[source]
        source: CommandError,
    },

    #[error("purge failed: {0}")]
    Purge(#[source] ArchiveError),

    #[error("interrupted before {0}")]
    Interrupted(BackupStep),
}

impl BackupError {
    /// The step that failed.
    pub fn step(&self) -> Option<BackupStep> {
        match self {
            BackupError::NoSources => None,
            BackupError::Compact(_) => Some(BackupStep::Compact),
            BackupError::Rotate(_) => Some(BackupStep::Rotate),
            BackupError::Clone(_) => Some(BackupStep::Clone),
            BackupError::Sync { .. } => Some(BackupStep::Sync),
            BackupError::Touch { .. } => Some(BackupStep::Touch),
            BackupError::Purge(_) => Some(BackupStep::Purge),
            BackupError::Interrupted(step) => Some(*step),
        }
    }

    /// The external command failure behind this error, if any.
    pub fn command_error(&self) -> Option<&CommandError> {
        match self {
            BackupError::NoSources | BackupError::Interrupted(_) => None,
            BackupError::Compact(e)
            | BackupError::Rotate(e)
            | BackupError::Clone(e)
            | BackupError::Purge(e) => e.command_error(),
            BackupError::Sync { source, .. } | BackupError::Touch { source, .. } => Some(source),
        }
    }
}

/// What to back up and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPlan {
    sources: Vec<PathBuf>,
    excludes: Vec<String>,
    sync: SyncTool,
    compact_first: bool,
    purge_after: bool,
}

impl BackupPlan {
    /// Create a plan with the default sync tool. At least one source is required.
    pub fn new<I, P>(sources: I) -> Result<Self, BackupError>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let sources: Vec<PathBuf> = sources.into_iter().map(Into::into).collect();
        if sources.is_empty() {
            return Err(BackupError::NoSources);
        }
        Ok(Self {
            sources,
            excludes: Vec::new(),
            sync: SyncTool::default(),
            compact_first: false,
            purge_after: false,
        })
    }

    /// Builder: set exclude patterns (order is kept).
    pub fn with_excludes<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: set the sync tool.
    pub fn with_sync_tool(mut self, sync: SyncTool) -> Self {
        self.sync = sync;
        self
    }

    /// Builder: compact the archive before rotating.
    pub fn with_compact_first(mut self, compact_first: bool) -> Self {
        self.compact_first = compact_first;
        self
    }

    /// Builder: purge stale slots after a successful sync.
    pub fn with_purge_after(mut self, purge_after: bool) -> Self {
        self.purge_after = purge_after;
        self
    }

    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    pub fn sync_tool(&self) -> &SyncTool {
        &self.sync
    }

    pub fn compact_first(&self) -> bool {
        self.compact_first
    }

    pub fn purge_after(&self) -> bool {
        self.purge_after
    }

    /// The sync invocation that fills `destination`.
    pub fn sync_command(&self, destination: impl Into<PathBuf>) -> SyncCommand {
        SyncCommand::mirror(&self.sync, destination)
            .excludes(self.excludes.iter().cloned())
            .sources(self.sources.iter().cloned())
    }
}

/// Result of a successful backup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    /// Compaction performed before rotating, when enabled.
    pub compacted: Option<CompactReport>,

    /// Rotation performed.
    pub shift: ShiftReport,

    /// Whether slot 0 was cloned into slot 1.
    pub cloned: bool,

    /// How the sync tool exited.
    pub sync: Outcome,

    /// Slot 0 path that received the new snapshot.
    pub destination: PathBuf,

    /// Stale slots removed, when purging is enabled.
    pub purged: Vec<PathBuf>,
}

/// One backup cycle over an archive.
#[derive(Debug)]
pub struct Backup<R, F> {
    archive: Archive<R, F>,
    plan: BackupPlan,
}

impl<R: ProcessRunner, F: Filesystem> Backup<R, F> {
    pub fn new(archive: Archive<R, F>, plan: BackupPlan) -> Self {
        Self { archive, plan }
    }

    pub fn archive(&self) -> &Archive<R, F> {
        &self.archive
    }

    pub fn plan(&self) -> &BackupPlan {
        &self.plan
    }

    /// Run one cycle. The first failure aborts the run.
    pub fn run(&self) -> Result<BackupReport, BackupError> {
        self.run_until(|| false)
    }

    /// Run one cycle, checking `stop` before each step. Once it returns
    /// true the run ends with `BackupError::Interrupted`.
    pub fn run_until<S>(&self, stop: S) -> Result<BackupReport, BackupError>
    where
        S: Fn() -> bool,
    {
        let checkpoint = |step| {
            if stop() {
                Err(BackupError::Interrupted(step))
            } else {
                Ok(())
            }
        };

        let compacted = if self.plan.compact_first {
            checkpoint(BackupStep::Compact)?;
            Some(self.archive.compact().map_err(BackupError::Compact)?)
        } else {
            None
        };

        checkpoint(BackupStep::Rotate)?;
        let shift = self.archive.shift(1).map_err(BackupError::Rotate)?;

        // Slot 1 is free after the shift; absent slot 0 means first run
        let cloned = if self.archive.exists(0) {
            checkpoint(BackupStep::Clone)?;
            self.archive
                .copy_slot(0, 1)
                .map_err(BackupError::Clone)?;
            true
        } else {
            false
        };

        let destination = self.archive.dir(0);
        checkpoint(BackupStep::Sync)?;
        let sync = self.sync_into(&destination)?;
        self.touch(&destination)?;

        let purged = if self.plan.purge_after {
            checkpoint(BackupStep::Purge)?;
            self.archive.purge().map_err(BackupError::Purge)?
        } else {
            Vec::new()
        };

        Ok(BackupReport {
            compacted,
            shift,
            cloned,
            sync,
            destination,
            purged,
        })
    }

    fn sync_into(&self, destination: &Path) -> Result<Outcome, BackupError> {
        let cmd = self.plan.sync_command(destination).to_command_line();
        self.archive
            .runner()
            .execute_with(&cmd, self.plan.sync.exit_policy())
            .map_err(|source| BackupError::Sync {
                destination: destination.to_path_buf(),
                source,
            })
    }

    fn touch(&self, destination: &Path) -> Result<(), BackupError> {
        let cmd = CommandLine::new("touch").arg(destination);
        self.archive
            .runner()
            .execute(&cmd)
            .map_err(|source| BackupError::Touch {
                destination: destination.to_path_buf(),
                source,
            })
    }
}

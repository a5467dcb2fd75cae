//! Command orchestration for CLI subcommands.
//!
//! Provides execute functions for:
//! - `backup` - mount, rotate, clone, sync, unmount
//! - `compact` - close gaps in the archive
//! - `list` - describe the snapshots on disk

pub mod backup;
pub mod compact;
pub mod list;

pub use backup::{execute_backup, BackupSummary};
pub use compact::{execute_compact, CompactSummary};
pub use list::{execute_list, render_json, render_table, SnapshotEntry};

use hlsnap_archive::{Archive, ArchiveError, Filesystem};
use hlsnap_backup::BackupError;
use hlsnap_exec::{CommandError, CommandLine, Completion, ElevatedRunner, ProcessRunner};
use hlsnap_mount::{AcquireError, Mount, MountError, ScopedError};
use thiserror::Error;

use crate::cli::CliError;
use crate::config::{ArchiveSettings, ConfigError};
use crate::logger::Logger;

/// Errors from command execution.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] CliError),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("backup failed: {0}")]
    Backup(#[from] BackupError),

    #[error("{0}")]
    Mount(#[from] AcquireError),

    #[error("{0}")]
    Release(MountError),

    /// The command failed and the device could not be unmounted afterwards.
    #[error("{error} (and {release})")]
    Unreleased {
        #[source]
        error: Box<AppError>,
        release: MountError,
    },

    #[error("output error: {0}")]
    Output(#[from] serde_json::Error),
}

impl From<ScopedError<AppError>> for AppError {
    fn from(err: ScopedError<AppError>) -> Self {
        match err {
            ScopedError::Acquire(e) => AppError::Mount(e),
            ScopedError::Operation {
                error,
                release: None,
            } => error,
            ScopedError::Operation {
                error,
                release: Some(release),
            } => AppError::Unreleased {
                error: Box::new(error),
                release,
            },
            ScopedError::Release(e) => AppError::Release(e),
        }
    }
}

/// Result of command execution.
pub type AppResult<T> = Result<T, AppError>;

/// Run `op` with the archive device mounted, if one is configured.
///
/// Mount and umount go through sudo when `settings.sudo` is set; the
/// archive's own commands never do.
pub(crate) fn with_mounted<R, L, T, Op>(
    settings: &ArchiveSettings,
    runner: &R,
    logger: &L,
    op: Op,
) -> AppResult<T>
where
    R: ProcessRunner,
    L: Logger,
    Op: FnOnce() -> AppResult<T>,
{
    let Some(device) = settings.device.as_deref() else {
        return op();
    };

    logger.verbose(&format!(
        "Mounting {} on {}",
        device,
        settings.dest.display()
    ));
    let result = if settings.sudo {
        Mount::new(device, &settings.dest, ElevatedRunner::new(runner)).scoped(op)
    } else {
        Mount::new(device, &settings.dest, runner).scoped(op)
    };

    match &result {
        Ok(_) | Err(ScopedError::Operation { release: None, .. }) => {
            logger.verbose(&format!("Unmounted {}", settings.dest.display()));
        }
        _ => {}
    }
    result.map_err(AppError::from)
}

/// Runner that logs each command at debug level before running it.
pub struct LoggedRunner<'a, R, L> {
    inner: &'a R,
    logger: &'a L,
}

impl<'a, R: ProcessRunner, L: Logger> LoggedRunner<'a, R, L> {
    pub fn new(inner: &'a R, logger: &'a L) -> Self {
        Self { inner, logger }
    }
}

impl<R: ProcessRunner, L: Logger> ProcessRunner for LoggedRunner<'_, R, L> {
    fn run(&self, command: &CommandLine) -> Result<Completion, CommandError> {
        self.logger.debug(&format!("$ {}", command));
        self.inner.run(command)
    }
}

/// Open the archive described by `settings`.
pub(crate) fn open_archive<R, F>(
    settings: &ArchiveSettings,
    runner: R,
    fs: F,
) -> AppResult<Archive<R, F>>
where
    R: ProcessRunner,
    F: Filesystem,
{
    let archive = Archive::open(
        &settings.dest,
        settings.subdir.as_str(),
        settings.max_count,
        runner,
        fs,
    )?;
    Ok(archive)
}

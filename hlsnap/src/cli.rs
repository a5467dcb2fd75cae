//! CLI argument parsing for hlsnap.
//!
//! Subcommands:
//! - `backup` - rotate the archive and take a new snapshot
//! - `compact` - close gaps left by deleted snapshots
//! - `list` - show the snapshots currently in the archive
//!
//! Every option that describes the archive may also come from a TOML file
//! given with `--config`; values on the command line win.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use thiserror::Error;

/// Snapshots kept when no count is configured.
pub const DEFAULT_MAX_COUNT: usize = 7;

/// Prefix of snapshot directory names.
pub const DEFAULT_SUBDIR: &str = hlsnap_archive::DEFAULT_SUBDIR_NAME;

/// Sync program used when none is configured.
pub const DEFAULT_RSYNC: &str = hlsnap_backup::DEFAULT_SYNC_PROGRAM;

/// Errors from argument validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("max-count must be at least 1, got {0}")]
    InvalidMaxCount(usize),

    #[error("subdir must be a plain directory name, got {0:?}")]
    InvalidSubdir(String),

    #[error("tolerated exit codes must be between 0 and 255, got {0}")]
    InvalidExitCode(i32),

    #[error("no archive directory given (use --dest or set dest in the config file)")]
    MissingDestination,

    #[error("no source paths given (use --source or set sources in the config file)")]
    NoSources,
}

/// Rotating hard-link snapshot backups.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "hlsnap")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase log output (-v verbose, -vv debug).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Rotate the archive and sync the sources into a new snapshot.
    Backup(BackupArgs),
    /// Renumber snapshots so they occupy slots 0..N without gaps.
    Compact(CompactArgs),
    /// List snapshots, newest first.
    List(ListArgs),
}

/// Options shared by every command that opens an archive.
#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct ArchiveArgs {
    /// TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Archive directory holding the snapshots (mount point when --device is set).
    #[arg(short, long)]
    pub dest: Option<PathBuf>,

    /// Snapshot directory name prefix.
    #[arg(long)]
    pub subdir: Option<String>,

    /// Number of snapshots to keep.
    #[arg(short = 'n', long)]
    pub max_count: Option<usize>,

    /// Device to mount on the archive directory while working.
    #[arg(long)]
    pub device: Option<String>,

    /// Run mount and umount through sudo.
    #[arg(long, overrides_with = "no_sudo")]
    pub sudo: bool,

    /// Run mount and umount directly, overriding `sudo = true` in the config.
    #[arg(long, overrides_with = "sudo")]
    pub no_sudo: bool,
}

impl ArchiveArgs {
    /// Validate the values given on the command line.
    pub fn validate(&self) -> Result<(), CliError> {
        if let Some(n) = self.max_count {
            validate_max_count(n)?;
        }
        if let Some(name) = &self.subdir {
            validate_subdir(name)?;
        }
        Ok(())
    }
}

/// Arguments for the backup command.
#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct BackupArgs {
    #[command(flatten)]
    pub archive: ArchiveArgs,

    /// Path to back up (repeatable, passed to rsync in order).
    #[arg(short, long = "source")]
    pub sources: Vec<PathBuf>,

    /// rsync exclude pattern (repeatable).
    #[arg(short, long = "exclude")]
    pub excludes: Vec<String>,

    /// Sync program.
    #[arg(long)]
    pub rsync: Option<String>,

    /// Sync exit code treated as success (repeatable; default 23 and 24, 0 for none).
    #[arg(long = "tolerate")]
    pub tolerate: Vec<i32>,

    /// Compact the archive before rotating.
    #[arg(long, overrides_with = "no_compact")]
    pub compact: bool,

    #[arg(long, overrides_with = "compact", hide = true)]
    pub no_compact: bool,

    /// Remove stale snapshots beyond max-count after the run.
    #[arg(long, overrides_with = "no_purge")]
    pub purge: bool,

    #[arg(long, overrides_with = "purge", hide = true)]
    pub no_purge: bool,
}

impl BackupArgs {
    /// Validate the arguments.
    pub fn validate(&self) -> Result<(), CliError> {
        self.archive.validate()?;
        validate_exit_codes(&self.tolerate)
    }
}

/// Arguments for the compact command.
#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct CompactArgs {
    #[command(flatten)]
    pub archive: ArchiveArgs,

    /// Also remove stale snapshots beyond max-count.
    #[arg(long, overrides_with = "no_purge")]
    pub purge: bool,

    #[arg(long, overrides_with = "purge", hide = true)]
    pub no_purge: bool,
}

impl CompactArgs {
    pub fn validate(&self) -> Result<(), CliError> {
        self.archive.validate()
    }
}

/// Arguments for the list command.
#[derive(Args, Debug, Clone, PartialEq, Eq, Default)]
pub struct ListArgs {
    #[command(flatten)]
    pub archive: ArchiveArgs,

    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

impl ListArgs {
    pub fn validate(&self) -> Result<(), CliError> {
        self.archive.validate()
    }
}

pub(crate) fn validate_max_count(n: usize) -> Result<(), CliError> {
    if n == 0 {
        return Err(CliError::InvalidMaxCount(n));
    }
    Ok(())
}

pub(crate) fn validate_subdir(name: &str) -> Result<(), CliError> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(CliError::InvalidSubdir(name.to_string()));
    }
    Ok(())
}

pub(crate) fn validate_exit_codes(codes: &[i32]) -> Result<(), CliError> {
    match codes.iter().find(|c| !(0..=255).contains(*c)) {
        Some(&code) => Err(CliError::InvalidExitCode(code)),
        None => Ok(()),
    }
}

/// Parse arguments without exiting on error.
pub fn parse_from<I, T>(iter: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(iter)
}

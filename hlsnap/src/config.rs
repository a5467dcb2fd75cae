//! Configuration file and settings resolution.
//!
//! A TOML file may describe the archive and the backup job:
//!
//! ```toml
//! dest = "/home/user/.backup/disk"
//! device = "UUID=4d29d023-ed3a-40d7-8855-f63c1ec803ce"
//! sudo = true
//! max_count = 36
//! sources = ["/home/user/"]
//! excludes = ["/.cache/", "/.mozilla/"]
//! ```
//!
//! Command-line values override file values. List options given on the
//! command line replace the file's list rather than extending it. Each
//! switch has a `--no-` form that turns off a value set to true in the file.

use std::path::{Path, PathBuf};

use hlsnap_archive::{Filesystem, FsError};
use hlsnap_backup::{RSYNC_PARTIAL_TRANSFER, RSYNC_VANISHED_SOURCE};
use hlsnap_exec::ExitPolicy;
use serde::Deserialize;
use thiserror::Error;

use crate::cli::{
    validate_exit_codes, validate_max_count, validate_subdir, ArchiveArgs, BackupArgs, CliError,
    DEFAULT_MAX_COUNT, DEFAULT_RSYNC, DEFAULT_SUBDIR,
};

/// Errors loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Read(#[from] FsError),

    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Contents of the TOML configuration file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub dest: Option<PathBuf>,
    pub subdir: Option<String>,
    pub max_count: Option<usize>,
    pub device: Option<String>,
    pub sudo: Option<bool>,
    pub sources: Option<Vec<PathBuf>>,
    pub excludes: Option<Vec<String>>,
    pub rsync: Option<String>,
    pub tolerate: Option<Vec<i32>>,
    pub compact: Option<bool>,
    pub purge: Option<bool>,
}

/// Parse configuration text.
pub fn parse_config(path: &Path, text: &str) -> Result<FileConfig, ConfigError> {
    toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and parse the configuration file at `path`.
pub fn load_config<F: Filesystem>(fs: &F, path: &Path) -> Result<FileConfig, ConfigError> {
    let text = fs.read_file(path)?;
    parse_config(path, &text)
}

/// Load the file named by `--config`, or an empty configuration.
pub fn load_optional<F: Filesystem>(
    fs: &F,
    path: Option<&Path>,
) -> Result<FileConfig, ConfigError> {
    match path {
        Some(path) => load_config(fs, path),
        None => Ok(FileConfig::default()),
    }
}

/// Where the archive lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveSettings {
    pub dest: PathBuf,
    pub subdir: String,
    pub max_count: usize,
    pub device: Option<String>,
    pub sudo: bool,
}

impl ArchiveSettings {
    pub fn resolve(args: &ArchiveArgs, file: &FileConfig) -> Result<Self, CliError> {
        let dest = args
            .dest
            .clone()
            .or_else(|| file.dest.clone())
            .ok_or(CliError::MissingDestination)?;

        let subdir = args
            .subdir
            .clone()
            .or_else(|| file.subdir.clone())
            .unwrap_or_else(|| DEFAULT_SUBDIR.to_string());
        validate_subdir(&subdir)?;

        let max_count = args
            .max_count
            .or(file.max_count)
            .unwrap_or(DEFAULT_MAX_COUNT);
        validate_max_count(max_count)?;

        Ok(Self {
            dest,
            subdir,
            max_count,
            device: args.device.clone().or_else(|| file.device.clone()),
            sudo: switch(args.sudo, args.no_sudo, file.sudo),
        })
    }
}

/// Everything a backup run needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSettings {
    pub archive: ArchiveSettings,
    pub sources: Vec<PathBuf>,
    pub excludes: Vec<String>,
    pub rsync: String,
    pub exit_policy: ExitPolicy,
    pub compact: bool,
    pub purge: bool,
}

impl BackupSettings {
    pub fn resolve(args: &BackupArgs, file: &FileConfig) -> Result<Self, CliError> {
        let archive = ArchiveSettings::resolve(&args.archive, file)?;

        let sources = prefer(&args.sources, &file.sources);
        if sources.is_empty() {
            return Err(CliError::NoSources);
        }

        let tolerate = match (args.tolerate.is_empty(), &file.tolerate) {
            (false, _) => args.tolerate.clone(),
            (true, Some(codes)) => codes.clone(),
            (true, None) => vec![RSYNC_PARTIAL_TRANSFER, RSYNC_VANISHED_SOURCE],
        };
        validate_exit_codes(&tolerate)?;

        Ok(Self {
            archive,
            sources,
            excludes: prefer(&args.excludes, &file.excludes),
            rsync: args
                .rsync
                .clone()
                .or_else(|| file.rsync.clone())
                .unwrap_or_else(|| DEFAULT_RSYNC.to_string()),
            exit_policy: ExitPolicy::tolerating(tolerate),
            compact: switch(args.compact, args.no_compact, file.compact),
            purge: switch(args.purge, args.no_purge, file.purge),
        })
    }
}

/// Resolve a `--flag`/`--no-flag` pair against the file value. Off by default.
pub(crate) fn switch(on: bool, off: bool, file: Option<bool>) -> bool {
    if on {
        true
    } else if off {
        false
    } else {
        file.unwrap_or(false)
    }
}

/// Command-line list if given, else the file's, else empty.
fn prefer<T: Clone>(cli: &[T], file: &Option<Vec<T>>) -> Vec<T> {
    if !cli.is_empty() {
        return cli.to_vec();
    }
    file.clone().unwrap_or_default()
}

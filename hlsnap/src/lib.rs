//! hlsnap command-line front end.
//!
//! This crate wires the archive, mount and backup crates to a CLI:
//! argument parsing, the optional TOML config file, logging, exit codes,
//! and the `backup`, `compact` and `list` commands.

pub mod cli;
pub mod commands;
pub mod config;
pub mod exit;
pub mod logger;
pub mod signal;

pub use cli::{
    parse_from, ArchiveArgs, BackupArgs, Cli, CliError, Command, CompactArgs, ListArgs,
    DEFAULT_MAX_COUNT, DEFAULT_RSYNC, DEFAULT_SUBDIR,
};
pub use commands::{
    execute_backup, execute_compact, execute_list, render_json, render_table, AppError,
    AppResult, BackupSummary, CompactSummary, SnapshotEntry,
};
pub use config::{ArchiveSettings, BackupSettings, ConfigError, FileConfig};
pub use logger::{Logger, MockLogger, StderrLogger, Verbosity};
pub use signal::{NeverShutdown, ShutdownCheck, ShutdownFlag};

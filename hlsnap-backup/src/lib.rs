//! Backup orchestration for hlsnap.
//!
//! This crate provides:
//! - SyncTool and SyncCommand, the typed rsync invocation
//! - BackupPlan, what to back up and how
//! - Backup, one rotate -> clone -> sync cycle over an Archive

pub mod backup;
pub mod sync;

pub use backup::{Backup, BackupError, BackupPlan, BackupReport, BackupStep};
pub use sync::{
    SyncCommand, SyncFlag, SyncTool, DEFAULT_SYNC_PROGRAM, RSYNC_PARTIAL_TRANSFER,
    RSYNC_VANISHED_SOURCE,
};

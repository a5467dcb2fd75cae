//! Backup command orchestration.
//!
//! Resolves settings, mounts the device when configured, runs one backup
//! cycle over the archive, and always unmounts afterwards. A shutdown
//! request stops the cycle at its next step, still inside the mount.

use std::time::{Duration, Instant};

use hlsnap_archive::Filesystem;
use hlsnap_backup::{Backup, BackupPlan, BackupReport, SyncTool};
use hlsnap_exec::{Outcome, ProcessRunner};

use crate::cli::BackupArgs;
use crate::config::{load_optional, BackupSettings};
use crate::logger::Logger;
use crate::signal::ShutdownCheck;

use super::{open_archive, with_mounted, AppResult, LoggedRunner};

/// Result of the backup command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSummary {
    pub report: BackupReport,
    /// Wall time from start to unmount.
    pub elapsed: Duration,
}

/// Execute the backup command.
pub fn execute_backup<R, F, L, H>(
    args: &BackupArgs,
    runner: &R,
    fs: &F,
    logger: &L,
    shutdown: &H,
) -> AppResult<BackupSummary>
where
    R: ProcessRunner,
    F: Filesystem,
    L: Logger,
    H: ShutdownCheck,
{
    args.validate()?;
    let file = load_optional(fs, args.archive.config.as_deref())?;
    let settings = BackupSettings::resolve(args, &file)?;
    run_backup(&settings, runner, fs, logger, shutdown)
}

/// Run a backup with already resolved settings.
pub fn run_backup<R, F, L, H>(
    settings: &BackupSettings,
    runner: &R,
    fs: &F,
    logger: &L,
    shutdown: &H,
) -> AppResult<BackupSummary>
where
    R: ProcessRunner,
    F: Filesystem,
    L: Logger,
    H: ShutdownCheck,
{
    let started = Instant::now();
    let runner = LoggedRunner::new(runner, logger);

    logger.verbose(&format!(
        "Backing up {} source(s) into {} (keeping {} snapshots)",
        settings.sources.len(),
        settings.archive.dest.display(),
        settings.archive.max_count
    ));

    let report = with_mounted(&settings.archive, &runner, logger, || {
        let archive = open_archive(&settings.archive, &runner, fs)?;
        let plan = BackupPlan::new(settings.sources.iter())?
            .with_excludes(settings.excludes.iter().cloned())
            .with_sync_tool(SyncTool::new(
                settings.rsync.as_str(),
                settings.exit_policy.clone(),
            ))
            .with_compact_first(settings.compact)
            .with_purge_after(settings.purge);

        let report = Backup::new(archive, plan).run_until(|| shutdown.should_stop())?;
        log_report(&report, settings, logger);
        Ok(report)
    })?;

    Ok(BackupSummary {
        report,
        elapsed: started.elapsed(),
    })
}

fn log_report<L: Logger>(report: &BackupReport, settings: &BackupSettings, logger: &L) {
    if let Some(compacted) = &report.compacted {
        for (from, to) in &compacted.moved {
            logger.verbose(&format!("Compacted slot {} into {}", from, to));
        }
    }

    if let Some(evicted) = report.shift.evicted {
        logger.verbose(&format!("Evicted oldest snapshot (slot {})", evicted));
    }
    for (from, to) in &report.shift.moved {
        logger.debug(&format!("Moved slot {} to {}", from, to));
    }

    if report.cloned {
        logger.verbose("Hard-linked previous snapshot into slot 1");
    } else {
        logger.verbose("No previous snapshot, starting a fresh one");
    }

    if let Outcome::Tolerated(code) = report.sync {
        logger.warn(&format!(
            "{} exited with code {}, some files were not transferred",
            settings.rsync, code
        ));
    }

    for path in &report.purged {
        logger.info(&format!("Removed stale {}", path.display()));
    }
}

//! Compact command orchestration.

use std::path::PathBuf;

use hlsnap_archive::{CompactReport, Filesystem};
use hlsnap_exec::ProcessRunner;

use crate::cli::CompactArgs;
use crate::config::{load_optional, switch, ArchiveSettings};
use crate::logger::Logger;

use super::{open_archive, with_mounted, AppResult, LoggedRunner};

/// Result of the compact command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactSummary {
    pub report: CompactReport,
    /// Stale snapshots removed when `--purge` was given.
    pub purged: Vec<PathBuf>,
}

/// Execute the compact command.
pub fn execute_compact<R, F, L>(
    args: &CompactArgs,
    runner: &R,
    fs: &F,
    logger: &L,
) -> AppResult<CompactSummary>
where
    R: ProcessRunner,
    F: Filesystem,
    L: Logger,
{
    args.validate()?;
    let file = load_optional(fs, args.archive.config.as_deref())?;
    let settings = ArchiveSettings::resolve(&args.archive, &file)?;
    let purge = switch(args.purge, args.no_purge, file.purge);
    let runner = LoggedRunner::new(runner, logger);

    with_mounted(&settings, &runner, logger, || {
        let archive = open_archive(&settings, &runner, fs)?;

        let report = archive.compact()?;
        for (from, to) in &report.moved {
            logger.verbose(&format!("Moved slot {} to {}", from, to));
        }

        let purged = if purge { archive.purge()? } else { Vec::new() };
        for path in &purged {
            logger.verbose(&format!("Removed stale {}", path.display()));
        }

        Ok(CompactSummary { report, purged })
    })
}

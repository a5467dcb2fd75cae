//! hlsnap CLI binary.
//!
//! Entry point for the `hlsnap` command-line tool.

use std::process::ExitCode;

use clap::Parser;
use hlsnap::exit::{codes, exit_code};
use hlsnap::{
    execute_backup, execute_compact, execute_list, render_json, render_table, AppError,
    BackupArgs, Cli, Command, CompactArgs, ListArgs, ShutdownFlag, StderrLogger, Verbosity,
};
use hlsnap_archive::RealFilesystem;
use hlsnap_exec::{Outcome, SystemRunner};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let logger = StderrLogger::new(Verbosity::from_count(cli.verbose));

    // Ctrl+C must not bypass the unmount
    let shutdown = ShutdownFlag::new();

    let result = match cli.command {
        Command::Backup(args) => run_backup(&args, &logger, &shutdown),
        Command::Compact(args) => run_compact(&args, &logger),
        Command::List(args) => run_list(&args, &logger),
    };

    match result {
        Ok(()) => ExitCode::from(codes::SUCCESS as u8),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(exit_code(&e) as u8)
        }
    }
}

/// Run the backup command.
fn run_backup(
    args: &BackupArgs,
    logger: &StderrLogger,
    shutdown: &ShutdownFlag,
) -> Result<(), AppError> {
    let summary = execute_backup(args, &SystemRunner, &RealFilesystem, logger, shutdown)?;
    let report = &summary.report;

    println!("Snapshot written to {}", report.destination.display());
    if let Outcome::Tolerated(code) = report.sync {
        println!("  Sync finished with tolerated exit code {}", code);
    }
    if !report.purged.is_empty() {
        println!("  Stale snapshots removed: {}", report.purged.len());
    }
    println!("Backup finished in {:.1} s", summary.elapsed.as_secs_f64());

    Ok(())
}

/// Run the compact command.
fn run_compact(args: &CompactArgs, logger: &StderrLogger) -> Result<(), AppError> {
    let summary = execute_compact(args, &SystemRunner, &RealFilesystem, logger)?;

    if summary.report.is_noop() {
        println!("Archive already compact");
    } else {
        println!("Renumbered {} snapshots", summary.report.moved.len());
    }
    if !summary.purged.is_empty() {
        println!("Stale snapshots removed: {}", summary.purged.len());
    }

    Ok(())
}

/// Run the list command.
fn run_list(args: &ListArgs, logger: &StderrLogger) -> Result<(), AppError> {
    let entries = execute_list(args, &SystemRunner, &RealFilesystem, logger)?;

    if args.json {
        println!("{}", render_json(&entries)?);
    } else if entries.is_empty() {
        println!("No snapshots");
    } else {
        print!("{}", render_table(&entries));
    }

    Ok(())
}

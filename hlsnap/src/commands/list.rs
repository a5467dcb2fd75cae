//! List command orchestration and output formatting.

use std::path::PathBuf;

use chrono::{DateTime, SecondsFormat, Utc};
use hlsnap_archive::{Filesystem, SlotInfo};
use hlsnap_exec::ProcessRunner;
use serde::{Serialize, Serializer};

use crate::cli::ListArgs;
use crate::config::{load_optional, ArchiveSettings};
use crate::logger::Logger;

use super::{open_archive, with_mounted, AppResult, LoggedRunner};

/// One snapshot as shown by `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotEntry {
    pub slot: usize,
    pub path: PathBuf,
    #[serde(serialize_with = "rfc3339")]
    pub modified: DateTime<Utc>,
}

impl From<SlotInfo> for SnapshotEntry {
    fn from(info: SlotInfo) -> Self {
        Self {
            slot: info.suffix,
            path: info.path,
            modified: DateTime::<Utc>::from(info.modified),
        }
    }
}

fn rfc3339<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Execute the list command. Entries come newest first (slot 0 first).
pub fn execute_list<R, F, L>(
    args: &ListArgs,
    runner: &R,
    fs: &F,
    logger: &L,
) -> AppResult<Vec<SnapshotEntry>>
where
    R: ProcessRunner,
    F: Filesystem,
    L: Logger,
{
    args.validate()?;
    let file = load_optional(fs, args.archive.config.as_deref())?;
    let settings = ArchiveSettings::resolve(&args.archive, &file)?;
    let runner = LoggedRunner::new(runner, logger);

    with_mounted(&settings, &runner, logger, || {
        let archive = open_archive(&settings, &runner, fs)?;
        let slots = archive.slot_info()?;
        logger.verbose(&format!(
            "{} of {} slots occupied in {}",
            slots.len(),
            archive.max_count(),
            archive.base().display()
        ));
        Ok(slots.into_iter().map(SnapshotEntry::from).collect())
    })
}

/// Plain-text table, one snapshot per line.
pub fn render_table(entries: &[SnapshotEntry]) -> String {
    let mut out = format!("{:>4}  {:<20}  {}\n", "SLOT", "MODIFIED", "PATH");
    for entry in entries {
        out.push_str(&format!(
            "{:>4}  {:<20}  {}\n",
            entry.slot,
            entry.modified.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.path.display()
        ));
    }
    out
}

/// Pretty-printed JSON array.
pub fn render_json(entries: &[SnapshotEntry]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::ArchiveArgs;
    use crate::logger::MockLogger;
    use hlsnap_archive::MockFilesystem;
    use hlsnap_exec::MockRunner;
    use std::time::{Duration, UNIX_EPOCH};

    fn entry(slot: usize, secs: u64) -> SnapshotEntry {
        SnapshotEntry {
            slot,
            path: PathBuf::from(format!("/mnt/disk/snapshot.{}", slot)),
            modified: DateTime::<Utc>::from(UNIX_EPOCH + Duration::from_secs(secs)),
        }
    }

    // ===========================================
    // execute_list
    // ===========================================

    #[test]
    fn test_list_reads_slots_and_mtimes() {
        let fs = MockFilesystem::new();
        fs.add_dir("/mnt/disk");
        fs.add_dir("/mnt/disk/snapshot.0");
        fs.add_dir("/mnt/disk/snapshot.2");
        fs.set_modified("/mnt/disk/snapshot.0", UNIX_EPOCH + Duration::from_secs(2_000_000_000));
        fs.set_modified("/mnt/disk/snapshot.2", UNIX_EPOCH + Duration::from_secs(1_000_000_000));
        let runner = MockRunner::new();
        let args = ListArgs {
            archive: ArchiveArgs {
                dest: Some(PathBuf::from("/mnt/disk")),
                ..ArchiveArgs::default()
            },
            json: false,
        };

        let entries = execute_list(&args, &runner, &fs, &MockLogger::new()).expect("list");

        assert_eq!(entries, vec![entry(0, 2_000_000_000), entry(2, 1_000_000_000)]);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_list_mounts_device() {
        let fs = MockFilesystem::new();
        fs.add_dir("/mnt/disk");
        let runner = MockRunner::new();
        let args = ListArgs {
            archive: ArchiveArgs {
                dest: Some(PathBuf::from("/mnt/disk")),
                device: Some("LABEL=backup".to_string()),
                sudo: true,
                ..ArchiveArgs::default()
            },
            json: true,
        };

        let entries = execute_list(&args, &runner, &fs, &MockLogger::new()).expect("list");
        assert!(entries.is_empty());
        assert_eq!(
            runner.rendered(),
            vec![
                "sudo mount LABEL=backup /mnt/disk",
                "sudo umount /mnt/disk"
            ]
        );
    }

    // ===========================================
    // Rendering
    // ===========================================

    #[test]
    fn test_render_table() {
        let table = render_table(&[entry(0, 1_000_000_000)]);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("SLOT"));
        assert_eq!(
            lines[1],
            "   0  2001-09-09 01:46:40   /mnt/disk/snapshot.0"
        );
    }

    #[test]
    fn test_render_table_empty_has_header_only() {
        assert_eq!(render_table(&[]).lines().count(), 1);
    }

    #[test]
    fn test_render_json() {
        let json = render_json(&[entry(1, 1_000_000_000)]).expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");

        assert_eq!(value[0]["slot"], 1);
        assert_eq!(value[0]["path"], "/mnt/disk/snapshot.1");
        assert_eq!(value[0]["modified"], "2001-09-09T01:46:40Z");
    }
}

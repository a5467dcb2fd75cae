//! Rotating snapshot archive for hlsnap.
//!
//! This crate provides:
//! - Filesystem trait for the read-only queries the archive needs
//! - Archive, a fixed-depth index of `BASE/SUBDIR.N` snapshot directories
//! - Rotation (shift), compaction and purge with their reports

pub mod archive;
pub mod fs;

pub use archive::{
    Archive, ArchiveError, CompactReport, ShiftReport, SlotInfo, DEFAULT_SUBDIR_NAME,
};
pub use fs::{Filesystem, FsError, MockFilesystem, RealFilesystem};

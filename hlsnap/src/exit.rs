//! Exit codes for the hlsnap CLI.

use crate::commands::AppError;

/// Exit code constants.
pub mod codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// Invalid arguments or configuration.
    pub const INVALID_ARGS: i32 = 1;
    /// Archive could not be opened or changed.
    pub const ARCHIVE_ERROR: i32 = 2;
    /// Device could not be mounted.
    pub const MOUNT_ERROR: i32 = 3;
    /// A backup step failed.
    pub const BACKUP_ERROR: i32 = 4;
    /// Work finished but the device could not be unmounted.
    pub const RELEASE_ERROR: i32 = 5;
}

/// Map an AppError to an exit code.
///
/// A failure followed by an unmount failure exits with the code of the
/// first failure.
pub fn exit_code(error: &AppError) -> i32 {
    match error {
        AppError::InvalidArgument(_) | AppError::Config(_) => codes::INVALID_ARGS,
        AppError::Archive(_) | AppError::Output(_) => codes::ARCHIVE_ERROR,
        AppError::Mount(_) => codes::MOUNT_ERROR,
        AppError::Backup(_) => codes::BACKUP_ERROR,
        AppError::Release(_) => codes::RELEASE_ERROR,
        AppError::Unreleased { error, .. } => exit_code(error),
    }
}

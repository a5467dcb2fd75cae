//! Scoped device mounts for hlsnap.
//!
//! A `Mount` mounts a backup device for the duration of an operation and
//! always unmounts afterwards, whether the operation succeeded, failed,
//! panicked, or the mount itself failed. An unmount failure is reported
//! next to any earlier error, never in place of it.
//!
//! The privileged variant is the same type over an elevated runner:
//! `Mount::new(device, dir, ElevatedRunner::new(SystemRunner))`.

use std::fmt;
use std::path::{Path, PathBuf};

use hlsnap_exec::{CommandError, CommandLine, ProcessRunner};
use thiserror::Error;

/// Errors from mount and unmount commands.
#[derive(Debug, Error)]
pub enum MountError {
    #[error("mount of {device} on {} failed: {source}", .mount_point.display())]
    Mount {
        device: String,
        mount_point: PathBuf,
        #[source]
        source: CommandError,
    },

    #[error("unmount of {} failed: {source}", .mount_point.display())]
    Unmount {
        mount_point: PathBuf,
        #[source]
        source: CommandError,
    },
}

/// Mount failure, with the result of the cleanup unmount that followed it.
#[derive(Debug, Error)]
#[error("{error}{}", describe_release(.release))]
pub struct AcquireError {
    #[source]
    pub error: MountError,
    pub release: Option<MountError>,
}

fn describe_release(release: &Option<MountError>) -> String {
    match release {
        Some(e) => format!(" (and {})", e),
        None => String::new(),
    }
}

/// Failure of a scoped operation.
#[derive(Debug)]
pub enum ScopedError<E> {
    /// The mount failed; the operation never ran.
    Acquire(AcquireError),
    /// The operation failed; `release` holds an unmount failure, if any.
    Operation { error: E, release: Option<MountError> },
    /// The operation succeeded but the unmount failed.
    Release(MountError),
}

impl<E> ScopedError<E> {
    /// The unmount failure, wherever it occurred.
    pub fn release_error(&self) -> Option<&MountError> {
        match self {
            ScopedError::Acquire(e) => e.release.as_ref(),
            ScopedError::Operation { release, .. } => release.as_ref(),
            ScopedError::Release(e) => Some(e),
        }
    }

    /// The operation's own error, if the operation ran and failed.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            ScopedError::Operation { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl<E: fmt::Display> fmt::Display for ScopedError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopedError::Acquire(e) => write!(f, "{}", e),
            ScopedError::Operation {
                error,
                release: None,
            } => write!(f, "{}", error),
            ScopedError::Operation {
                error,
                release: Some(release),
            } => write!(f, "{} (and {})", error, release),
            ScopedError::Release(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ScopedError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScopedError::Acquire(e) => Some(e),
            ScopedError::Operation { error, .. } => Some(error),
            ScopedError::Release(e) => Some(e),
        }
    }
}

/// A device and the directory it is mounted on.
#[derive(Debug, Clone)]
pub struct Mount<R> {
    device: String,
    mount_point: PathBuf,
    runner: R,
}

impl<R: ProcessRunner> Mount<R> {
    pub fn new(device: impl Into<String>, mount_point: impl Into<PathBuf>, runner: R) -> Self {
        Self {
            device: device.into(),
            mount_point: mount_point.into(),
            runner,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Run `mount DEVICE MOUNTPOINT`.
    pub fn mount(&self) -> Result<(), MountError> {
        let cmd = CommandLine::new("mount")
            .arg(&self.device)
            .arg(&self.mount_point);
        self.runner
            .execute(&cmd)
            .map_err(|source| MountError::Mount {
                device: self.device.clone(),
                mount_point: self.mount_point.clone(),
                source,
            })
    }

    /// Run `umount MOUNTPOINT`.
    pub fn unmount(&self) -> Result<(), MountError> {
        let cmd = CommandLine::new("umount").arg(&self.mount_point);
        self.runner
            .execute(&cmd)
            .map_err(|source| MountError::Unmount {
                mount_point: self.mount_point.clone(),
                source,
            })
    }

    /// Mount and return a guard that unmounts on release or drop.
    ///
    /// When the mount fails, an unmount is still attempted in case the
    /// mount partially succeeded; its outcome is kept in the error.
    pub fn acquire(&self) -> Result<MountGuard<'_, R>, AcquireError> {
        match self.mount() {
            Ok(()) => Ok(MountGuard {
                mount: self,
                armed: true,
            }),
            Err(error) => Err(AcquireError {
                error,
                release: self.unmount().err(),
            }),
        }
    }

    /// Run `op` with the device mounted.
    pub fn scoped<T, E, Op>(&self, op: Op) -> Result<T, ScopedError<E>>
    where
        Op: FnOnce() -> Result<T, E>,
    {
        let guard = self.acquire().map_err(ScopedError::Acquire)?;

        match op() {
            Ok(value) => {
                guard.release().map_err(ScopedError::Release)?;
                Ok(value)
            }
            Err(error) => Err(ScopedError::Operation {
                error,
                release: guard.release().err(),
            }),
        }
    }
}

/// Held while the device is mounted.
///
/// `release` unmounts and reports the result. Dropping an unreleased guard
/// (e.g. while unwinding) unmounts and discards the result.
#[derive(Debug)]
pub struct MountGuard<'a, R: ProcessRunner> {
    mount: &'a Mount<R>,
    armed: bool,
}

impl<'a, R: ProcessRunner> MountGuard<'a, R> {
    pub fn mount_point(&self) -> &Path {
        self.mount.mount_point()
    }

    /// Unmount now.
    pub fn release(mut self) -> Result<(), MountError> {
        self.armed = false;
        self.mount.unmount()
    }
}

impl<R: ProcessRunner> Drop for MountGuard<'_, R> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.mount.unmount();
        }
    }
}

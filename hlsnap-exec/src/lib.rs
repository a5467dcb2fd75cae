//! External command execution for hlsnap.
//!
//! This crate provides:
//! - CommandLine, an ordered program + argument list
//! - ProcessRunner trait with system, elevated and mock implementations
//! - ExitPolicy for allow-listing non-zero exit codes

pub mod command;
pub mod policy;
pub mod runner;

pub use command::CommandLine;
pub use policy::{ExitPolicy, Outcome};
pub use runner::{
    CommandError, Completion, ElevatedRunner, MockRunner, ProcessRunner, SystemRunner,
    DEFAULT_ELEVATION_PROGRAM,
};

//! Progress and diagnostic output.
//!
//! Commands report through a `Logger` so tests can inspect what a run would
//! print. Library crates do not log; they return reports that the command
//! layer turns into messages here.

use std::io::Write;
use std::sync::{Arc, RwLock};

/// How much to print, selected by repeating `-v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Results and warnings only.
    Normal,
    /// Each step of a run.
    Verbose,
    /// Each external command.
    Debug,
}

impl Verbosity {
    /// Map a `-v` count to a level.
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => Verbosity::Normal,
            1 => Verbosity::Verbose,
            _ => Verbosity::Debug,
        }
    }
}

/// Sink for command output.
pub trait Logger: Send + Sync {
    fn log(&self, level: Verbosity, message: &str);

    fn info(&self, message: &str) {
        self.log(Verbosity::Normal, message);
    }

    /// A problem that did not change the outcome of the command.
    fn warn(&self, message: &str) {
        self.log(Verbosity::Normal, &format!("warning: {}", message));
    }

    fn verbose(&self, message: &str) {
        self.log(Verbosity::Verbose, message);
    }

    fn debug(&self, message: &str) {
        self.log(Verbosity::Debug, message);
    }
}

/// Writes messages at or below its level to stderr.
#[derive(Debug, Clone, Copy)]
pub struct StderrLogger {
    level: Verbosity,
}

impl StderrLogger {
    pub fn new(level: Verbosity) -> Self {
        Self { level }
    }

    pub fn level(&self) -> Verbosity {
        self.level
    }
}

impl Logger for StderrLogger {
    fn log(&self, level: Verbosity, message: &str) {
        if level <= self.level {
            let _ = writeln!(std::io::stderr(), "{}", message);
        }
    }
}

/// A captured message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Verbosity,
    pub message: String,
}

/// Captures every message, whatever its level. Clones share one buffer.
#[derive(Debug, Clone, Default)]
pub struct MockLogger {
    entries: Arc<RwLock<Vec<LogEntry>>>,
}

impl MockLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.read().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.message).collect()
    }

    pub fn messages_at_level(&self, level: Verbosity) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .map(|e| e.message)
            .collect()
    }

    /// True if any message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|e| e.message.contains(needle))
    }

    pub fn clear(&self) {
        self.entries.write().unwrap().clear();
    }
}

impl Logger for MockLogger {
    fn log(&self, level: Verbosity, message: &str) {
        self.entries.write().unwrap().push(LogEntry {
            level,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ===========================================
    // Verbosity
    // ===========================================

    #[test]
    fn test_verbosity_from_count() {
        assert_eq!(Verbosity::from_count(0), Verbosity::Normal);
        assert_eq!(Verbosity::from_count(1), Verbosity::Verbose);
        assert_eq!(Verbosity::from_count(2), Verbosity::Debug);
        assert_eq!(Verbosity::from_count(9), Verbosity::Debug);
    }

    #[test]
    fn test_verbosity_ordering() {
        assert!(Verbosity::Normal < Verbosity::Verbose);
        assert!(Verbosity::Verbose < Verbosity::Debug);
    }

    // ===========================================
    // MockLogger
    // ===========================================

    #[test]
    fn test_mock_logger_records_levels() {
        let logger = MockLogger::new();
        logger.info("snapshot written");
        logger.verbose("rotating");
        logger.debug("mv a b");

        let levels: Vec<_> = logger.entries().into_iter().map(|e| e.level).collect();
        assert_eq!(
            levels,
            vec![Verbosity::Normal, Verbosity::Verbose, Verbosity::Debug]
        );
        assert_eq!(logger.messages_at_level(Verbosity::Debug), vec!["mv a b"]);
    }

    #[test]
    fn test_warn_is_prefixed_and_normal() {
        let logger = MockLogger::new();
        logger.warn("unmount failed");
        assert_eq!(
            logger.messages_at_level(Verbosity::Normal),
            vec!["warning: unmount failed"]
        );
    }

    #[test]
    fn test_mock_logger_clones_share_buffer() {
        let logger = MockLogger::new();
        let other = logger.clone();
        other.info("from clone");

        assert!(logger.contains("clone"));
        logger.clear();
        assert!(other.messages().is_empty());
    }

    // ===========================================
    // StderrLogger
    // ===========================================

    #[test]
    fn test_stderr_logger_level() {
        let logger = StderrLogger::new(Verbosity::from_count(1));
        assert_eq!(logger.level(), Verbosity::Verbose);
        logger.debug("suppressed");
    }
}

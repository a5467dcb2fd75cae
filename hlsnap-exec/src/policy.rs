//! Exit status classification.
//!
//! A process exit code is judged against an allow-list: 0 always succeeds,
//! listed non-zero codes are tolerated, everything else fails.

use std::collections::BTreeSet;

/// How a finished command is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Exit code 0.
    Success,
    /// Non-zero exit code present in the allow-list.
    Tolerated(i32),
}

impl Outcome {
    /// True for `Success` only.
    pub fn is_clean(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

/// Allow-list of non-zero exit codes treated as success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExitPolicy {
    tolerated: BTreeSet<i32>,
}

impl ExitPolicy {
    /// Only exit code 0 succeeds.
    pub fn strict() -> Self {
        Self::default()
    }

    /// Exit code 0 and each of `codes` succeed.
    pub fn tolerating<I: IntoIterator<Item = i32>>(codes: I) -> Self {
        Self {
            tolerated: codes.into_iter().filter(|&c| c != 0).collect(),
        }
    }

    /// Builder: tolerate one more exit code.
    pub fn with_tolerated(mut self, code: i32) -> Self {
        if code != 0 {
            self.tolerated.insert(code);
        }
        self
    }

    /// Tolerated codes, ascending.
    pub fn tolerated(&self) -> impl Iterator<Item = i32> + '_ {
        self.tolerated.iter().copied()
    }

    /// Classify an exit code. `None` (killed by a signal) never succeeds.
    pub fn classify(&self, code: Option<i32>) -> Option<Outcome> {
        match code {
            Some(0) => Some(Outcome::Success),
            Some(c) if self.tolerated.contains(&c) => Some(Outcome::Tolerated(c)),
            _ => None,
        }
    }
}

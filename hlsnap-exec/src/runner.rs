//! Process runner abstraction for hlsnap.
//!
//! Every filesystem mutation and external tool invocation goes through a
//! `ProcessRunner`, so tests can record and script commands instead of
//! launching them.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::io::{self, Read};
use std::process::{Command, Stdio};
use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::command::CommandLine;
use crate::policy::{ExitPolicy, Outcome};

/// Elevation wrapper used when none is configured.
pub const DEFAULT_ELEVATION_PROGRAM: &str = "sudo";

/// Errors from running an external command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{}", describe_failure(.program, .code, .message))]
    Failed {
        program: String,
        code: Option<i32>,
        message: String,
    },
}

fn describe_failure(program: &str, code: &Option<i32>, message: &str) -> String {
    let status = match code {
        Some(c) => format!("exit status {}", c),
        None => "termination by signal".to_string(),
    };
    if message.is_empty() {
        format!("{} failed with {}", program, status)
    } else {
        format!("{} failed with {}: {}", program, status, message)
    }
}

impl CommandError {
    /// Build a failure from a completed command.
    pub fn failed(command: &CommandLine, completion: Completion) -> Self {
        CommandError::Failed {
            program: command.program_name(),
            code: completion.code,
            message: completion.stderr,
        }
    }

    /// Captured diagnostic text (trimmed stderr, or the launch error).
    pub fn message(&self) -> String {
        match self {
            CommandError::Spawn { source, .. } => source.to_string(),
            CommandError::Failed { message, .. } => message.clone(),
        }
    }

    /// Exit code of a command that ran and failed.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CommandError::Failed { code, .. } => *code,
            CommandError::Spawn { .. } => None,
        }
    }
}

/// A command that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
    /// Captured stderr, trimmed.
    pub stderr: String,
}

impl Completion {
    /// Exit code 0 with no diagnostics.
    pub fn success() -> Self {
        Self::exited(0, "")
    }

    /// Exit with the given code and stderr text.
    pub fn exited(code: i32, stderr: &str) -> Self {
        Self {
            code: Some(code),
            stderr: stderr.trim().to_string(),
        }
    }
}

/// Trait for launching external programs.
/// Abstracted for testing with mock implementations.
pub trait ProcessRunner: Send + Sync {
    /// Launch the command, wait for it, and report how it ended.
    ///
    /// Only failure to launch is an error here; exit codes are judged by
    /// `execute` and `execute_with`.
    fn run(&self, command: &CommandLine) -> Result<Completion, CommandError>;

    /// Run the command, failing on any non-zero exit code.
    fn execute(&self, command: &CommandLine) -> Result<(), CommandError> {
        self.execute_with(command, &ExitPolicy::strict()).map(|_| ())
    }

    /// Run the command, judging its exit code against `policy`.
    fn execute_with(
        &self,
        command: &CommandLine,
        policy: &ExitPolicy,
    ) -> Result<Outcome, CommandError> {
        let completion = self.run(command)?;
        match policy.classify(completion.code) {
            Some(outcome) => Ok(outcome),
            None => Err(CommandError::failed(command, completion)),
        }
    }
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(&self, command: &CommandLine) -> Result<Completion, CommandError> {
        (**self).run(command)
    }
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for Arc<R> {
    fn run(&self, command: &CommandLine) -> Result<Completion, CommandError> {
        (**self).run(command)
    }
}

/// Runner that launches real processes.
///
/// Stdout is inherited; stderr is captured for diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessRunner for SystemRunner {
    fn run(&self, command: &CommandLine) -> Result<Completion, CommandError> {
        let spawn_error = |source| CommandError::Spawn {
            program: command.program_name(),
            source,
        };

        let mut child = Command::new(command.program())
            .args(command.arguments())
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_error)?;

        // Drain stderr before waiting so a chatty child cannot block on a full pipe
        let mut raw = Vec::new();
        if let Some(mut stderr) = child.stderr.take() {
            stderr.read_to_end(&mut raw).map_err(spawn_error)?;
        }
        let status = child.wait().map_err(spawn_error)?;

        Ok(Completion {
            code: status.code(),
            stderr: String::from_utf8_lossy(&raw).trim().to_string(),
        })
    }
}

/// Runner decorator that prefixes every command with an elevation program.
#[derive(Debug, Clone)]
pub struct ElevatedRunner<R> {
    inner: R,
    program: OsString,
}

impl<R: ProcessRunner> ElevatedRunner<R> {
    /// Wrap `inner` with `sudo`.
    pub fn new(inner: R) -> Self {
        Self::with_program(inner, DEFAULT_ELEVATION_PROGRAM)
    }

    /// Wrap `inner` with a custom elevation program (e.g. `doas`).
    pub fn with_program(inner: R, program: impl Into<OsString>) -> Self {
        Self {
            inner,
            program: program.into(),
        }
    }

    /// The wrapped runner.
    pub fn inner(&self) -> &R {
        &self.inner
    }
}

impl<R: ProcessRunner> ProcessRunner for ElevatedRunner<R> {
    fn run(&self, command: &CommandLine) -> Result<Completion, CommandError> {
        self.inner.run(&command.prefixed(self.program.clone()))
    }
}

type Handler = Arc<dyn Fn(&CommandLine) -> Result<Completion, CommandError> + Send + Sync>;

#[derive(Default)]
struct MockState {
    calls: Vec<CommandLine>,
    scripted: VecDeque<Completion>,
}

/// Mock runner for testing.
///
/// Records every command. Answers from the scripted queue first, then from
/// the handler, then with success. Cloning creates a new handle to the same
/// underlying state.
#[derive(Clone, Default)]
pub struct MockRunner {
    state: Arc<RwLock<MockState>>,
    handler: Option<Handler>,
}

impl std::fmt::Debug for MockRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRunner")
            .field("calls", &self.calls().len())
            .field("has_handler", &self.handler.is_some())
            .finish()
    }
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that answers every unscripted command with `handler`.
    pub fn with_handler<H>(handler: H) -> Self
    where
        H: Fn(&CommandLine) -> Result<Completion, CommandError> + Send + Sync + 'static,
    {
        Self {
            state: Arc::default(),
            handler: Some(Arc::new(handler)),
        }
    }

    /// Queue a completion for the next unanswered command.
    pub fn push(&self, completion: Completion) {
        self.state.write().unwrap().scripted.push_back(completion);
    }

    /// All commands run so far, in order.
    pub fn calls(&self) -> Vec<CommandLine> {
        self.state.read().unwrap().calls.clone()
    }

    /// All commands rendered as strings.
    pub fn rendered(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.to_string()).collect()
    }

    /// Programs run so far, in order.
    pub fn programs(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.program_name()).collect()
    }

    /// Forget recorded calls.
    pub fn clear(&self) {
        self.state.write().unwrap().calls.clear();
    }
}

impl ProcessRunner for MockRunner {
    fn run(&self, command: &CommandLine) -> Result<Completion, CommandError> {
        let scripted = {
            let mut state = self.state.write().unwrap();
            state.calls.push(command.clone());
            state.scripted.pop_front()
        };

        match (scripted, &self.handler) {
            (Some(completion), _) => Ok(completion),
            (None, Some(handler)) => handler(command),
            (None, None) => Ok(Completion::success()),
        }
    }
}

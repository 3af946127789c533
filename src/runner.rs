//! Process execution capability.
//!
//! All shelling out goes through [`CommandRunner`] so that the decision logic
//! in the orchestrator can be driven by [`ScriptedRunner`] in tests without
//! touching the host system.

use crate::detection::SearchPath;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

/// A structured command for programmatic execution.
///
/// # Example
///
/// ```rust
/// use llms_bootstrap::CommandSpec;
///
/// let cmd = CommandSpec::new("/opt/homebrew/bin/brew", ["install", "pigz"]);
/// assert_eq!(cmd.display(), "/opt/homebrew/bin/brew install pigz");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// The program to execute, either a bare name or a path.
    pub program: String,

    /// Arguments to pass to the program.
    pub args: Vec<String>,

    /// Environment variables to set before execution (key, value pairs).
    pub env_vars: Vec<(String, String)>,
}

impl CommandSpec {
    /// Build a command with no extra environment.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            env_vars: Vec::new(),
        }
    }

    /// Build a command whose program is a filesystem path.
    pub fn for_path<I, S>(program: &Path, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(program.to_string_lossy().into_owned(), args)
    }

    /// Add environment variables.
    pub fn with_env(mut self, env_vars: Vec<(String, String)>) -> Self {
        self.env_vars.extend(env_vars);
        self
    }

    /// Human-readable form, `program arg1 arg2`.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished child process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }
}

/// The child process could not be run to completion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RunError {
    /// The program does not exist.
    #[error("program not found")]
    NotFound,

    /// The program exists but could not be executed.
    #[error("permission denied")]
    PermissionDenied,

    /// The program did not finish within the allotted time and was killed.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Any other spawn or wait failure.
    #[error("i/o error: {0}")]
    Io(String),
}

/// Capability to find and run external programs.
pub trait CommandRunner: Send + Sync {
    /// Resolve `name` against `search_path` without executing it.
    ///
    /// Names containing a path separator are checked directly.
    fn locate(&self, name: &str, search_path: &SearchPath) -> Option<PathBuf>;

    /// Run `command` to completion, killing it after `limit`.
    fn run<'a>(
        &'a self,
        command: &'a CommandSpec,
        limit: Duration,
    ) -> BoxFuture<'a, Result<CommandOutput, RunError>>;
}

/// Runs real processes on the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn locate(&self, name: &str, search_path: &SearchPath) -> Option<PathBuf> {
        crate::detection::find_executable(name, search_path)
    }

    fn run<'a>(
        &'a self,
        command: &'a CommandSpec,
        limit: Duration,
    ) -> BoxFuture<'a, Result<CommandOutput, RunError>> {
        async move {
            let mut cmd = Command::new(&command.program);
            cmd.args(&command.args)
                .envs(command.env_vars.iter().cloned())
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            tracing::debug!(target: "bootstrap", "exec: {}", command.display());

            let output = timeout(limit, cmd.output())
                .await
                .map_err(|_| RunError::Timeout(limit))?
                .map_err(|e| match e.kind() {
                    std::io::ErrorKind::NotFound => RunError::NotFound,
                    std::io::ErrorKind::PermissionDenied => RunError::PermissionDenied,
                    _ => RunError::Io(e.to_string()),
                })?;

            Ok(CommandOutput {
                exit_code: output.status.code(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
        .boxed()
    }
}

type Hook = Box<dyn Fn(&CommandSpec) + Send + Sync>;

/// A fake runner that answers from a script and records every invocation.
///
/// Executables are registered by the exact name (or path) that will be looked
/// up. Responses are keyed by [`CommandSpec::display`]. Commands with no
/// scripted response succeed with empty output.
///
/// # Example
///
/// ```rust
/// use llms_bootstrap::{CommandOutput, ScriptedRunner};
///
/// let runner = ScriptedRunner::new()
///     .with_executable("python3", "/usr/bin/python3")
///     .respond("/usr/bin/python3 --version", CommandOutput::ok("Python 3.11.4\n"));
/// assert!(runner.calls().is_empty());
/// ```
#[derive(Default)]
pub struct ScriptedRunner {
    executables: HashMap<String, PathBuf>,
    responses: HashMap<String, Result<CommandOutput, RunError>>,
    hooks: Vec<(String, Hook)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    /// An empty script: nothing is installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `name` resolvable to `path`.
    pub fn with_executable(mut self, name: &str, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        self.executables
            .insert(path.to_string_lossy().into_owned(), path.clone());
        self.executables.insert(name.to_string(), path);
        self
    }

    /// Answer `command_line` with `output`.
    pub fn respond(mut self, command_line: &str, output: CommandOutput) -> Self {
        self.responses.insert(command_line.to_string(), Ok(output));
        self
    }

    /// Answer `command_line` with a run error.
    pub fn fail_with(mut self, command_line: &str, error: RunError) -> Self {
        self.responses.insert(command_line.to_string(), Err(error));
        self
    }

    /// Run `hook` whenever `command_line` is executed, before answering.
    pub fn on_run<F>(mut self, command_line: &str, hook: F) -> Self
    where
        F: Fn(&CommandSpec) + Send + Sync + 'static,
    {
        self.hooks.push((command_line.to_string(), Box::new(hook)));
        self
    }

    /// Every executed command line, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// How many executed command lines start with `prefix`.
    pub fn calls_starting_with(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn locate(&self, name: &str, _search_path: &SearchPath) -> Option<PathBuf> {
        self.executables.get(name).cloned()
    }

    fn run<'a>(
        &'a self,
        command: &'a CommandSpec,
        _limit: Duration,
    ) -> BoxFuture<'a, Result<CommandOutput, RunError>> {
        async move {
            let line = command.display();
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(line.clone());
            }
            for (key, hook) in &self.hooks {
                if *key == line {
                    hook(command);
                }
            }
            self.responses
                .get(&line)
                .cloned()
                .unwrap_or_else(|| Ok(CommandOutput::ok("")))
        }
        .boxed()
    }
}

//! Presence and version probing with a bounded timeout.

use super::{extract_version, SearchPath};
use crate::runner::{CommandRunner, CommandSpec, RunError};
use regex::Regex;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default timeout for version probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a version probe did not yield a version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ProbeError {
    /// The executable is not on the search path.
    #[error("{0} not found")]
    NotFound(String),

    /// The executable ran but printed nothing that looks like a version.
    #[error("{name} printed no version (output: {output:?})")]
    NoVersionOutput {
        /// The probed executable.
        name: String,
        /// What it printed, trimmed.
        output: String,
    },

    /// The executable did not answer in time.
    #[error("{name} did not answer within {after:?}")]
    Timeout {
        /// The probed executable.
        name: String,
        /// The timeout that elapsed.
        after: Duration,
    },

    /// The executable exists but could not be run.
    #[error("permission denied running {0}")]
    PermissionDenied(String),

    /// Any other spawn failure.
    #[error("could not run {name}: {message}")]
    Io {
        /// The probed executable.
        name: String,
        /// The underlying error.
        message: String,
    },
}

/// Checks for executables on a search path and asks them for their version.
///
/// # Example
///
/// ```rust
/// use llms_bootstrap::{CommandOutput, CommandProbe, ScriptedRunner, SearchPath};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let runner = ScriptedRunner::new()
///     .with_executable("python3", "/usr/bin/python3")
///     .respond("/usr/bin/python3 --version", CommandOutput::ok("Python 3.11.4\n"));
/// let path = SearchPath::empty();
/// let probe = CommandProbe::new(&runner, &path);
///
/// assert!(probe.exists("python3"));
/// assert_eq!(probe.version_of("python3", "--version").await.unwrap(), "3.11.4");
/// # });
/// ```
pub struct CommandProbe<'a> {
    runner: &'a dyn CommandRunner,
    search_path: &'a SearchPath,
    timeout: Duration,
    pattern: Option<&'a Regex>,
}

impl<'a> CommandProbe<'a> {
    /// A probe with the default timeout and version pattern.
    pub fn new(runner: &'a dyn CommandRunner, search_path: &'a SearchPath) -> Self {
        Self {
            runner,
            search_path,
            timeout: PROBE_TIMEOUT,
            pattern: None,
        }
    }

    /// Override the timeout applied to each probe.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Extract versions with `pattern` instead of the default.
    pub fn with_pattern(mut self, pattern: &'a Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    /// Whether `name` resolves on the search path. Nothing is executed.
    pub fn exists(&self, name: &str) -> bool {
        self.locate(name).is_some()
    }

    /// Where `name` resolves on the search path, if anywhere.
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        self.runner.locate(name, self.search_path)
    }

    /// Run `name version_flag` and extract the first version in its output.
    pub async fn version_of(&self, name: &str, version_flag: &str) -> Result<String, ProbeError> {
        let path = self
            .locate(name)
            .ok_or_else(|| ProbeError::NotFound(name.to_string()))?;

        let command = CommandSpec::for_path(&path, [version_flag]).with_env(vec![(
            "PATH".to_string(),
            self.search_path.to_os_string().to_string_lossy().into_owned(),
        )]);

        let output = self
            .runner
            .run(&command, self.timeout)
            .await
            .map_err(|e| match e {
                RunError::NotFound => ProbeError::NotFound(name.to_string()),
                RunError::Timeout(after) => ProbeError::Timeout {
                    name: name.to_string(),
                    after,
                },
                RunError::PermissionDenied => ProbeError::PermissionDenied(name.to_string()),
                other => ProbeError::Io {
                    name: name.to_string(),
                    message: other.to_string(),
                },
            })?;

        // Some tools print their banner on stderr, so look at both streams
        let combined = output.combined();
        extract_version(&combined, self.pattern).ok_or_else(|| ProbeError::NoVersionOutput {
            name: name.to_string(),
            output: combined.trim().to_string(),
        })
    }
}

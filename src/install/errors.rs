//! Error types for bootstrap operations.
//!
//! Each variant carries an actionable fix suggestion and maps to the exit
//! code the whole run terminates with.

use crate::detection::ProbeError;
use crate::profile::ProfileError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can abort (or, for non-fatal steps, be warned about) a run.
///
/// # Example
///
/// ```rust
/// use llms_bootstrap::BootstrapError;
///
/// fn report(error: &BootstrapError) {
///     eprintln!("Bootstrap failed: {}", error);
///     eprintln!("To fix: {}", error.fix_suggestion());
///     std::process::exit(error.exit_code());
/// }
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BootstrapError {
    /// A required prerequisite is missing, e.g. the package manager itself.
    #[error("Missing prerequisite: {name}")]
    PrerequisiteMissing {
        /// Name of the missing prerequisite.
        name: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A prerequisite is installed but still below the required version.
    #[error("Prerequisite version mismatch: {name} requires {required}, found {found}")]
    PrerequisiteVersionMismatch {
        /// Name of the prerequisite.
        name: String,
        /// Required minimum version.
        required: String,
        /// Version that was found.
        found: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// An executable could not be probed.
    #[error("Probe failed: {source}")]
    Probe {
        /// The underlying probe failure.
        #[source]
        source: ProbeError,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The package manager returned non-zero or could not be run.
    #[error("Installation of {package} failed: {message}")]
    InstallFailure {
        /// The formula or package being installed.
        package: String,
        /// Description of the failure.
        message: String,
        /// Exit code from the package manager, if it ran to completion.
        exit_code: Option<i32>,
        /// Standard error from the package manager, if available.
        stderr: Option<String>,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// Some other child process (venv creation, pip) returned non-zero.
    #[error("Command `{command}` failed: {message}")]
    CommandFailed {
        /// Display form of the command.
        command: String,
        /// Description of the failure.
        message: String,
        /// Exit code, if the command ran to completion.
        exit_code: Option<i32>,
        /// Standard error, if available.
        stderr: Option<String>,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// A filesystem operation failed.
    #[error("I/O failure while {context}: {source}")]
    IoFailure {
        /// What was being done.
        context: String,
        /// Backup written before the failure, if any.
        backup: Option<PathBuf>,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A virtual environment is missing its activation artifact.
    #[error("Virtual environment at {} has no activation script at {}", .venv.display(), .expected.display())]
    ActivationFailure {
        /// Root of the environment.
        venv: PathBuf,
        /// The artifact that should exist.
        expected: PathBuf,
    },

    /// A step needed environment facts before detection ran.
    #[error("Environment facts requested before detection")]
    EnvironmentNotDetected,
}

impl BootstrapError {
    /// Get an actionable suggestion for fixing this error.
    pub fn fix_suggestion(&self) -> String {
        match self {
            Self::PrerequisiteMissing { fix, .. }
            | Self::PrerequisiteVersionMismatch { fix, .. }
            | Self::Probe { fix, .. }
            | Self::InstallFailure { fix, .. }
            | Self::CommandFailed { fix, .. } => fix.clone(),
            Self::IoFailure {
                backup: Some(backup),
                ..
            } => format!(
                "Check permissions and free space. A backup was saved at {}",
                backup.display()
            ),
            Self::IoFailure { backup: None, .. } => {
                "Check permissions and free space, then re-run".to_string()
            }
            Self::ActivationFailure { venv, .. } => format!(
                "The directory {} was left for inspection; remove it and re-run",
                venv.display()
            ),
            Self::EnvironmentNotDetected => {
                "Environment detection must run before any other step".to_string()
            }
        }
    }

    /// Exit code the run terminates with when this error is fatal.
    ///
    /// The child's own exit code when one is known and non-zero, else 1.
    ///
    /// ```rust
    /// use llms_bootstrap::BootstrapError;
    ///
    /// let error = BootstrapError::InstallFailure {
    ///     package: "pigz".to_string(),
    ///     message: "exited with code 7".to_string(),
    ///     exit_code: Some(7),
    ///     stderr: None,
    ///     fix: "See output above".to_string(),
    /// };
    /// assert_eq!(error.exit_code(), 7);
    /// assert_eq!(BootstrapError::EnvironmentNotDetected.exit_code(), 1);
    /// ```
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InstallFailure {
                exit_code: Some(code),
                ..
            }
            | Self::CommandFailed {
                exit_code: Some(code),
                ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }

    /// Wrap a probe failure with a suggestion matching its cause.
    pub fn probe(source: ProbeError) -> Self {
        let fix = match &source {
            ProbeError::NotFound(name) => format!("Install {} or add it to PATH", name),
            ProbeError::Timeout { name, .. } => {
                format!("{} did not respond; check that it runs from a terminal", name)
            }
            ProbeError::PermissionDenied(name) => format!("Make {} executable", name),
            _ => "Reinstall the tool with the package manager".to_string(),
        };
        Self::Probe { source, fix }
    }
}

impl From<ProfileError> for BootstrapError {
    fn from(error: ProfileError) -> Self {
        let backup = error.backup_path().map(PathBuf::from);
        let context = error.context();
        Self::IoFailure {
            context,
            backup,
            source: error.into_io(),
        }
    }
}

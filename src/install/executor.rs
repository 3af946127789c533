//! Running install and environment commands with a timeout.
//!
//! [`install_package`] is used for package-manager invocations and maps
//! failures to [`BootstrapError::InstallFailure`]; [`run_checked`] is used for
//! everything else (venv creation, pip) and maps to
//! [`BootstrapError::CommandFailed`]. Both keep the child's exit code so the
//! run can terminate with it.

use crate::install::BootstrapError;
use crate::runner::{CommandOutput, CommandRunner, CommandSpec, RunError};
use std::time::Duration;

/// Heuristic for network trouble in a failed child's stderr.
fn looks_like_network_error(stderr: &str) -> bool {
    let stderr = stderr.to_ascii_lowercase();
    ["network", "connection", "could not resolve", "timed out", "etimedout", "enotfound"]
        .iter()
        .any(|needle| stderr.contains(needle))
}

fn failure_fix(stderr: &str, fallback: &str) -> String {
    if looks_like_network_error(stderr) {
        "Check your internet connection and try again".to_string()
    } else {
        fallback.to_string()
    }
}

fn exit_message(output: &CommandOutput) -> String {
    match output.exit_code {
        Some(code) => format!("exited with code {}", code),
        None => "terminated by a signal".to_string(),
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Run a command and hand back its output whatever the exit status.
///
/// Only failures to run at all are errors; use this when a non-zero exit is
/// an answer rather than a failure.
pub async fn run_unchecked(
    runner: &dyn CommandRunner,
    command: &CommandSpec,
    limit: Duration,
) -> Result<CommandOutput, BootstrapError> {
    runner
        .run(command, limit)
        .await
        .map_err(|e| run_error(command, e))
}

/// Run a command and require exit status 0.
pub async fn run_checked(
    runner: &dyn CommandRunner,
    command: &CommandSpec,
    limit: Duration,
) -> Result<CommandOutput, BootstrapError> {
    let output = run_unchecked(runner, command, limit).await?;
    if output.success() {
        return Ok(output);
    }

    Err(BootstrapError::CommandFailed {
        command: command.display(),
        message: exit_message(&output),
        exit_code: output.exit_code,
        fix: failure_fix(&output.stderr, "See the command output above for details"),
        stderr: non_empty(&output.stderr),
    })
}

/// Ask the package manager to install or upgrade `package`.
pub async fn install_package(
    runner: &dyn CommandRunner,
    command: &CommandSpec,
    limit: Duration,
    package: &str,
) -> Result<CommandOutput, BootstrapError> {
    let output = match runner.run(command, limit).await {
        Ok(output) => output,
        Err(RunError::Timeout(after)) => {
            return Err(BootstrapError::InstallFailure {
                package: package.to_string(),
                message: format!("timed out after {:?}", after),
                exit_code: None,
                stderr: None,
                fix: "Installation timed out. Check the network or raise install_timeout_secs"
                    .to_string(),
            })
        }
        Err(e) => {
            return Err(BootstrapError::InstallFailure {
                package: package.to_string(),
                message: e.to_string(),
                exit_code: None,
                stderr: None,
                fix: "Check that the package manager runs from a terminal".to_string(),
            })
        }
    };

    if output.success() {
        return Ok(output);
    }

    Err(BootstrapError::InstallFailure {
        package: package.to_string(),
        message: exit_message(&output),
        exit_code: output.exit_code,
        fix: failure_fix(
            &output.stderr,
            "See the package manager output above for details",
        ),
        stderr: non_empty(&output.stderr),
    })
}

fn run_error(command: &CommandSpec, error: RunError) -> BootstrapError {
    let fix = match &error {
        RunError::NotFound => format!("{} is missing; re-run to recreate it", command.program),
        RunError::PermissionDenied => format!("Make {} executable", command.program),
        RunError::Timeout(_) => "Check the network or raise install_timeout_secs".to_string(),
        _ => "Check the command and try again".to_string(),
    };
    BootstrapError::CommandFailed {
        command: command.display(),
        message: error.to_string(),
        exit_code: None,
        stderr: None,
        fix,
    }
}

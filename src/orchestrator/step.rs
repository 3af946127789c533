//! The unit of work the runner executes.

use super::RunContext;
use crate::install::BootstrapError;
use futures::future::BoxFuture;

/// What a failing step does to the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Severity {
    /// Abort the run.
    #[default]
    Fatal,
    /// Log a warning and continue.
    NonFatal,
}

/// One named unit of the bootstrap sequence.
///
/// The runner first asks [`is_satisfied`](Step::is_satisfied); only when that
/// returns `Ok(false)` does it call [`execute`](Step::execute). An error from
/// either counts as the step failing.
pub trait Step: Send + Sync {
    /// Human-readable name, used in logs and in the final error line.
    fn name(&self) -> &str;

    fn severity(&self) -> Severity {
        Severity::Fatal
    }

    /// Whether the step's effect is already in place.
    fn is_satisfied<'a>(&'a self, ctx: &'a RunContext) -> BoxFuture<'a, Result<bool, BootstrapError>>;

    /// Bring about the step's effect.
    fn execute<'a>(&'a self, ctx: &'a mut RunContext) -> BoxFuture<'a, Result<(), BootstrapError>>;
}

/// Outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    /// The precondition held.
    Skipped,
    /// The action ran and succeeded.
    Succeeded,
    /// The precondition check or the action failed.
    Failed {
        /// Exit code attributed to the failure.
        exit_code: i32,
        /// Error message.
        message: String,
    },
}

impl ExecutionResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// A step's name together with what happened to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// Step name.
    pub name: String,
    /// Severity the step was declared with.
    pub severity: Severity,
    /// What happened.
    pub result: ExecutionResult,
}

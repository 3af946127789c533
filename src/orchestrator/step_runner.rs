//! Sequential, fail-fast execution of steps.

use super::{ExecutionResult, RunContext, Severity, Step, StepEvent, StepRecord};
use crate::install::BootstrapError;

type Observer = Box<dyn Fn(&StepEvent) + Send + Sync>;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step was skipped or succeeded (non-fatal failures aside).
    Completed,
    /// A fatal step failed.
    Aborted {
        /// The failing step.
        step: String,
        /// Exit code of the run.
        exit_code: i32,
        /// Error message.
        message: String,
    },
}

/// Everything that happened during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// One record per step that was reached, in order.
    pub records: Vec<StepRecord>,
    /// How the run ended.
    pub outcome: RunOutcome,
}

impl RunReport {
    /// `0` when completed, the failing step's exit code otherwise.
    pub fn exit_code(&self) -> i32 {
        match &self.outcome {
            RunOutcome::Completed => 0,
            RunOutcome::Aborted { exit_code, .. } => *exit_code,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    /// The record for `name`, if that step was reached.
    pub fn record(&self, name: &str) -> Option<&StepRecord> {
        self.records.iter().find(|r| r.name == name)
    }
}

/// Executes an ordered list of steps against a [`RunContext`].
///
/// Steps run strictly one after another. The first fatal failure aborts the
/// run: an active virtual environment is deactivated, the fix suggestion is
/// logged, and the last line logged names the step and its exit code.
///
/// # Example
///
/// ```rust,no_run
/// use llms_bootstrap::install::PackageManager;
/// use llms_bootstrap::{bootstrap_plan, RunContext, SearchPath, Settings, SystemRunner};
/// use std::sync::Arc;
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let settings = Settings::default();
/// let runner = bootstrap_plan(&settings).with_observer(|event| println!("{:?}", event));
/// let mut ctx = RunContext::new(
///     Arc::new(SystemRunner),
///     settings,
///     PackageManager::at("/opt/homebrew/bin/brew"),
///     SearchPath::from_env(),
/// );
/// let report = runner.run(&mut ctx).await;
/// std::process::exit(report.exit_code());
/// # });
/// ```
#[derive(Default)]
pub struct StepRunner {
    steps: Vec<Box<dyn Step>>,
    observer: Option<Observer>,
}

impl StepRunner {
    /// A runner with no steps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    pub fn step(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Append an already boxed step.
    pub fn push(&mut self, step: Box<dyn Step>) {
        self.steps.push(step);
    }

    /// Receive a [`StepEvent`] for every state transition.
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&StepEvent) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Step names, in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    fn emit(&self, event: StepEvent) {
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }

    /// Run every step in order.
    pub async fn run(&self, ctx: &mut RunContext) -> RunReport {
        let logger = ctx.logger();
        let mut records = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            let name = step.name().to_string();
            self.emit(StepEvent::Started { step: name.clone() });

            let satisfied = step.is_satisfied(ctx).await;
            let attempt = match satisfied {
                Ok(true) => {
                    logger.info(format!("{}: already satisfied, skipping", name));
                    self.emit(StepEvent::Skipped { step: name.clone() });
                    records.push(StepRecord {
                        name,
                        severity: step.severity(),
                        result: ExecutionResult::Skipped,
                    });
                    continue;
                }
                Ok(false) => {
                    logger.info(format!("{}...", name));
                    self.emit(StepEvent::Running { step: name.clone() });
                    step.execute(ctx).await
                }
                Err(e) => Err(e),
            };

            let error = match attempt {
                Ok(()) => {
                    logger.info(format!("{}: done", name));
                    self.emit(StepEvent::Succeeded { step: name.clone() });
                    records.push(StepRecord {
                        name,
                        severity: step.severity(),
                        result: ExecutionResult::Succeeded,
                    });
                    continue;
                }
                Err(e) => e,
            };

            let exit_code = error.exit_code();
            let message = error.to_string();
            records.push(StepRecord {
                name: name.clone(),
                severity: step.severity(),
                result: ExecutionResult::Failed {
                    exit_code,
                    message: message.clone(),
                },
            });

            if step.severity() == Severity::NonFatal {
                logger.warn(format!("{}: {} (continuing)", name, message));
                self.emit(StepEvent::Warned { step: name, message });
                continue;
            }

            self.emit(StepEvent::Failed {
                step: name.clone(),
                exit_code,
                message: message.clone(),
            });
            abort(ctx, &name, &error);
            self.emit(StepEvent::Aborted {
                step: name.clone(),
                exit_code,
            });
            return RunReport {
                records,
                outcome: RunOutcome::Aborted {
                    step: name,
                    exit_code,
                    message,
                },
            };
        }

        let succeeded = count(&records, |r| r == &ExecutionResult::Succeeded);
        let skipped = count(&records, |r| r == &ExecutionResult::Skipped);
        let warned = count(&records, ExecutionResult::is_failure);
        logger.info(format!(
            "Bootstrap complete: {} ran, {} already satisfied, {} warnings",
            succeeded, skipped, warned
        ));
        self.emit(StepEvent::Completed { succeeded, skipped });

        RunReport {
            records,
            outcome: RunOutcome::Completed,
        }
    }
}

fn count(records: &[StepRecord], predicate: impl Fn(&ExecutionResult) -> bool) -> usize {
    records.iter().filter(|r| predicate(&r.result)).count()
}

/// Clean up after a fatal failure and log it. The error line is always last.
fn abort(ctx: &mut RunContext, step: &str, error: &BootstrapError) {
    let logger = ctx.logger();
    if let Some(venv) = ctx.deactivate() {
        logger.info(format!(
            "Deactivated virtual environment {}",
            venv.root.display()
        ));
    }
    logger.info(format!("To fix: {}", error.fix_suggestion()));
    logger.error(format!(
        "Step '{}' failed with exit code {}: {}",
        step,
        error.exit_code(),
        error
    ));
}

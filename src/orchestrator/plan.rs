//! The default step list and the top-level entry point.

use super::steps::{
    ActivateVirtualEnv, CheckApplication, CreateVirtualEnv, DetectEnvironment, EnsureInterpreter,
    InstallApplication, InstallFormula, RemoveApplication, UpdateProfile,
};
use super::{RunContext, RunOutcome, RunReport, StepEvent, StepRunner};
use crate::config::{ReinstallPolicy, Settings};
use crate::detection::SearchPath;
use crate::install::PackageManager;
use crate::logger::Logger;
use crate::runner::CommandRunner;
use crate::tool::Tool;
use std::sync::Arc;

/// Name recorded when the run aborts before any step.
pub const DISCOVER_PACKAGE_MANAGER: &str = "Discover package manager";

type Observer = Arc<dyn Fn(&StepEvent) + Send + Sync>;

/// Build the ordered step list for `settings`.
///
/// ```rust
/// use llms_bootstrap::{bootstrap_plan, ReinstallPolicy, Settings};
///
/// let forced = bootstrap_plan(&Settings::default());
/// assert!(forced.names().contains(&"Remove previous local-llms"));
///
/// let lenient = bootstrap_plan(&Settings {
///     reinstall: ReinstallPolicy::SkipIfPresent,
///     ..Default::default()
/// });
/// assert!(!lenient.names().contains(&"Remove previous local-llms"));
/// ```
pub fn bootstrap_plan(settings: &Settings) -> StepRunner {
    let mut plan = StepRunner::new()
        .step(DetectEnvironment)
        .step(EnsureInterpreter)
        .step(UpdateProfile);

    for tool in Tool::all().filter(|t| *t != Tool::Interpreter && t.formula().is_some()) {
        plan.push(Box::new(InstallFormula::new(tool)));
    }

    plan = plan
        .step(CreateVirtualEnv)
        .step(ActivateVirtualEnv)
        .step(CheckApplication);

    if settings.reinstall == ReinstallPolicy::Force {
        plan = plan.step(RemoveApplication);
    }

    plan.step(InstallApplication::new(settings.reinstall))
}

/// Runs a whole bootstrap: package-manager discovery, then the plan.
///
/// # Example
///
/// ```rust,no_run
/// use llms_bootstrap::{Bootstrapper, Settings, SystemRunner};
/// use std::sync::Arc;
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let report = Bootstrapper::new(Settings::default(), Arc::new(SystemRunner))
///         .run()
///         .await;
///     std::process::exit(report.exit_code());
/// }
/// ```
pub struct Bootstrapper {
    settings: Settings,
    runner: Arc<dyn CommandRunner>,
    search_path: SearchPath,
    observer: Option<Observer>,
}

impl Bootstrapper {
    /// A bootstrapper starting from the process `PATH`.
    pub fn new(settings: Settings, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            settings,
            runner,
            search_path: SearchPath::from_env(),
            observer: None,
        }
    }

    /// Start from `search_path` instead of the process `PATH`.
    pub fn with_search_path(mut self, search_path: SearchPath) -> Self {
        self.search_path = search_path;
        self
    }

    /// Receive every [`StepEvent`].
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&StepEvent) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Run to completion or to the first fatal failure.
    ///
    /// Without a discoverable package manager nothing runs and the exit code
    /// is 1.
    pub async fn run(&self) -> RunReport {
        let logger = Logger;
        let package_manager = match PackageManager::discover(
            self.runner.as_ref(),
            &self.search_path,
            self.settings.install_prefix.as_deref(),
        ) {
            Ok(pm) => pm,
            Err(error) => {
                let exit_code = error.exit_code();
                let message = error.to_string();
                logger.info(format!("To fix: {}", error.fix_suggestion()));
                logger.error(format!(
                    "Step '{}' failed with exit code {}: {}",
                    DISCOVER_PACKAGE_MANAGER, exit_code, message
                ));
                if let Some(observer) = &self.observer {
                    observer(&StepEvent::Aborted {
                        step: DISCOVER_PACKAGE_MANAGER.to_string(),
                        exit_code,
                    });
                }
                return RunReport {
                    records: Vec::new(),
                    outcome: RunOutcome::Aborted {
                        step: DISCOVER_PACKAGE_MANAGER.to_string(),
                        exit_code,
                        message,
                    },
                };
            }
        };
        logger.info(format!(
            "Using package manager at {}",
            package_manager.program().display()
        ));

        let mut plan = bootstrap_plan(&self.settings);
        if let Some(observer) = self.observer.clone() {
            plan = plan.with_observer(move |event| observer(event));
        }

        let mut ctx = RunContext::new(
            Arc::clone(&self.runner),
            self.settings.clone(),
            package_manager,
            self.search_path.clone(),
        );
        plan.run(&mut ctx).await
    }
}

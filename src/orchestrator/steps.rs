//! The concrete steps of a bootstrap run.

use super::{RunContext, Severity, Step};
use crate::config::ReinstallPolicy;
use crate::detector::EnvironmentDetector;
use crate::install::commands::{self, APP_PACKAGE};
use crate::install::{install_package, run_checked, run_unchecked, BootstrapError};
use crate::profile::{self, MutationOutcome};
use crate::tool::Tool;
use futures::future::BoxFuture;
use futures::FutureExt;

pub const DETECT_ENVIRONMENT: &str = "Detect environment";
pub const ENSURE_INTERPRETER: &str = "Ensure Python";
pub const UPDATE_PROFILE: &str = "Update shell profile";
pub const CREATE_VENV: &str = "Create virtual environment";
pub const ACTIVATE_VENV: &str = "Activate virtual environment";
pub const CHECK_APPLICATION: &str = "Check existing local-llms";
pub const REMOVE_APPLICATION: &str = "Remove previous local-llms";
pub const INSTALL_APPLICATION: &str = "Install local-llms";

/// Seal [`EnvironmentFacts`](crate::EnvironmentFacts) for the run.
pub struct DetectEnvironment;

impl Step for DetectEnvironment {
    fn name(&self) -> &str {
        DETECT_ENVIRONMENT
    }

    fn is_satisfied<'a>(&'a self, ctx: &'a RunContext) -> BoxFuture<'a, Result<bool, BootstrapError>> {
        async move { Ok(ctx.is_detected()) }.boxed()
    }

    fn execute<'a>(&'a self, ctx: &'a mut RunContext) -> BoxFuture<'a, Result<(), BootstrapError>> {
        async move {
            let facts = EnvironmentDetector::new(
                ctx.runner(),
                ctx.search_path(),
                ctx.settings(),
                ctx.package_manager(),
            )
            .detect()
            .await?;

            let logger = ctx.logger();
            logger.info(format!(
                "Architecture {} ({}), install prefix {}",
                facts.arch_identifier,
                facts.arch,
                facts.prefix.display()
            ));
            match facts.interpreter.ready() {
                Some(python) => logger.info(format!(
                    "Found {} {} at {} ({})",
                    Tool::Interpreter.display_name(),
                    python.version,
                    python.path.display(),
                    python.source
                )),
                None => logger.info(format!(
                    "No {} {} or newer found",
                    Tool::Interpreter.display_name(),
                    ctx.settings().min_interpreter_version
                )),
            }

            ctx.seal_facts(facts)
        }
        .boxed()
    }
}

/// Install or upgrade the interpreter when detection found none usable.
pub struct EnsureInterpreter;

impl Step for EnsureInterpreter {
    fn name(&self) -> &str {
        ENSURE_INTERPRETER
    }

    fn is_satisfied<'a>(&'a self, ctx: &'a RunContext) -> BoxFuture<'a, Result<bool, BootstrapError>> {
        async move { Ok(ctx.facts()?.interpreter.ready().is_some()) }.boxed()
    }

    fn execute<'a>(&'a self, ctx: &'a mut RunContext) -> BoxFuture<'a, Result<(), BootstrapError>> {
        async move {
            let interpreter = {
                let facts = ctx.facts()?;
                EnvironmentDetector::new(
                    ctx.runner(),
                    ctx.search_path(),
                    ctx.settings(),
                    ctx.package_manager(),
                )
                .install_interpreter(facts)
                .await?
            };
            ctx.logger().info(format!(
                "Using {} {} at {}",
                Tool::Interpreter.display_name(),
                interpreter.version,
                interpreter.path.display()
            ));
            ctx.set_interpreter(interpreter);
            Ok(())
        }
        .boxed()
    }
}

/// Append the prefix PATH export to the shell profile.
pub struct UpdateProfile;

impl Step for UpdateProfile {
    fn name(&self) -> &str {
        UPDATE_PROFILE
    }

    fn is_satisfied<'a>(&'a self, ctx: &'a RunContext) -> BoxFuture<'a, Result<bool, BootstrapError>> {
        async move {
            let line = ctx.facts()?.path_export_line();
            Ok(profile::contains_entry(&ctx.settings().profile_path, &line)?)
        }
        .boxed()
    }

    fn execute<'a>(&'a self, ctx: &'a mut RunContext) -> BoxFuture<'a, Result<(), BootstrapError>> {
        async move {
            let line = ctx.facts()?.path_export_line();
            let path = &ctx.settings().profile_path;
            let logger = ctx.logger();

            match profile::ensure_path_entry(path, &line)? {
                MutationOutcome::AlreadyPresent => {}
                MutationOutcome::Appended { backup } => {
                    if let Some(backup) = backup {
                        logger.info(format!("Backed up {} to {}", path.display(), backup.display()));
                    }
                    logger.info(format!("Added `{}` to {}", line, path.display()));
                }
            }
            Ok(())
        }
        .boxed()
    }
}

/// Install a package-manager formula unless its executable is present.
pub struct InstallFormula {
    tool: Tool,
    name: String,
}

impl InstallFormula {
    pub fn new(tool: Tool) -> Self {
        Self {
            tool,
            name: format!("Install {}", tool.display_name()),
        }
    }
}

impl Step for InstallFormula {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_satisfied<'a>(&'a self, ctx: &'a RunContext) -> BoxFuture<'a, Result<bool, BootstrapError>> {
        async move {
            let Some(executable) = self.tool.executable_name() else {
                return Ok(false);
            };
            let under_prefix = ctx.facts()?.prefix_bin().join(executable);
            let probe = ctx.probe();
            Ok(probe.exists(executable) || probe.exists(&under_prefix.to_string_lossy()))
        }
        .boxed()
    }

    fn execute<'a>(&'a self, ctx: &'a mut RunContext) -> BoxFuture<'a, Result<(), BootstrapError>> {
        async move {
            let formula = self.tool.formula().ok_or_else(|| BootstrapError::PrerequisiteMissing {
                name: self.tool.display_name().to_string(),
                fix: "This tool is not installed through the package manager".to_string(),
            })?;
            let command = ctx.command(ctx.package_manager().install_command(formula));
            ctx.logger().info(format!("Running {}", command.display()));
            install_package(
                ctx.runner(),
                &command,
                ctx.settings().install_timeout(),
                formula,
            )
            .await?;
            Ok(())
        }
        .boxed()
    }
}

/// Create the virtual environment with the selected interpreter.
pub struct CreateVirtualEnv;

impl Step for CreateVirtualEnv {
    fn name(&self) -> &str {
        CREATE_VENV
    }

    fn is_satisfied<'a>(&'a self, ctx: &'a RunContext) -> BoxFuture<'a, Result<bool, BootstrapError>> {
        async move { Ok(ctx.venv().is_created()) }.boxed()
    }

    fn execute<'a>(&'a self, ctx: &'a mut RunContext) -> BoxFuture<'a, Result<(), BootstrapError>> {
        async move {
            let venv = ctx.venv();
            let interpreter = ctx.interpreter()?;
            let command = ctx.command(commands::create_venv(&interpreter.path, &venv));
            ctx.logger().info(format!("Running {}", command.display()));
            run_checked(ctx.runner(), &command, ctx.settings().install_timeout()).await?;

            // A zero exit is not enough; the directory stays for inspection
            if !venv.is_created() {
                return Err(BootstrapError::ActivationFailure {
                    expected: venv.activation_script(),
                    venv: venv.root,
                });
            }
            Ok(())
        }
        .boxed()
    }
}

/// Make the virtual environment the active one for the rest of the run.
pub struct ActivateVirtualEnv;

impl Step for ActivateVirtualEnv {
    fn name(&self) -> &str {
        ACTIVATE_VENV
    }

    fn is_satisfied<'a>(&'a self, ctx: &'a RunContext) -> BoxFuture<'a, Result<bool, BootstrapError>> {
        async move { Ok(ctx.active_venv() == Some(&ctx.venv())) }.boxed()
    }

    fn execute<'a>(&'a self, ctx: &'a mut RunContext) -> BoxFuture<'a, Result<(), BootstrapError>> {
        async move {
            let venv = ctx.venv();
            let root = venv.root.clone();
            ctx.activate(venv)?;
            ctx.logger().info(format!("Activated {}", root.display()));
            Ok(())
        }
        .boxed()
    }
}

/// `pip show` the application; a miss is reported, never fatal.
pub struct CheckApplication;

impl Step for CheckApplication {
    fn name(&self) -> &str {
        CHECK_APPLICATION
    }

    fn severity(&self) -> Severity {
        Severity::NonFatal
    }

    fn is_satisfied<'a>(&'a self, _ctx: &'a RunContext) -> BoxFuture<'a, Result<bool, BootstrapError>> {
        async move { Ok(false) }.boxed()
    }

    fn execute<'a>(&'a self, ctx: &'a mut RunContext) -> BoxFuture<'a, Result<(), BootstrapError>> {
        async move {
            let command = ctx.command(commands::pip_show(&ctx.active_python()?, APP_PACKAGE));
            let output =
                run_unchecked(ctx.runner(), &command, ctx.settings().install_timeout()).await?;

            if !output.success() {
                return Err(BootstrapError::CommandFailed {
                    command: command.display(),
                    message: format!("{} is not previously installed", APP_PACKAGE),
                    exit_code: output.exit_code,
                    stderr: None,
                    fix: "Nothing to do; it will be installed next".to_string(),
                });
            }

            let version = shown_version(&output.stdout).unwrap_or("unknown version");
            ctx.logger()
                .info(format!("{} {} is installed", APP_PACKAGE, version));
            Ok(())
        }
        .boxed()
    }
}

/// The `Version:` field of `pip show` output.
fn shown_version(stdout: &str) -> Option<&str> {
    stdout
        .lines()
        .find_map(|line| line.strip_prefix("Version:"))
        .map(str::trim)
        .filter(|version| !version.is_empty())
}

/// Uninstall the application ahead of a forced reinstall.
pub struct RemoveApplication;

impl Step for RemoveApplication {
    fn name(&self) -> &str {
        REMOVE_APPLICATION
    }

    fn severity(&self) -> Severity {
        Severity::NonFatal
    }

    fn is_satisfied<'a>(&'a self, _ctx: &'a RunContext) -> BoxFuture<'a, Result<bool, BootstrapError>> {
        async move { Ok(false) }.boxed()
    }

    fn execute<'a>(&'a self, ctx: &'a mut RunContext) -> BoxFuture<'a, Result<(), BootstrapError>> {
        async move {
            let command =
                ctx.command(commands::pip_uninstall(&ctx.active_python()?, APP_PACKAGE));
            run_checked(ctx.runner(), &command, ctx.settings().install_timeout()).await?;
            Ok(())
        }
        .boxed()
    }
}

/// Install the pinned application reference with pip.
pub struct InstallApplication {
    policy: ReinstallPolicy,
}

impl InstallApplication {
    pub fn new(policy: ReinstallPolicy) -> Self {
        Self { policy }
    }
}

impl Step for InstallApplication {
    fn name(&self) -> &str {
        INSTALL_APPLICATION
    }

    fn is_satisfied<'a>(&'a self, ctx: &'a RunContext) -> BoxFuture<'a, Result<bool, BootstrapError>> {
        async move {
            if self.policy == ReinstallPolicy::Force {
                return Ok(false);
            }
            let command = ctx.command(commands::pip_show(&ctx.active_python()?, APP_PACKAGE));
            let output =
                run_unchecked(ctx.runner(), &command, ctx.settings().probe_timeout()).await?;
            Ok(output.success())
        }
        .boxed()
    }

    fn execute<'a>(&'a self, ctx: &'a mut RunContext) -> BoxFuture<'a, Result<(), BootstrapError>> {
        async move {
            let requirement = ctx.settings().app_requirement();
            let python = ctx.active_python()?;
            let command = ctx.command(commands::pip_install(&python, &requirement));
            ctx.logger().info(format!("Running {}", command.display()));
            run_checked(ctx.runner(), &command, ctx.settings().install_timeout())
                .await
                .map_err(|e| match e {
                    BootstrapError::CommandFailed {
                        message,
                        exit_code,
                        stderr,
                        fix,
                        ..
                    } => BootstrapError::InstallFailure {
                        package: APP_PACKAGE.to_string(),
                        message,
                        exit_code,
                        stderr,
                        fix,
                    },
                    other => other,
                })?;
            Ok(())
        }
        .boxed()
    }
}

//! State shared by the steps of one run.

use crate::detection::{CommandProbe, SearchPath};
use crate::facts::{EnvironmentFacts, Interpreter, VirtualEnvironment};
use crate::install::{BootstrapError, PackageManager};
use crate::logger::Logger;
use crate::runner::{CommandRunner, CommandSpec};
use crate::tool::Tool;
use crate::Settings;
use std::env::JoinPathsError;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

#[derive(Debug)]
struct Activation {
    venv: VirtualEnvironment,
    saved_path: SearchPath,
}

/// Run-scoped state passed to every step.
///
/// Holds the command runner, the settings and the search path as this run
/// sees it. [`EnvironmentFacts`] are sealed once by the detection step and
/// only read afterwards.
pub struct RunContext {
    runner: Arc<dyn CommandRunner>,
    settings: Settings,
    logger: Logger,
    package_manager: PackageManager,
    search_path: SearchPath,
    facts: OnceLock<EnvironmentFacts>,
    installed_interpreter: Option<Interpreter>,
    activation: Option<Activation>,
}

impl RunContext {
    /// A fresh context with no facts and no active environment.
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        settings: Settings,
        package_manager: PackageManager,
        search_path: SearchPath,
    ) -> Self {
        Self {
            runner,
            settings,
            logger: Logger,
            package_manager,
            search_path,
            facts: OnceLock::new(),
            installed_interpreter: None,
            activation: None,
        }
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn logger(&self) -> Logger {
        self.logger
    }

    pub fn package_manager(&self) -> &PackageManager {
        &self.package_manager
    }

    /// The search path children of this run see.
    pub fn search_path(&self) -> &SearchPath {
        &self.search_path
    }

    /// A probe over the run's search path with the configured timeout.
    pub fn probe(&self) -> CommandProbe<'_> {
        CommandProbe::new(self.runner(), &self.search_path)
            .with_timeout(self.settings.probe_timeout())
    }

    /// The sealed facts.
    pub fn facts(&self) -> Result<&EnvironmentFacts, BootstrapError> {
        self.facts.get().ok_or(BootstrapError::EnvironmentNotDetected)
    }

    /// Whether detection has already run.
    pub fn is_detected(&self) -> bool {
        self.facts.get().is_some()
    }

    /// Store the detection result and put `<prefix>/bin` on the search path.
    ///
    /// Facts can be sealed only once; a second call is ignored. Nothing is
    /// sealed when the prefix cannot be put on the search path.
    pub fn seal_facts(&mut self, facts: EnvironmentFacts) -> Result<(), BootstrapError> {
        if self.is_detected() {
            tracing::debug!(target: "bootstrap", "environment facts already sealed");
            return Ok(());
        }
        let prefix_bin = facts.prefix_bin();
        if !self.search_path.entries().contains(&prefix_bin) {
            self.search_path
                .prepend(&prefix_bin)
                .map_err(|e| path_entry_error(&prefix_bin, e))?;
        }
        let _ = self.facts.set(facts);
        Ok(())
    }

    /// The interpreter the rest of the run uses.
    pub fn interpreter(&self) -> Result<&Interpreter, BootstrapError> {
        if let Some(installed) = &self.installed_interpreter {
            return Ok(installed);
        }
        self.facts()?
            .interpreter
            .ready()
            .ok_or_else(|| BootstrapError::PrerequisiteMissing {
                name: Tool::Interpreter.display_name().to_string(),
                fix: format!(
                    "Install {} {} or newer",
                    Tool::Interpreter.display_name(),
                    self.settings.min_interpreter_version
                ),
            })
    }

    /// Record the interpreter installed during this run.
    pub fn set_interpreter(&mut self, interpreter: Interpreter) {
        self.installed_interpreter = Some(interpreter);
    }

    /// The virtual environment this run manages.
    pub fn venv(&self) -> VirtualEnvironment {
        VirtualEnvironment::new(&self.settings.work_dir, &self.settings.venv_name)
    }

    /// The active virtual environment, if any.
    pub fn active_venv(&self) -> Option<&VirtualEnvironment> {
        self.activation.as_ref().map(|a| &a.venv)
    }

    /// Activate `venv` for the rest of the run.
    ///
    /// Prepends its `bin` directory to the run's search path and exports
    /// `VIRTUAL_ENV` to children. Fails if the activation script is missing.
    pub fn activate(&mut self, venv: VirtualEnvironment) -> Result<(), BootstrapError> {
        if !venv.is_created() {
            return Err(BootstrapError::ActivationFailure {
                expected: venv.activation_script(),
                venv: venv.root,
            });
        }

        let saved_path = match &self.activation {
            // Switching environments restores the pre-activation path first
            Some(previous) => previous.saved_path.clone(),
            None => self.search_path.clone(),
        };
        let bin_dir = venv.bin_dir();
        let mut search_path = saved_path.clone();
        search_path
            .prepend(&bin_dir)
            .map_err(|e| path_entry_error(&bin_dir, e))?;

        self.search_path = search_path;
        self.activation = Some(Activation { venv, saved_path });
        Ok(())
    }

    /// Undo [`activate`](Self::activate). Returns the environment that was
    /// active, if any.
    pub fn deactivate(&mut self) -> Option<VirtualEnvironment> {
        let activation = self.activation.take()?;
        self.search_path = activation.saved_path;
        Some(activation.venv)
    }

    /// The active environment's interpreter.
    pub fn active_python(&self) -> Result<PathBuf, BootstrapError> {
        match &self.activation {
            Some(activation) => Ok(activation.venv.python()),
            None => {
                let venv = self.venv();
                Err(BootstrapError::ActivationFailure {
                    expected: venv.activation_script(),
                    venv: venv.root,
                })
            }
        }
    }

    /// Environment variables every child of this run receives.
    pub fn command_env(&self) -> Vec<(String, String)> {
        let mut env = vec![(
            "PATH".to_string(),
            self.search_path.to_os_string().to_string_lossy().into_owned(),
        )];
        if let Some(activation) = &self.activation {
            env.push((
                "VIRTUAL_ENV".to_string(),
                activation.venv.root.to_string_lossy().into_owned(),
            ));
        }
        env
    }

    /// `command` with the run's environment attached.
    pub fn command(&self, command: CommandSpec) -> CommandSpec {
        command.with_env(self.command_env())
    }
}

fn path_entry_error(dir: &Path, source: JoinPathsError) -> BootstrapError {
    BootstrapError::IoFailure {
        context: format!("adding {} to PATH", dir.display()),
        backup: None,
        source: io::Error::new(io::ErrorKind::InvalidInput, source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{ArchClass, InterpreterSelection, InterpreterSource};
    use crate::runner::ScriptedRunner;

    fn context(work_dir: &Path) -> RunContext {
        let settings = Settings {
            work_dir: work_dir.to_path_buf(),
            ..Default::default()
        };
        RunContext::new(
            Arc::new(ScriptedRunner::new()),
            settings,
            PackageManager::at("/opt/homebrew/bin/brew"),
            SearchPath::from_os(&"/usr/bin:/bin".into()),
        )
    }

    fn facts(interpreter: InterpreterSelection) -> EnvironmentFacts {
        EnvironmentFacts {
            arch_identifier: "arm64".to_string(),
            arch: ArchClass::Arm,
            prefix: PathBuf::from("/opt/homebrew"),
            package_manager: PathBuf::from("/opt/homebrew/bin/brew"),
            interpreter,
        }
    }

    fn make_venv(venv: &VirtualEnvironment) {
        std::fs::create_dir_all(venv.bin_dir()).unwrap();
        std::fs::write(venv.activation_script(), "# activate\n").unwrap();
    }

    #[test]
    fn test_facts_before_detection() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        assert!(matches!(
            ctx.facts(),
            Err(BootstrapError::EnvironmentNotDetected)
        ));
        assert!(ctx.interpreter().is_err());
    }

    #[test]
    fn test_facts_are_sealed_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path());
        ctx.seal_facts(facts(InterpreterSelection::NeedsInstall { outdated: None })).unwrap();

        let mut other = facts(InterpreterSelection::NeedsInstall { outdated: None });
        other.prefix = PathBuf::from("/usr/local");
        ctx.seal_facts(other).unwrap();

        assert_eq!(ctx.facts().unwrap().prefix, PathBuf::from("/opt/homebrew"));
        assert_eq!(ctx.search_path().entries()[0], PathBuf::from("/opt/homebrew/bin"));
        assert!(!ctx
            .search_path()
            .entries()
            .contains(&PathBuf::from("/usr/local/bin")));
    }

    #[test]
    fn test_installed_interpreter_overrides_selection() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path());
        ctx.seal_facts(facts(InterpreterSelection::NeedsInstall { outdated: None })).unwrap();
        assert!(matches!(
            ctx.interpreter(),
            Err(BootstrapError::PrerequisiteMissing { .. })
        ));

        ctx.set_interpreter(Interpreter {
            path: PathBuf::from("/opt/homebrew/bin/python3"),
            version: "3.12.1".to_string(),
            source: InterpreterSource::PackageManager,
        });
        assert_eq!(ctx.interpreter().unwrap().version, "3.12.1");
    }

    #[test]
    fn test_activate_and_deactivate() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path());
        let venv = ctx.venv();
        make_venv(&venv);
        let before = ctx.search_path().clone();

        ctx.activate(venv.clone()).unwrap();
        assert_eq!(ctx.search_path().entries()[0], venv.bin_dir());
        assert_eq!(ctx.active_python().unwrap(), venv.python());
        assert!(ctx
            .command_env()
            .iter()
            .any(|(k, v)| k == "VIRTUAL_ENV" && Path::new(v) == venv.root));

        assert_eq!(ctx.deactivate(), Some(venv));
        assert_eq!(ctx.search_path(), &before);
        assert!(ctx.deactivate().is_none());
        assert!(ctx.command_env().iter().all(|(k, _)| k != "VIRTUAL_ENV"));
    }

    #[test]
    fn test_activate_without_script_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path());
        let venv = ctx.venv();
        std::fs::create_dir_all(&venv.root).unwrap();

        let err = ctx.activate(venv.clone()).unwrap_err();
        assert!(matches!(err, BootstrapError::ActivationFailure { .. }));
        assert!(ctx.active_venv().is_none());
        assert!(venv.root.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_activate_rejects_dir_that_breaks_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(&dir.path().join("my:proj"));
        let venv = ctx.venv();
        make_venv(&venv);
        let before = ctx.search_path().clone();

        let err = ctx.activate(venv).unwrap_err();
        assert!(matches!(err, BootstrapError::IoFailure { backup: None, .. }));
        assert!(ctx.active_venv().is_none());
        assert_eq!(ctx.search_path(), &before);
    }

    #[cfg(unix)]
    #[test]
    fn test_unusable_prefix_is_not_sealed() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path());
        let mut bad = facts(InterpreterSelection::NeedsInstall { outdated: None });
        bad.prefix = PathBuf::from("/opt/brew:x");

        assert!(matches!(
            ctx.seal_facts(bad),
            Err(BootstrapError::IoFailure { .. })
        ));
        assert!(!ctx.is_detected());
        assert_eq!(ctx.search_path().to_os_string(), "/usr/bin:/bin");
    }

    #[test]
    fn test_python_before_activation_fails() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        assert!(matches!(
            ctx.active_python(),
            Err(BootstrapError::ActivationFailure { .. })
        ));
    }

    #[test]
    fn test_command_carries_path() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let cmd = ctx.command(CommandSpec::new("brew", ["install", "pigz"]));
        assert_eq!(cmd.env_vars.len(), 1);
        assert_eq!(cmd.env_vars[0].0, "PATH");
        assert!(cmd.env_vars[0].1.contains("/usr/bin"));
    }
}

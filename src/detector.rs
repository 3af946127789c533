//! Host detection: architecture, install prefix and interpreter selection.

use crate::detection::{CommandProbe, ProbeError, SearchPath};
use crate::facts::{
    ArchClass, EnvironmentFacts, Interpreter, InterpreterSelection, InterpreterSource,
};
use crate::install::{install_package, BootstrapError, PackageManager};
use crate::runner::{CommandRunner, CommandSpec};
use crate::tool::Tool;
use crate::version;
use crate::Settings;
use std::path::{Path, PathBuf};

/// Flag every supported interpreter answers with its version.
const VERSION_FLAG: &str = "--version";

/// Computes [`EnvironmentFacts`] for one run.
///
/// Detection only probes; the one mutation it knows how to perform,
/// [`install_interpreter`](Self::install_interpreter), is invoked by the
/// interpreter step so that it shows up as a step of its own.
///
/// # Example
///
/// ```rust
/// use llms_bootstrap::install::PackageManager;
/// use llms_bootstrap::{
///     CommandOutput, EnvironmentDetector, InterpreterSource, ScriptedRunner, SearchPath, Settings,
/// };
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let runner = ScriptedRunner::new()
///     .with_executable("uname", "/usr/bin/uname")
///     .respond("/usr/bin/uname -m", CommandOutput::ok("arm64\n"))
///     .with_executable("python3", "/usr/bin/python3")
///     .respond("/usr/bin/python3 --version", CommandOutput::ok("Python 3.11.4\n"));
/// let path = SearchPath::empty();
/// let settings = Settings::default();
/// let brew = PackageManager::at("/opt/homebrew/bin/brew");
///
/// let facts = EnvironmentDetector::new(&runner, &path, &settings, &brew)
///     .detect()
///     .await
///     .unwrap();
/// assert_eq!(facts.prefix.to_str(), Some("/opt/homebrew"));
/// assert_eq!(facts.interpreter.ready().unwrap().source, InterpreterSource::System);
/// # });
/// ```
pub struct EnvironmentDetector<'a> {
    runner: &'a dyn CommandRunner,
    search_path: &'a SearchPath,
    settings: &'a Settings,
    package_manager: &'a PackageManager,
}

impl<'a> EnvironmentDetector<'a> {
    /// A detector reading the host through `runner`.
    pub fn new(
        runner: &'a dyn CommandRunner,
        search_path: &'a SearchPath,
        settings: &'a Settings,
        package_manager: &'a PackageManager,
    ) -> Self {
        Self {
            runner,
            search_path,
            settings,
            package_manager,
        }
    }

    fn probe(&self) -> CommandProbe<'a> {
        CommandProbe::new(self.runner, self.search_path).with_timeout(self.settings.probe_timeout())
    }

    /// Determine architecture, prefix and the best available interpreter.
    pub async fn detect(&self) -> Result<EnvironmentFacts, BootstrapError> {
        let arch_identifier = self.architecture().await;
        let arch = ArchClass::from_identifier(&arch_identifier);
        let prefix = self.resolve_prefix(arch);
        tracing::debug!(
            target: "bootstrap",
            "architecture {} ({}), prefix {}",
            arch_identifier,
            arch,
            prefix.display()
        );

        let interpreter = self.select_interpreter(&prefix).await?;

        Ok(EnvironmentFacts {
            arch_identifier,
            arch,
            prefix,
            package_manager: self.package_manager.program().to_path_buf(),
            interpreter,
        })
    }

    /// The raw CPU architecture identifier.
    ///
    /// Asks `uname -m` so that a translated process still sees the hardware
    /// architecture; falls back to the compile-time architecture.
    pub async fn architecture(&self) -> String {
        let probe = self.probe();
        if let Some(uname) = probe.locate("uname") {
            let command = CommandSpec::for_path(&uname, ["-m"]);
            match self.runner.run(&command, self.settings.probe_timeout()).await {
                Ok(output) if output.success() && !output.stdout.trim().is_empty() => {
                    return output.stdout.trim().to_string();
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(target: "bootstrap", "uname -m failed: {}", e);
                }
            }
        }
        std::env::consts::ARCH.to_string()
    }

    /// The configured prefix, or the conventional one for `arch`.
    pub fn resolve_prefix(&self, arch: ArchClass) -> PathBuf {
        self.settings
            .install_prefix
            .clone()
            .unwrap_or_else(|| arch.default_prefix())
    }

    /// Pick an interpreter meeting the minimum version.
    ///
    /// The one on the search path wins when it is new enough; otherwise the
    /// package manager's own under `prefix`. Only a missing executable counts
    /// as absent; any other probe failure is returned.
    pub async fn select_interpreter(
        &self,
        prefix: &Path,
    ) -> Result<InterpreterSelection, BootstrapError> {
        let minimum = &self.settings.min_interpreter_version;

        let system = self.probe_interpreter(interpreter_name(), prefix).await?;
        if let Some(found) = &system {
            if version::meets_minimum(&found.version, minimum) {
                return Ok(InterpreterSelection::Ready(found.clone()));
            }
            tracing::info!(
                target: "bootstrap",
                "{} {} at {} is older than {}",
                Tool::Interpreter.display_name(),
                found.version,
                found.path.display(),
                minimum
            );
        }

        let managed_path = managed_interpreter(prefix);
        let managed = match &system {
            // Already probed; don't ask twice
            Some(found) if found.path == managed_path => Some(found.clone()),
            _ => {
                self.probe_interpreter(&managed_path.to_string_lossy(), prefix)
                    .await?
            }
        };

        Ok(match managed {
            Some(found) if version::meets_minimum(&found.version, minimum) => {
                InterpreterSelection::Ready(found)
            }
            outdated => InterpreterSelection::NeedsInstall { outdated },
        })
    }

    async fn probe_interpreter(
        &self,
        name: &str,
        prefix: &Path,
    ) -> Result<Option<Interpreter>, BootstrapError> {
        let probe = self.probe();
        let Some(path) = probe.locate(name) else {
            return Ok(None);
        };
        match probe.version_of(name, VERSION_FLAG).await {
            Ok(version) => Ok(Some(Interpreter {
                source: source_for(&path, prefix),
                path,
                version,
            })),
            Err(ProbeError::NotFound(_)) => Ok(None),
            Err(e) => Err(BootstrapError::probe(e)),
        }
    }

    /// Install or upgrade the package manager's interpreter and re-probe it.
    ///
    /// Upgrades when an outdated managed interpreter was detected, installs
    /// otherwise. Anything short of a new-enough interpreter afterwards is an
    /// error.
    pub async fn install_interpreter(
        &self,
        facts: &EnvironmentFacts,
    ) -> Result<Interpreter, BootstrapError> {
        let formula = Tool::Interpreter.formula().unwrap_or("python");
        let upgrade = matches!(
            facts.interpreter,
            InterpreterSelection::NeedsInstall {
                outdated: Some(Interpreter {
                    source: InterpreterSource::PackageManager,
                    ..
                })
            }
        );

        let command = if upgrade {
            self.package_manager.upgrade_command(formula)
        } else {
            self.package_manager.install_command(formula)
        };
        let command = command.with_env(vec![(
            "PATH".to_string(),
            self.search_path.to_os_string().to_string_lossy().into_owned(),
        )]);

        tracing::info!(target: "bootstrap", "running {}", command.display());
        install_package(
            self.runner,
            &command,
            self.settings.install_timeout(),
            formula,
        )
        .await?;

        let managed_path = managed_interpreter(&facts.prefix);
        let name = managed_path.to_string_lossy();
        let version = self
            .probe()
            .version_of(&name, VERSION_FLAG)
            .await
            .map_err(BootstrapError::probe)?;

        let minimum = &self.settings.min_interpreter_version;
        if !version::meets_minimum(&version, minimum) {
            return Err(BootstrapError::PrerequisiteVersionMismatch {
                name: Tool::Interpreter.display_name().to_string(),
                required: minimum.clone(),
                found: version,
                fix: format!(
                    "Run `{} upgrade {}` by hand or lower min_interpreter_version",
                    self.package_manager.program().display(),
                    formula
                ),
            });
        }

        Ok(Interpreter {
            path: self
                .probe()
                .locate(&name)
                .ok_or_else(|| BootstrapError::probe(ProbeError::NotFound(name.to_string())))?,
            version,
            source: InterpreterSource::PackageManager,
        })
    }
}

fn interpreter_name() -> &'static str {
    Tool::Interpreter.executable_name().unwrap_or("python3")
}

/// `<prefix>/bin/python3`.
fn managed_interpreter(prefix: &Path) -> PathBuf {
    prefix.join("bin").join(interpreter_name())
}

fn source_for(path: &Path, prefix: &Path) -> InterpreterSource {
    if path.starts_with(prefix) {
        InterpreterSource::PackageManager
    } else {
        InterpreterSource::System
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::{CommandOutput, RunError, ScriptedRunner};
    use std::time::Duration;

    fn settings_with_prefix(prefix: &str) -> Settings {
        Settings {
            install_prefix: Some(PathBuf::from(prefix)),
            ..Default::default()
        }
    }

    fn brew() -> PackageManager {
        PackageManager::at("/opt/homebrew/bin/brew")
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_prefix_follows_architecture() {
        let runner = ScriptedRunner::new()
            .with_executable("uname", "/usr/bin/uname")
            .respond("/usr/bin/uname -m", CommandOutput::ok("x86_64\n"));
        let path = SearchPath::empty();
        let settings = Settings::default();
        let pm = brew();
        let facts = EnvironmentDetector::new(&runner, &path, &settings, &pm)
            .detect()
            .await
            .unwrap();

        assert_eq!(facts.arch_identifier, "x86_64");
        assert_eq!(facts.arch, ArchClass::Other);
        assert_eq!(facts.prefix, PathBuf::from("/usr/local"));
        assert_eq!(facts.package_manager, PathBuf::from("/opt/homebrew/bin/brew"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_prefix_override_wins() {
        let runner = ScriptedRunner::new()
            .with_executable("uname", "/usr/bin/uname")
            .respond("/usr/bin/uname -m", CommandOutput::ok("arm64\n"));
        let path = SearchPath::empty();
        let settings = settings_with_prefix("/opt/custom");
        let pm = brew();
        let facts = EnvironmentDetector::new(&runner, &path, &settings, &pm)
            .detect()
            .await
            .unwrap();

        assert_eq!(facts.arch, ArchClass::Arm);
        assert_eq!(facts.prefix, PathBuf::from("/opt/custom"));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_architecture_falls_back_without_uname() {
        let runner = ScriptedRunner::new();
        let path = SearchPath::empty();
        let settings = Settings::default();
        let pm = brew();
        let detector = EnvironmentDetector::new(&runner, &path, &settings, &pm);
        assert_eq!(detector.architecture().await, std::env::consts::ARCH);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_system_interpreter_new_enough() {
        let runner = ScriptedRunner::new()
            .with_executable("python3", "/usr/bin/python3")
            .respond("/usr/bin/python3 --version", CommandOutput::ok("Python 3.11.4"));
        let path = SearchPath::empty();
        let settings = settings_with_prefix("/opt/homebrew");
        let pm = brew();
        let selection = EnvironmentDetector::new(&runner, &path, &settings, &pm)
            .select_interpreter(Path::new("/opt/homebrew"))
            .await
            .unwrap();

        let ready = selection.ready().unwrap();
        assert_eq!(ready.version, "3.11.4");
        assert_eq!(ready.source, InterpreterSource::System);
        assert_eq!(runner.calls(), vec!["/usr/bin/python3 --version"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_old_system_interpreter_prefers_managed() {
        let runner = ScriptedRunner::new()
            .with_executable("python3", "/usr/bin/python3")
            .respond("/usr/bin/python3 --version", CommandOutput::ok("Python 3.7.9"))
            .with_executable("/opt/homebrew/bin/python3", "/opt/homebrew/bin/python3")
            .respond(
                "/opt/homebrew/bin/python3 --version",
                CommandOutput::ok("Python 3.10.14"),
            );
        let path = SearchPath::empty();
        let settings = settings_with_prefix("/opt/homebrew");
        let pm = brew();
        let selection = EnvironmentDetector::new(&runner, &path, &settings, &pm)
            .select_interpreter(Path::new("/opt/homebrew"))
            .await
            .unwrap();

        let ready = selection.ready().unwrap();
        assert_eq!(ready.path, PathBuf::from("/opt/homebrew/bin/python3"));
        assert_eq!(ready.source, InterpreterSource::PackageManager);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_outdated_managed_interpreter_needs_install() {
        let runner = ScriptedRunner::new()
            .with_executable("python3", "/opt/homebrew/bin/python3")
            .respond("/opt/homebrew/bin/python3 --version", CommandOutput::ok("Python 3.8.2"));
        let path = SearchPath::empty();
        let settings = settings_with_prefix("/opt/homebrew");
        let pm = brew();
        let selection = EnvironmentDetector::new(&runner, &path, &settings, &pm)
            .select_interpreter(Path::new("/opt/homebrew"))
            .await
            .unwrap();

        match selection {
            InterpreterSelection::NeedsInstall { outdated: Some(old) } => {
                assert_eq!(old.version, "3.8.2");
                assert_eq!(old.source, InterpreterSource::PackageManager);
            }
            other => panic!("unexpected selection {:?}", other),
        }
        // The same executable is probed only once
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_interpreter_timeout_is_fatal() {
        let runner = ScriptedRunner::new()
            .with_executable("uname", "/usr/bin/uname")
            .respond("/usr/bin/uname -m", CommandOutput::ok("arm64\n"))
            .with_executable("python3", "/opt/homebrew/bin/python3")
            .fail_with(
                "/opt/homebrew/bin/python3 --version",
                RunError::Timeout(Duration::from_secs(10)),
            );
        let path = SearchPath::empty();
        let settings = settings_with_prefix("/opt/homebrew");
        let pm = brew();
        let err = EnvironmentDetector::new(&runner, &path, &settings, &pm)
            .detect()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BootstrapError::Probe {
                source: ProbeError::Timeout { .. },
                ..
            }
        ));
        assert_eq!(err.exit_code(), 1);
        // A hung interpreter is never taken for a missing one
        assert_eq!(runner.calls_starting_with("/opt/homebrew/bin/brew"), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_unparseable_interpreter_is_fatal() {
        let runner = ScriptedRunner::new()
            .with_executable("python3", "/usr/bin/python3")
            .respond("/usr/bin/python3 --version", CommandOutput::ok("garbage"));
        let path = SearchPath::empty();
        let settings = settings_with_prefix("/opt/homebrew");
        let pm = brew();
        let result = EnvironmentDetector::new(&runner, &path, &settings, &pm)
            .select_interpreter(Path::new("/opt/homebrew"))
            .await;

        assert!(matches!(
            result,
            Err(BootstrapError::Probe {
                source: ProbeError::NoVersionOutput { .. },
                ..
            })
        ));
    }

    fn facts_needing(outdated: Option<Interpreter>) -> EnvironmentFacts {
        EnvironmentFacts {
            arch_identifier: "arm64".to_string(),
            arch: ArchClass::Arm,
            prefix: PathBuf::from("/opt/homebrew"),
            package_manager: PathBuf::from("/opt/homebrew/bin/brew"),
            interpreter: InterpreterSelection::NeedsInstall { outdated },
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_install_then_reprobe() {
        let runner = ScriptedRunner::new()
            .with_executable("/opt/homebrew/bin/python3", "/opt/homebrew/bin/python3")
            .respond(
                "/opt/homebrew/bin/python3 --version",
                CommandOutput::ok("Python 3.12.1"),
            );
        let path = SearchPath::empty();
        let settings = settings_with_prefix("/opt/homebrew");
        let pm = brew();
        let interpreter = EnvironmentDetector::new(&runner, &path, &settings, &pm)
            .install_interpreter(&facts_needing(None))
            .await
            .unwrap();

        assert_eq!(interpreter.version, "3.12.1");
        assert_eq!(runner.calls()[0], "/opt/homebrew/bin/brew install python");
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_outdated_managed_is_upgraded() {
        let runner = ScriptedRunner::new()
            .with_executable("/opt/homebrew/bin/python3", "/opt/homebrew/bin/python3")
            .respond(
                "/opt/homebrew/bin/python3 --version",
                CommandOutput::ok("Python 3.12.1"),
            );
        let path = SearchPath::empty();
        let settings = settings_with_prefix("/opt/homebrew");
        let pm = brew();
        let old = Interpreter {
            path: PathBuf::from("/opt/homebrew/bin/python3"),
            version: "3.8.2".to_string(),
            source: InterpreterSource::PackageManager,
        };
        EnvironmentDetector::new(&runner, &path, &settings, &pm)
            .install_interpreter(&facts_needing(Some(old)))
            .await
            .unwrap();

        assert_eq!(runner.calls_starting_with("/opt/homebrew/bin/brew upgrade python"), 1);
        assert_eq!(runner.calls_starting_with("/opt/homebrew/bin/brew install"), 0);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_still_outdated_after_install_is_mismatch() {
        let runner = ScriptedRunner::new()
            .with_executable("/opt/homebrew/bin/python3", "/opt/homebrew/bin/python3")
            .respond(
                "/opt/homebrew/bin/python3 --version",
                CommandOutput::ok("Python 3.8.2"),
            );
        let path = SearchPath::empty();
        let settings = settings_with_prefix("/opt/homebrew");
        let pm = brew();
        let err = EnvironmentDetector::new(&runner, &path, &settings, &pm)
            .install_interpreter(&facts_needing(None))
            .await
            .unwrap_err();
        assert!(matches!(err, BootstrapError::PrerequisiteVersionMismatch { .. }));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_install_failure_is_fatal_with_exit_code() {
        let runner = ScriptedRunner::new().respond(
            "/opt/homebrew/bin/brew install python",
            CommandOutput::failed(4, "Error: python: no bottle available"),
        );
        let path = SearchPath::empty();
        let settings = settings_with_prefix("/opt/homebrew");
        let pm = brew();
        let err = EnvironmentDetector::new(&runner, &path, &settings, &pm)
            .install_interpreter(&facts_needing(None))
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 4);
        // No re-probe after a failed install
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_missing_after_install_is_probe_error() {
        let runner = ScriptedRunner::new();
        let path = SearchPath::empty();
        let settings = settings_with_prefix("/opt/homebrew");
        let pm = brew();
        let err = EnvironmentDetector::new(&runner, &path, &settings, &pm)
            .install_interpreter(&facts_needing(None))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::Probe {
                source: ProbeError::NotFound(_),
                ..
            }
        ));
    }

    #[test]
    fn test_source_for_path() {
        let prefix = Path::new("/usr/local");
        assert_eq!(
            source_for(Path::new("/usr/local/bin/python3"), prefix),
            InterpreterSource::PackageManager
        );
        assert_eq!(
            source_for(Path::new("/usr/bin/python3"), prefix),
            InterpreterSource::System
        );
    }
}

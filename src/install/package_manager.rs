//! Package-manager discovery and command construction.
//!
//! The package manager is a black box: it is found, asked to install or
//! upgrade a formula, and judged only by its exit code.

use crate::detection::SearchPath;
use crate::facts::{LEGACY_PREFIX, MODERN_PREFIX};
use crate::install::BootstrapError;
use crate::runner::{CommandRunner, CommandSpec};
use std::path::{Path, PathBuf};

/// Executable name of the package manager.
pub const PACKAGE_MANAGER_EXECUTABLE: &str = "brew";

/// Human-readable name of the package manager.
pub const PACKAGE_MANAGER_NAME: &str = "Homebrew";

const INSTALL_URL: &str = "https://brew.sh";

/// A discovered package manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageManager {
    program: PathBuf,
}

impl PackageManager {
    /// Use the package manager at `program`.
    pub fn at(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Find the package manager without running anything.
    ///
    /// Checks the search path first, then `bin/brew` under the override
    /// prefix (if any) and under both conventional prefixes, since a fresh
    /// install is often not on PATH yet.
    pub fn discover(
        runner: &dyn CommandRunner,
        search_path: &SearchPath,
        prefix_override: Option<&Path>,
    ) -> Result<Self, BootstrapError> {
        if let Some(path) = runner.locate(PACKAGE_MANAGER_EXECUTABLE, search_path) {
            return Ok(Self::at(path));
        }

        let candidates = prefix_override
            .map(Path::to_path_buf)
            .into_iter()
            .chain([PathBuf::from(MODERN_PREFIX), PathBuf::from(LEGACY_PREFIX)]);

        for prefix in candidates {
            let candidate = prefix.join("bin").join(PACKAGE_MANAGER_EXECUTABLE);
            if let Some(path) = runner.locate(&candidate.to_string_lossy(), search_path) {
                return Ok(Self::at(path));
            }
        }

        Err(BootstrapError::PrerequisiteMissing {
            name: PACKAGE_MANAGER_NAME.to_string(),
            fix: format!(
                "Install {} from {} and re-run",
                PACKAGE_MANAGER_NAME, INSTALL_URL
            ),
        })
    }

    /// Path to the executable.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// `brew install <formula>`.
    pub fn install_command(&self, formula: &str) -> CommandSpec {
        CommandSpec::for_path(&self.program, ["install", formula])
    }

    /// `brew upgrade <formula>`.
    pub fn upgrade_command(&self, formula: &str) -> CommandSpec {
        CommandSpec::for_path(&self.program, ["upgrade", formula])
    }
}

//! Run-scoped facts about the host, computed once by the detector.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Install prefix used by the package manager on the newer architecture.
pub const MODERN_PREFIX: &str = "/opt/homebrew";

/// Install prefix used by the package manager everywhere else.
pub const LEGACY_PREFIX: &str = "/usr/local";

/// Coarse architecture class that decides the default install prefix.
///
/// The mapping is a binary guess; an explicit prefix in the settings always
/// wins over it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ArchClass {
    /// Apple silicon and other 64-bit ARM hosts.
    Arm,
    /// Anything else.
    Other,
}

impl ArchClass {
    /// Classify a CPU architecture identifier such as `uname -m` prints.
    ///
    /// ```rust
    /// use llms_bootstrap::ArchClass;
    ///
    /// assert_eq!(ArchClass::from_identifier("arm64"), ArchClass::Arm);
    /// assert_eq!(ArchClass::from_identifier("x86_64"), ArchClass::Other);
    /// ```
    pub fn from_identifier(identifier: &str) -> Self {
        match identifier.trim().to_ascii_lowercase().as_str() {
            "arm64" | "aarch64" => Self::Arm,
            _ => Self::Other,
        }
    }

    /// The package manager's conventional prefix for this class.
    pub fn default_prefix(&self) -> PathBuf {
        match self {
            Self::Arm => PathBuf::from(MODERN_PREFIX),
            Self::Other => PathBuf::from(LEGACY_PREFIX),
        }
    }
}

/// Where an interpreter was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum InterpreterSource {
    /// On the search path, outside the package manager's prefix.
    System,
    /// Under the package manager's prefix.
    PackageManager,
}

/// A resolved interpreter executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interpreter {
    /// Absolute path to the executable.
    pub path: PathBuf,
    /// Version reported by `--version`.
    pub version: String,
    /// How it was found.
    pub source: InterpreterSource,
}

/// Outcome of interpreter selection during detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpreterSelection {
    /// An interpreter meeting the minimum version was found.
    Ready(Interpreter),

    /// Nothing usable was found; the package manager must install or upgrade.
    NeedsInstall {
        /// The package manager's own interpreter, if one exists below the bound.
        /// Its presence means an upgrade rather than a fresh install.
        outdated: Option<Interpreter>,
    },
}

impl InterpreterSelection {
    /// The selected interpreter, when one is usable.
    pub fn ready(&self) -> Option<&Interpreter> {
        match self {
            Self::Ready(interpreter) => Some(interpreter),
            Self::NeedsInstall { .. } => None,
        }
    }
}

/// Everything the steps need to know about the host.
///
/// Computed once at the start of a run and never re-derived afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentFacts {
    /// Raw CPU architecture identifier.
    pub arch_identifier: String,
    /// Architecture class derived from the identifier.
    pub arch: ArchClass,
    /// Package-manager install prefix (detected or overridden).
    pub prefix: PathBuf,
    /// Path to the package-manager executable.
    pub package_manager: PathBuf,
    /// Interpreter chosen for the rest of the run.
    pub interpreter: InterpreterSelection,
}

impl EnvironmentFacts {
    /// `<prefix>/bin`.
    pub fn prefix_bin(&self) -> PathBuf {
        self.prefix.join("bin")
    }

    /// The profile line that puts `<prefix>/bin` on the search path.
    ///
    /// ```rust
    /// use llms_bootstrap::{ArchClass, EnvironmentFacts, InterpreterSelection};
    /// use std::path::PathBuf;
    ///
    /// let facts = EnvironmentFacts {
    ///     arch_identifier: "arm64".to_string(),
    ///     arch: ArchClass::Arm,
    ///     prefix: PathBuf::from("/opt/homebrew"),
    ///     package_manager: PathBuf::from("/opt/homebrew/bin/brew"),
    ///     interpreter: InterpreterSelection::NeedsInstall { outdated: None },
    /// };
    /// assert_eq!(facts.path_export_line(), r#"export PATH="/opt/homebrew/bin:$PATH""#);
    /// ```
    pub fn path_export_line(&self) -> String {
        format!("export PATH=\"{}:$PATH\"", self.prefix_bin().display())
    }
}

/// A named, isolated interpreter directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualEnvironment {
    /// Directory name.
    pub name: String,
    /// Absolute root directory.
    pub root: PathBuf,
}

impl VirtualEnvironment {
    /// The environment `name` under `parent`.
    pub fn new(parent: &Path, name: &str) -> Self {
        Self {
            name: name.to_string(),
            root: parent.join(name),
        }
    }

    /// Directory holding the environment's executables.
    pub fn bin_dir(&self) -> PathBuf {
        if cfg!(windows) {
            self.root.join("Scripts")
        } else {
            self.root.join("bin")
        }
    }

    /// The activation artifact whose presence marks a usable environment.
    pub fn activation_script(&self) -> PathBuf {
        self.bin_dir().join("activate")
    }

    /// The environment's interpreter.
    pub fn python(&self) -> PathBuf {
        self.bin_dir().join("python")
    }

    /// Whether the activation artifact exists on disk.
    pub fn is_created(&self) -> bool {
        self.activation_script().is_file()
    }
}

//! Tool enum identifying the prerequisites of the local-llms toolchain.

use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

/// One prerequisite the bootstrap brings up to date.
///
/// # Example
///
/// ```rust
/// use llms_bootstrap::Tool;
///
/// for tool in Tool::all() {
///     println!("{}: {:?}", tool.display_name(), tool.executable_name());
/// }
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter, strum::Display,
)]
#[strum(serialize_all = "kebab-case")]
#[non_exhaustive]
pub enum Tool {
    /// The Python interpreter used to create the virtual environment.
    Interpreter,
    /// `pigz`, used to reassemble split model archives.
    Compression,
    /// `llama.cpp`, which provides `llama-server`.
    Inference,
    /// The `local-llms` Python package itself.
    Application,
}

impl Tool {
    /// The executable probed to decide whether the tool is present.
    ///
    /// The application has no executable of its own worth probing; its
    /// presence is checked through pip metadata instead.
    ///
    /// ```rust
    /// use llms_bootstrap::Tool;
    ///
    /// assert_eq!(Tool::Inference.executable_name(), Some("llama-server"));
    /// assert_eq!(Tool::Application.executable_name(), None);
    /// ```
    pub fn executable_name(&self) -> Option<&'static str> {
        match self {
            Self::Interpreter => Some("python3"),
            Self::Compression => Some("pigz"),
            Self::Inference => Some("llama-server"),
            Self::Application => None,
        }
    }

    /// The package-manager formula that provides the tool.
    pub fn formula(&self) -> Option<&'static str> {
        match self {
            Self::Interpreter => Some("python"),
            Self::Compression => Some("pigz"),
            Self::Inference => Some("llama.cpp"),
            Self::Application => None,
        }
    }

    /// Human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Interpreter => "Python",
            Self::Compression => "pigz",
            Self::Inference => "llama.cpp",
            Self::Application => "local-llms",
        }
    }

    /// Iterator over all tools, in installation order.
    pub fn all() -> impl Iterator<Item = Self> {
        <Self as IntoEnumIterator>::iter()
    }
}

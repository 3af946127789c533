//! Commands run inside the interpreter: venv creation and pip.

use crate::facts::VirtualEnvironment;
use crate::runner::CommandSpec;
use std::path::Path;

/// Distribution name of the application package.
pub const APP_PACKAGE: &str = "local-llms";

/// `<interpreter> -m venv <root>`.
pub fn create_venv(interpreter: &Path, venv: &VirtualEnvironment) -> CommandSpec {
    CommandSpec::for_path(
        interpreter,
        [
            "-m".to_string(),
            "venv".to_string(),
            venv.root.to_string_lossy().into_owned(),
        ],
    )
}

/// `<python> -m pip show <package>`; exits non-zero when not installed.
pub fn pip_show(python: &Path, package: &str) -> CommandSpec {
    CommandSpec::for_path(python, ["-m", "pip", "show", package])
}

/// `<python> -m pip uninstall -y <package>`.
pub fn pip_uninstall(python: &Path, package: &str) -> CommandSpec {
    CommandSpec::for_path(python, ["-m", "pip", "uninstall", "-y", package])
}

/// `<python> -m pip install <requirement>`.
pub fn pip_install(python: &Path, requirement: &str) -> CommandSpec {
    CommandSpec::for_path(python, ["-m", "pip", "install", requirement])
}

//! Installing prerequisites through external tools.
//!
//! Everything that changes the machine other than the shell profile goes
//! through here: the package manager for binaries, the interpreter for the
//! virtual environment, and pip for the application.
//!
//! # Example
//!
//! ```rust
//! use llms_bootstrap::install::{commands, PackageManager};
//! use std::path::Path;
//!
//! let brew = PackageManager::at("/opt/homebrew/bin/brew");
//! println!("{}", brew.install_command("pigz").display());
//!
//! let pip = commands::pip_install(Path::new("/work/local_llms/bin/python"), "local-llms");
//! println!("{}", pip.display());
//! ```

pub mod commands;
mod errors;
mod executor;
mod package_manager;

pub use errors::BootstrapError;
pub use executor::{install_package, run_checked, run_unchecked};
pub use package_manager::{PackageManager, PACKAGE_MANAGER_EXECUTABLE, PACKAGE_MANAGER_NAME};

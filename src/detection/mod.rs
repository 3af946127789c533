//! Detection implementation submodule.
//!
//! This module contains the building blocks used to find out what is already
//! present on the machine:
//!
//! - `SearchPath` / `find_executable`: run-scoped PATH lookup
//! - `CommandProbe`: presence checks and `--version` probing with a timeout
//! - `extract_version`: regex-based version extraction from banner output

mod parser;
mod path_finder;
mod probe;

pub use parser::{extract_version, DEFAULT_VERSION_PATTERN};
pub use path_finder::SearchPath;
pub(crate) use path_finder::find_executable;
pub use probe::{CommandProbe, ProbeError};

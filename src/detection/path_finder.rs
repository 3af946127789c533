//! Run-scoped PATH and executable lookup.

use std::env::JoinPathsError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// The executable search path as seen by this run.
///
/// The value is read from the process environment once and then only changed
/// in memory; children receive it explicitly through their `PATH` variable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    entries: Vec<PathBuf>,
    joined: OsString,
}

impl SearchPath {
    /// Snapshot the current process `PATH`.
    pub fn from_env() -> Self {
        std::env::var_os("PATH")
            .map(|value| Self::from_os(&value))
            .unwrap_or_default()
    }

    /// Parse a `PATH`-style value.
    pub fn from_os(value: &OsString) -> Self {
        Self {
            entries: std::env::split_paths(value).collect(),
            joined: value.clone(),
        }
    }

    /// A search path with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Put `dir` in front of every other entry.
    ///
    /// Fails, leaving the path unchanged, when `dir` contains the platform's
    /// path separator.
    pub fn prepend(&mut self, dir: impl Into<PathBuf>) -> Result<(), JoinPathsError> {
        let dir = dir.into();
        let joined = std::env::join_paths(std::iter::once(&dir).chain(&self.entries))?;
        self.entries.insert(0, dir);
        self.joined = joined;
        Ok(())
    }

    /// The directories, in lookup order.
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// The `PATH` value handed to children.
    pub fn to_os_string(&self) -> OsString {
        self.joined.clone()
    }
}

/// Find an executable by name on `search_path` only.
///
/// A name with a directory component is checked as given.
pub(crate) fn find_executable(name: &str, search_path: &SearchPath) -> Option<PathBuf> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    if Path::new(name).components().count() > 1 {
        return which::which_in(name, None::<&str>, &cwd).ok();
    }
    if search_path.entries().is_empty() {
        return None;
    }
    which::which_in(name, Some(search_path.to_os_string()), &cwd).ok()
}

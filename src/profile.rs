//! Append-only shell profile mutation with timestamped backups.
//!
//! The profile is shared with the user's other shells, so it is only ever
//! appended to. Before the first byte is written the current content is copied
//! to a sibling `<name>.backup-<timestamp>` file, and existing backups are
//! never overwritten. Backups are kept for manual recovery.

use chrono::Local;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result of [`ensure_path_entry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    /// The entry was already there; nothing was written.
    AlreadyPresent,
    /// The entry was appended.
    Appended {
        /// Copy of the previous content, `None` when the profile did not exist.
        backup: Option<PathBuf>,
    },
}

/// A profile could not be read, backed up or appended to.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// Reading the current profile failed.
    #[error("could not read {}: {source}", .path.display())]
    Read {
        /// The profile.
        path: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// Writing the backup copy failed; the profile was not touched.
    #[error("could not back up {} to {}: {source}", .path.display(), .backup.display())]
    Backup {
        /// The profile.
        path: PathBuf,
        /// The backup that was being written.
        backup: PathBuf,
        /// The underlying error.
        source: io::Error,
    },

    /// Appending failed after the backup was made.
    #[error("could not append to {}: {source}", .path.display())]
    Append {
        /// The profile.
        path: PathBuf,
        /// The backup written before the append was attempted.
        backup: Option<PathBuf>,
        /// The underlying error.
        source: io::Error,
    },
}

impl ProfileError {
    /// A completed backup the user can restore from, if one exists.
    pub fn backup_path(&self) -> Option<&Path> {
        match self {
            Self::Append { backup, .. } => backup.as_deref(),
            _ => None,
        }
    }

    /// What was being done, without the underlying cause.
    pub fn context(&self) -> String {
        match self {
            Self::Read { path, .. } => format!("reading {}", path.display()),
            Self::Backup { path, backup, .. } => {
                format!("backing up {} to {}", path.display(), backup.display())
            }
            Self::Append { path, .. } => format!("appending to {}", path.display()),
        }
    }

    /// The underlying I/O error.
    pub fn into_io(self) -> io::Error {
        match self {
            Self::Read { source, .. } | Self::Backup { source, .. } | Self::Append { source, .. } => {
                source
            }
        }
    }
}

/// Compare line by line as bytes; profiles are not always valid UTF-8.
fn has_line(content: &[u8], entry_line: &str) -> bool {
    let wanted = trim_end(entry_line.as_bytes());
    content.split(|b| *b == b'\n').any(|line| trim_end(line) == wanted)
}

fn trim_end(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Whether `profile_path` already contains `entry_line` as a whole line.
///
/// A missing profile contains nothing.
pub fn contains_entry(profile_path: &Path, entry_line: &str) -> Result<bool, ProfileError> {
    match fs::read(profile_path) {
        Ok(content) => Ok(has_line(&content, entry_line)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(ProfileError::Read {
            path: profile_path.to_path_buf(),
            source,
        }),
    }
}

/// Make sure `profile_path` contains `entry_line`, appending it if needed.
///
/// A missing profile is created holding only the entry; there is nothing to
/// back up in that case.
///
/// # Example
///
/// ```rust
/// use llms_bootstrap::profile::{ensure_path_entry, MutationOutcome};
///
/// let dir = tempfile::tempdir().unwrap();
/// let profile = dir.path().join(".zprofile");
/// std::fs::write(&profile, "alias ll='ls -l'\n").unwrap();
///
/// let line = r#"export PATH="/opt/homebrew/bin:$PATH""#;
/// assert!(matches!(ensure_path_entry(&profile, line).unwrap(), MutationOutcome::Appended { .. }));
/// assert_eq!(ensure_path_entry(&profile, line).unwrap(), MutationOutcome::AlreadyPresent);
/// ```
pub fn ensure_path_entry(
    profile_path: &Path,
    entry_line: &str,
) -> Result<MutationOutcome, ProfileError> {
    ensure_path_entry_with(profile_path, entry_line, append_line)
}

fn ensure_path_entry_with<F>(
    profile_path: &Path,
    entry_line: &str,
    append: F,
) -> Result<MutationOutcome, ProfileError>
where
    F: FnOnce(&Path, &str, bool) -> io::Result<()>,
{
    let existing = match fs::read(profile_path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(source) => {
            return Err(ProfileError::Read {
                path: profile_path.to_path_buf(),
                source,
            })
        }
    };

    if let Some(content) = &existing {
        if has_line(content, entry_line) {
            return Ok(MutationOutcome::AlreadyPresent);
        }
    }

    let backup = match &existing {
        Some(_) => Some(write_backup(profile_path)?),
        None => None,
    };

    let needs_newline = existing
        .as_deref()
        .is_some_and(|content| content.last().is_some_and(|b| *b != b'\n'));

    append(profile_path, entry_line, needs_newline).map_err(|source| ProfileError::Append {
        path: profile_path.to_path_buf(),
        backup: backup.clone(),
        source,
    })?;

    Ok(MutationOutcome::Appended { backup })
}

fn append_line(profile_path: &Path, entry_line: &str, needs_newline: bool) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(profile_path)?;
    if needs_newline {
        file.write_all(b"\n")?;
    }
    writeln!(file, "{}", entry_line.trim_end())?;
    file.sync_all()
}

/// Copy the profile to a fresh `<name>.backup-<timestamp>[-n]` sibling.
fn write_backup(profile_path: &Path) -> Result<PathBuf, ProfileError> {
    let stamp = Local::now().format("%Y%m%d%H%M%S").to_string();
    let file_name = profile_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "profile".to_string());

    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{}.backup-{}", file_name, stamp)
        } else {
            format!("{}.backup-{}-{}", file_name, stamp, attempt)
        };
        let backup = profile_path.with_file_name(name);

        match OpenOptions::new().write(true).create_new(true).open(&backup) {
            Ok(mut dest) => {
                let copied = File::open(profile_path)
                    .and_then(|mut src| io::copy(&mut src, &mut dest))
                    .and_then(|_| dest.sync_all());
                return match copied {
                    Ok(()) => Ok(backup),
                    Err(source) => Err(ProfileError::Backup {
                        path: profile_path.to_path_buf(),
                        backup,
                        source,
                    }),
                };
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(source) => {
                return Err(ProfileError::Backup {
                    path: profile_path.to_path_buf(),
                    backup,
                    source,
                })
            }
        }
    }
}

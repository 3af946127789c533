//! Bootstrap settings.
//!
//! Settings are layered: built-in defaults, then an optional JSON file, then
//! `LLMS_BOOTSTRAP_*` environment variables, then command-line flags (applied
//! by the binary). Every field has a default, so the bootstrap runs with no
//! configuration at all.

use crate::version;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Directory name under the user's config dir.
pub const APP_NAME: &str = "llms-bootstrap";

/// Settings file name inside [`APP_NAME`].
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Whether an already-installed application is replaced.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum ReinstallPolicy {
    /// Uninstall whatever is there, then install the pinned reference.
    #[default]
    Force,
    /// Leave an installed application alone.
    SkipIfPresent,
}

/// Settings could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file exists but could not be read.
    #[error("could not read {}: {source}", .path.display())]
    Read {
        /// The settings file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The settings file is not valid JSON for [`Settings`].
    #[error("could not parse {}: {source}", .path.display())]
    Parse {
        /// The settings file.
        path: PathBuf,
        /// The underlying error.
        source: serde_json::Error,
    },

    /// A value is out of range.
    #[error("invalid setting {key}: {message}")]
    Invalid {
        /// The offending key.
        key: &'static str,
        /// Why it was rejected.
        message: String,
    },
}

/// Configuration for one bootstrap run.
///
/// # Example
///
/// ```rust
/// use llms_bootstrap::Settings;
/// use std::path::PathBuf;
///
/// let settings = Settings {
///     install_prefix: Some(PathBuf::from("/opt/custom")),
///     min_interpreter_version: "3.10".to_string(),
///     ..Default::default()
/// };
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Package-manager prefix; overrides the architecture-based guess.
    pub install_prefix: Option<PathBuf>,

    /// Minimum acceptable interpreter version.
    pub min_interpreter_version: String,

    /// Name of the virtual environment directory.
    pub venv_name: String,

    /// Directory the virtual environment is created in.
    pub work_dir: PathBuf,

    /// Shell profile that receives the PATH export.
    pub profile_path: PathBuf,

    /// Where the application is fetched from (a git URL).
    pub app_source: String,

    /// Tag of the application to install.
    pub app_ref: String,

    /// Replace an existing application install or leave it.
    pub reinstall: ReinstallPolicy,

    /// Timeout for version probes, in seconds.
    pub probe_timeout_secs: u64,

    /// Timeout for install commands, in seconds.
    pub install_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            install_prefix: None,
            min_interpreter_version: "3.9".to_string(),
            venv_name: "local_llms".to_string(),
            work_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            // Left empty when there is no home directory; `validate` rejects it
            profile_path: dirs::home_dir()
                .map(|home| home.join(".zprofile"))
                .unwrap_or_default(),
            app_source: "https://github.com/eternalai-org/local-llms.git".to_string(),
            app_ref: "1.0.0".to_string(),
            reinstall: ReinstallPolicy::Force,
            probe_timeout_secs: 10,
            install_timeout_secs: 1800,
        }
    }
}

impl Settings {
    /// Timeout applied to each version probe.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Timeout applied to each install or environment command.
    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    /// The pip requirement for the pinned application.
    ///
    /// ```rust
    /// use llms_bootstrap::Settings;
    ///
    /// let settings = Settings {
    ///     app_source: "https://example.com/local-llms.git".to_string(),
    ///     app_ref: "2.0.1".to_string(),
    ///     ..Default::default()
    /// };
    /// assert_eq!(settings.app_requirement(), "git+https://example.com/local-llms.git@2.0.1");
    /// ```
    pub fn app_requirement(&self) -> String {
        format!("git+{}@{}", self.app_source, self.app_ref)
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// `LLMS_BOOTSTRAP_PREFIX` wins over `HOMEBREW_PREFIX`, which the package
    /// manager's own shell setup exports.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(prefix) = non_empty("LLMS_BOOTSTRAP_PREFIX").or_else(|| non_empty("HOMEBREW_PREFIX")) {
            self.install_prefix = Some(PathBuf::from(prefix));
        }
        if let Some(min) = non_empty("LLMS_BOOTSTRAP_MIN_PYTHON") {
            self.min_interpreter_version = min;
        }
        if let Some(venv) = non_empty("LLMS_BOOTSTRAP_VENV") {
            self.venv_name = venv;
        }
        if let Some(profile) = non_empty("LLMS_BOOTSTRAP_PROFILE") {
            self.profile_path = PathBuf::from(profile);
        }
        if let Some(source) = non_empty("LLMS_BOOTSTRAP_APP_SOURCE") {
            self.app_source = source;
        }
        if let Some(app_ref) = non_empty("LLMS_BOOTSTRAP_APP_REF") {
            self.app_ref = app_ref;
        }
    }

    /// Reject values the run cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        version::validate(&self.min_interpreter_version).map_err(|e| ConfigError::Invalid {
            key: "min_interpreter_version",
            message: e.to_string(),
        })?;
        if self.venv_name.trim().is_empty() || self.venv_name.contains(['/', '\\']) {
            return Err(ConfigError::Invalid {
                key: "venv_name",
                message: format!("'{}' is not a plain directory name", self.venv_name),
            });
        }
        if self.profile_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                key: "profile_path",
                message: "home directory could not be resolved; set it explicitly".to_string(),
            });
        }
        let venv_bin = self.work_dir.join(&self.venv_name).join("bin");
        if !is_path_entry(&venv_bin) {
            return Err(ConfigError::Invalid {
                key: "work_dir",
                message: format!("{} cannot be put on PATH", venv_bin.display()),
            });
        }
        if let Some(prefix) = self.install_prefix.as_deref().filter(|p| !is_path_entry(p)) {
            return Err(ConfigError::Invalid {
                key: "install_prefix",
                message: format!("{} cannot be put on PATH", prefix.display()),
            });
        }
        if self.app_ref.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "app_ref",
                message: "must name a tag".to_string(),
            });
        }
        if self.probe_timeout_secs == 0 || self.install_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "timeouts",
                message: "must be at least one second".to_string(),
            });
        }
        Ok(())
    }
}

/// Whether `dir` survives being joined into a `PATH` value.
fn is_path_entry(dir: &Path) -> bool {
    std::env::join_paths([dir]).is_ok()
}

/// Default location of the settings file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE_NAME))
}

/// Load settings from `path` (if it exists) and the process environment.
///
/// A missing file is not an error; defaults are used instead.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut settings = match path {
        Some(path) if path.exists() => {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::debug!(target: "bootstrap", "loaded settings from {}", path.display());
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        }
        _ => Settings::default(),
    };

    settings.apply_env_overrides(|key| std::env::var(key).ok());
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::str::FromStr;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.min_interpreter_version, "3.9");
        assert_eq!(settings.venv_name, "local_llms");
        assert_eq!(settings.probe_timeout(), Duration::from_secs(10));
        assert_eq!(settings.reinstall, ReinstallPolicy::Force);
        assert!(settings.install_prefix.is_none());
        assert!(settings.profile_path.ends_with(".zprofile"));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("LLMS_BOOTSTRAP_PREFIX", "/opt/custom"),
            ("HOMEBREW_PREFIX", "/opt/homebrew"),
            ("LLMS_BOOTSTRAP_MIN_PYTHON", "3.10"),
            ("LLMS_BOOTSTRAP_APP_REF", "2.0.0"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.apply_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.install_prefix, Some(PathBuf::from("/opt/custom")));
        assert_eq!(settings.min_interpreter_version, "3.10");
        assert_eq!(settings.app_ref, "2.0.0");
        assert_eq!(settings.venv_name, "local_llms");
    }

    #[test]
    fn test_homebrew_prefix_fallback() {
        let mut settings = Settings::default();
        settings.apply_env_overrides(|key| {
            (key == "HOMEBREW_PREFIX").then(|| "/home/linuxbrew/.linuxbrew".to_string())
        });
        assert_eq!(
            settings.install_prefix,
            Some(PathBuf::from("/home/linuxbrew/.linuxbrew"))
        );
    }

    #[test]
    fn test_blank_env_values_are_ignored() {
        let mut settings = Settings::default();
        settings.apply_env_overrides(|_| Some("  ".to_string()));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_version = Settings {
            min_interpreter_version: "3.nine".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            bad_version.validate(),
            Err(ConfigError::Invalid { key: "min_interpreter_version", .. })
        ));

        let bad_venv = Settings {
            venv_name: "../escape".to_string(),
            ..Default::default()
        };
        assert!(bad_venv.validate().is_err());

        let zero_timeout = Settings {
            probe_timeout_secs: 0,
            ..Default::default()
        };
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn test_validate_requires_profile_path() {
        let no_home = Settings {
            profile_path: PathBuf::new(),
            ..Default::default()
        };
        assert!(matches!(
            no_home.validate(),
            Err(ConfigError::Invalid { key: "profile_path", .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_validate_rejects_dirs_that_break_path() {
        let colon_work_dir = Settings {
            work_dir: PathBuf::from("/work/my:proj"),
            ..Default::default()
        };
        assert!(matches!(
            colon_work_dir.validate(),
            Err(ConfigError::Invalid { key: "work_dir", .. })
        ));

        let colon_prefix = Settings {
            install_prefix: Some(PathBuf::from("/opt/brew:x")),
            ..Default::default()
        };
        assert!(matches!(
            colon_prefix.validate(),
            Err(ConfigError::Invalid { key: "install_prefix", .. })
        ));
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            r#"{ "venv_name": "llms", "reinstall": "skip-if-present" }"#,
        )
        .unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.venv_name, "llms");
        assert_eq!(settings.reinstall, ReinstallPolicy::SkipIfPresent);
        assert_eq!(settings.probe_timeout_secs, 10);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings(Some(&dir.path().join("absent.json"))).unwrap();
        assert_eq!(settings.install_timeout_secs, 1800);
    }

    #[test]
    fn test_load_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            load_settings(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_reinstall_policy_parse() {
        assert_eq!(
            ReinstallPolicy::from_str("skip-if-present").unwrap(),
            ReinstallPolicy::SkipIfPresent
        );
        assert_eq!(ReinstallPolicy::Force.to_string(), "force");
    }
}

//! Version output parsing with regex extraction.

use regex::Regex;
use std::sync::OnceLock;

/// Pattern matching the first dotted numeric version in a banner.
pub const DEFAULT_VERSION_PATTERN: &str = r"\d+(?:\.\d+)+";

fn default_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(DEFAULT_VERSION_PATTERN).expect("Invalid regex pattern"))
}

/// Extract a clean version string from CLI output.
///
/// Handles the usual banner shapes:
///
/// - `Python 3.11.4` -> `3.11.4`
/// - `pigz 2.8` -> `2.8`
/// - `version: 4159 (0b4b5a7c)` -> no match, a build number is not a version
///
/// When `pattern` is given and has a capture group, the first group is
/// returned; otherwise the whole match is.
pub fn extract_version(output: &str, pattern: Option<&Regex>) -> Option<String> {
    let re = pattern.unwrap_or_else(|| default_pattern());
    let caps = re.captures(output)?;
    caps.get(1)
        .or_else(|| caps.get(0))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_python_banner() {
        assert_eq!(extract_version("Python 3.11.4\n", None).as_deref(), Some("3.11.4"));
    }

    #[test]
    fn test_parse_two_component_version() {
        assert_eq!(extract_version("pigz 2.8", None).as_deref(), Some("2.8"));
    }

    #[test]
    fn test_parse_version_multiline() {
        let output = "My Tool\nVersion: 1.0.0\nBuilt on 2025-01-01";
        assert_eq!(extract_version(output, None).as_deref(), Some("1.0.0"));
    }

    #[test]
    fn test_parse_version_no_match() {
        assert!(extract_version("no version here", None).is_none());
        assert!(extract_version("build 4159", None).is_none());
    }

    #[test]
    fn test_caller_supplied_pattern_with_group() {
        let re = Regex::new(r"llama\.cpp b(\d+\.\d+)").unwrap();
        assert_eq!(
            extract_version("llama.cpp b4159.1 (metal)", Some(&re)).as_deref(),
            Some("4159.1")
        );
    }
}

//! Dotted numeric version comparison.
//!
//! Versions here are the loose `MAJOR.MINOR[.PATCH...]` strings that tools
//! print in their banners (`3.9`, `3.11.4`, `1.2.3.4`), not strict semver.
//! Components are compared numerically left to right and missing trailing
//! components count as zero, so `3.9` and `3.9.0` are equal.

use std::cmp::Ordering;
use thiserror::Error;

/// A version string could not be compared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// A component was empty or not a non-negative integer.
    #[error("invalid version '{version}': component '{component}' is not numeric")]
    Parse {
        /// The full version string that was rejected.
        version: String,
        /// The offending component.
        component: String,
    },
}

fn components(version: &str) -> Result<Vec<u64>, VersionError> {
    version
        .trim()
        .split('.')
        .map(|part| {
            part.parse::<u64>().map_err(|_| VersionError::Parse {
                version: version.to_string(),
                component: part.to_string(),
            })
        })
        .collect()
}

/// Compare two dotted numeric versions.
///
/// # Example
///
/// ```rust
/// use llms_bootstrap::version::compare;
/// use std::cmp::Ordering;
///
/// assert_eq!(compare("3.10", "3.9").unwrap(), Ordering::Greater);
/// assert_eq!(compare("3.9", "3.9.0").unwrap(), Ordering::Equal);
/// assert_eq!(compare("3.2", "3.10").unwrap(), Ordering::Less);
/// ```
pub fn compare(a: &str, b: &str) -> Result<Ordering, VersionError> {
    let left = components(a)?;
    let right = components(b)?;
    let len = left.len().max(right.len());

    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        match l.cmp(&r) {
            Ordering::Equal => continue,
            other => return Ok(other),
        }
    }
    Ok(Ordering::Equal)
}

/// Whether `actual >= required`.
///
/// A version that cannot be parsed never satisfies a minimum. Callers that
/// need to tell "too old" apart from "garbage" should use [`compare`].
pub fn meets_minimum(actual: &str, required: &str) -> bool {
    matches!(
        compare(actual, required),
        Ok(Ordering::Greater | Ordering::Equal)
    )
}

/// Check that `version` is well formed.
pub fn validate(version: &str) -> Result<(), VersionError> {
    components(version).map(|_| ())
}

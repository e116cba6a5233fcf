//! Version comparison for plugin releases.
//!
//! Plugin versions are dot-separated numeric tuples such as `1.2`, `1.2.0` or
//! `2024.1.0.17`. Tuples compare component by component from the left, and a
//! shorter tuple is padded with zeros, so `1.2` equals `1.2.0`.
//!
//! When either side is not a numeric tuple (`1.2.0-beta`, `next`, an empty
//! string) the comparison falls back to an ordinal, case-insensitive string
//! comparison. The fallback keeps odd server data from aborting a check; it is
//! not a semantic ordering.
//!
//! ```rust,no_run
//! use plugin_updater::version::VersionComparator;
//!
//! assert!(VersionComparator::is_newer("1.2.0", "1.0.0"));
//! assert!(!VersionComparator::is_newer("1.9.9", "2.0.0"));
//! assert!(!VersionComparator::is_newer("1.2", "1.2.0"));
//! ```

use std::cmp::Ordering;

pub struct VersionComparator;

impl VersionComparator {
    /// Parse a version as a numeric tuple.
    ///
    /// Returns `None` if any component is empty or contains anything other
    /// than ASCII digits, or if a component overflows `u64`.
    #[must_use]
    pub fn parse_numeric(version: &str) -> Option<Vec<u64>> {
        let trimmed = version.trim();
        if trimmed.is_empty() {
            return None;
        }

        trimmed
            .split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    None
                } else {
                    part.parse::<u64>().ok()
                }
            })
            .collect()
    }

    /// Compare two version strings.
    ///
    /// Numeric tuples are compared component-wise with zero padding; any other
    /// input is compared as case-insensitive ordinal text.
    #[must_use]
    pub fn compare(a: &str, b: &str) -> Ordering {
        match (Self::parse_numeric(a), Self::parse_numeric(b)) {
            (Some(left), Some(right)) => Self::compare_tuples(&left, &right),
            _ => Self::compare_ordinal_ignore_case(a, b),
        }
    }

    /// Whether `candidate` is strictly newer than `current`.
    #[must_use]
    pub fn is_newer(candidate: &str, current: &str) -> bool {
        Self::compare(candidate, current) == Ordering::Greater
    }

    /// Pick the highest version from a collection.
    pub fn latest<'a, I>(versions: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        versions.into_iter().max_by(|a, b| Self::compare(a, b))
    }

    fn compare_tuples(left: &[u64], right: &[u64]) -> Ordering {
        let len = left.len().max(right.len());
        for i in 0..len {
            let l = left.get(i).copied().unwrap_or(0);
            let r = right.get(i).copied().unwrap_or(0);
            match l.cmp(&r) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    }

    // Ordinal comparison over upper-cased characters.
    fn compare_ordinal_ignore_case(a: &str, b: &str) -> Ordering {
        let left = a.chars().flat_map(char::to_uppercase);
        let right = b.chars().flat_map(char::to_uppercase);
        left.cmp(right)
    }
}

/// Shorthand for [`VersionComparator::compare`].
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    VersionComparator::compare(a, b)
}

/// Shorthand for [`VersionComparator::is_newer`].
#[must_use]
pub fn is_newer(candidate: &str, current: &str) -> bool {
    VersionComparator::is_newer(candidate, current)
}

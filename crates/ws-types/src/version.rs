// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! [`Version`] (semver-total-order) and [`ToolsVersion`] (manifest gate).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::Version as SemverVersion;
use serde::{Deserialize, Serialize};

/// A semver-style version with prereleases ordered lower than the release of
/// the same major.minor.patch triple — exactly `semver::Version`'s own
/// ordering, which ignores build metadata and ranks any prerelease below the
/// release with an identical triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(SemverVersion);

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(SemverVersion::new(major, minor, patch))
    }

    /// Parse a source-control tag into a [`Version`], tolerating an optional
    /// leading `v` and a missing minor/patch component (`"1.1"` and `"1"` are
    /// treated as `1.1.0` and `1.0.0`), as SwiftPM-style tag resolution does.
    ///
    /// Returns `None` for tags that are not version-shaped at all — these are
    /// simply excluded from the descending version sequence (spec.md §4.3).
    pub fn parse_tag(tag: &str) -> Option<Self> {
        let stripped = tag.strip_prefix('v').unwrap_or(tag);

        if let Ok(v) = SemverVersion::parse(stripped) {
            return Some(Self(v));
        }

        // Tolerate `major`, `major.minor` by padding with zero components.
        // A prerelease/build suffix on a short form (e.g. `1.1-beta`) is not
        // a real-world tag shape we need to support; only bare numeric
        // components are padded.
        let parts: Vec<&str> = stripped.split('.').collect();
        if parts.len() < 3 && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit())) {
            let mut padded = parts;
            while padded.len() < 3 {
                padded.push("0");
            }
            let joined = padded.join(".");
            return SemverVersion::parse(&joined).ok().map(Self);
        }

        None
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn is_prerelease(&self) -> bool {
        !self.0.pre.is_empty()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Version {
    type Err = semver::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SemverVersion::parse(s).map(Self)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

/// `major.minor.patch` gate on manifest readability: a manifest is readable
/// iff its declared tools version is within `[MINIMUM_SUPPORTED, CURRENT]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToolsVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ToolsVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Lowest tools-version a manifest may declare and still be read.
    pub const MINIMUM_SUPPORTED: Self = Self::new(4, 0, 0);

    /// The host's current tools-version ceiling.
    pub const CURRENT: Self = Self::new(5, 9, 0);

    /// Monotonic admission test: a version admitted under tools-version `t`
    /// is admitted under every `t' >= t` (spec.md §3.2).
    pub fn is_readable(&self) -> bool {
        *self >= Self::MINIMUM_SUPPORTED && *self <= Self::CURRENT
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().map(str::parse).transpose().ok()??;
        let patch = parts
            .next()
            .map(str::parse)
            .transpose()
            .ok()
            .flatten()
            .unwrap_or(0);
        Some(Self { major, minor, patch })
    }
}

impl fmt::Display for ToolsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.patch == 0 {
            write!(f, "{}.{}", self.major, self.minor)
        } else {
            write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v_prefix_tags_order_descending() {
        let mut versions: Vec<_> = ["v1.0.0", "v1.0.1", "v1.0.2", "v1.0.3", "v2.0.3"]
            .iter()
            .map(|t| Version::parse_tag(t).unwrap())
            .collect();
        versions.sort_by(|a, b| b.cmp(a));
        let strs: Vec<_> = versions.iter().map(ToString::to_string).collect();
        assert_eq!(strs, vec!["2.0.3", "1.0.3", "1.0.2", "1.0.1", "1.0.0"]);
    }

    #[test]
    fn prereleases_order_below_release_of_same_triple() {
        let mut versions: Vec<_> = [
            "1.0.0-alpha.1",
            "1.0.0-beta.1",
            "1.0.0",
            "1.0.1",
            "1.0.2-dev",
            "1.0.2-dev.2",
            "1.0.4-alpha",
        ]
        .iter()
        .map(|t| Version::parse_tag(t).unwrap())
        .collect();
        versions.sort_by(|a, b| b.cmp(a));
        let strs: Vec<_> = versions.iter().map(ToString::to_string).collect();
        assert_eq!(
            strs,
            vec![
                "1.0.4-alpha",
                "1.0.2-dev.2",
                "1.0.2-dev",
                "1.0.1",
                "1.0.0",
                "1.0.0-beta.1",
                "1.0.0-alpha.1",
            ]
        );
    }

    #[test]
    fn short_forms_pad_to_triple() {
        assert_eq!(Version::parse_tag("1.1").unwrap(), Version::new(1, 1, 0));
        assert_eq!(Version::parse_tag("1").unwrap(), Version::new(1, 0, 0));
    }

    #[test]
    fn tools_version_monotonic_gate() {
        let t = ToolsVersion::new(4, 2, 0);
        assert!(t.is_readable());
        assert!(!ToolsVersion::new(3, 0, 0).is_readable());
        assert!(ToolsVersion::new(5, 9, 0).is_readable());
        assert!(!ToolsVersion::new(6, 0, 0).is_readable());
    }
}

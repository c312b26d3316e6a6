// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! [`PackageIdentity`]: canonical, case-folded equality of "same package by
//! different URLs".

use std::path::Path;

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};

use crate::specifier::RepositorySpecifier;

/// A canonical, case-folded package identifier. Two specifiers that refer to
/// the same repository (different casing, scheme, or a trailing `.git`)
/// produce equal identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageIdentity(String);

impl PackageIdentity {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().to_lowercase())
    }

    pub fn from_specifier(spec: &RepositorySpecifier) -> Self {
        match spec {
            RepositorySpecifier::Path(path) => Self::from_path(path),
            RepositorySpecifier::Url(url) => Self::from_url(url.as_str()),
        }
    }

    pub fn from_path(path: &Path) -> Self {
        let base = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        Self::new(base)
    }

    pub fn from_url(url: &str) -> Self {
        let trimmed = url
            .trim_end_matches('/')
            .trim_end_matches(".git");
        let base = trimmed.rsplit('/').next().unwrap_or(trimmed);
        Self::new(base)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_ignores_casing() {
        assert_eq!(
            PackageIdentity::from_url("https://example.com/Org/Repo"),
            PackageIdentity::from_url("https://example.com/org/repo")
        );
    }

    #[test]
    fn identity_ignores_dot_git_and_trailing_slash() {
        assert_eq!(
            PackageIdentity::from_url("https://example.com/org/repo.git"),
            PackageIdentity::from_url("https://example.com/org/repo/")
        );
    }
}

// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! [`RepositorySpecifier`] and the stable filesystem identifier derived from it.

use std::fmt;
use std::path::{Path, PathBuf};

use derive_more::Display;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// Either a local path or a remote URL identifying a source-control repository.
///
/// Equatable; the [`path`](RepositorySpecifier::Path) variant is "local",
/// the [`url`](RepositorySpecifier::Url) variant is "remote".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositorySpecifier {
    Path(PathBuf),
    Url(Url),
}

impl RepositorySpecifier {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn url(url: Url) -> Self {
        Self::Url(url)
    }

    /// Parse a persisted location string (spec.md §4.2's `repositoryURL`
    /// field, or a pin's `location`) back into a specifier: a parseable URL
    /// is remote, anything else is a local path.
    pub fn from_location(location: &str) -> Self {
        match Url::parse(location) {
            Ok(url) => Self::Url(url),
            Err(_) => Self::Path(PathBuf::from(location)),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Path(_))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Url(_))
    }

    /// A human-displayable location string, used in diagnostics and as the
    /// storage key for the repository-manager state file (spec.md §4.2).
    pub fn location(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Url(url) => url.to_string(),
        }
    }

    /// Derive the stable, single-path-component filesystem identifier this
    /// specifier is stored under. Two specifiers that refer to "the same"
    /// repository via different casing, a trailing slash, or a `.git` suffix
    /// yield the same identifier.
    ///
    /// Grounded on the `ident()` helper in `GitSource` (puffin/cargo git
    /// source), which turns `proto://host/path/repo` into `repo-<hash>`.
    pub fn filesystem_identifier(&self) -> FsIdentifier {
        match self {
            Self::Path(path) => {
                let canonical = normalize_path(path);
                let basename = canonical
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("_empty");
                FsIdentifier(format!(
                    "{}-{}",
                    sanitize(basename),
                    short_hash(canonical.to_string_lossy().as_bytes())
                ))
            }
            Self::Url(url) => {
                let canonical = canonicalize_url(url);
                let basename = canonical
                    .path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .map(|s| s.trim_end_matches(".git"))
                    .filter(|s| !s.is_empty())
                    .unwrap_or("_empty");
                FsIdentifier(format!(
                    "{}-{}",
                    sanitize(basename),
                    short_hash(canonical.as_str().as_bytes())
                ))
            }
        }
    }
}

impl fmt::Display for RepositorySpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.location())
    }
}

/// A sanitized, single-path-component directory name derived from a
/// [`RepositorySpecifier`]. Stable across process restarts and safe to use
/// directly as a path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FsIdentifier(String);

impl FsIdentifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reconstruct an [`FsIdentifier`] from a value already known to be a
    /// sanitized single path component — e.g. one read back from the
    /// repository-manager state file, rather than freshly derived via
    /// [`RepositorySpecifier::filesystem_identifier`].
    pub fn from_trusted(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<Path> for FsIdentifier {
    fn as_ref(&self) -> &Path {
        Path::new(&self.0)
    }
}

fn sanitize(input: &str) -> String {
    let sanitized: String = input
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if sanitized.is_empty() {
        "_empty".to_string()
    } else {
        sanitized
    }
}

fn short_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..8])
}

fn normalize_path(path: &Path) -> PathBuf {
    // `canonicalize` requires the path to exist; fall back to the raw path
    // (with a trailing slash stripped) so identifiers stay stable even for
    // repositories that have not been fetched yet.
    path.canonicalize().unwrap_or_else(|_| {
        let s = path.to_string_lossy();
        PathBuf::from(s.trim_end_matches('/'))
    })
}

/// Lowercases the host and strips a trailing `/` and `.git` suffix so that
/// URLs differing only in casing or a trailing slash hash to the same
/// identifier (mirrors cargo's git-source identity rules).
fn canonicalize_url(url: &Url) -> Url {
    let mut canonical = url.clone();
    if let Some(host) = url.host_str() {
        let _ = canonical.set_host(Some(&host.to_lowercase()));
    }
    let path = canonical.path().trim_end_matches('/').to_string();
    let path = path.strip_suffix(".git").unwrap_or(&path).to_string();
    canonical.set_path(&path);
    canonical
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> RepositorySpecifier {
        RepositorySpecifier::Url(Url::parse(s).unwrap())
    }

    #[test]
    fn strips_trailing_slash() {
        let a = url("https://example.com/org/repo/").filesystem_identifier();
        let b = url("https://example.com/org/repo").filesystem_identifier();
        assert_eq!(a, b);
    }

    #[test]
    fn strips_dot_git() {
        let a = url("https://example.com/org/repo").filesystem_identifier();
        let b = url("https://example.com/org/repo.git").filesystem_identifier();
        assert_eq!(a, b);
    }

    #[test]
    fn lowercases_host() {
        let a = url("https://Example.com/org/repo").filesystem_identifier();
        let b = url("https://example.com/org/repo").filesystem_identifier();
        assert_eq!(a, b);
    }

    #[test]
    fn identifier_is_single_path_component() {
        let id = url("https://example.com/org/repo").filesystem_identifier();
        assert_eq!(Path::new(id.as_str()).components().count(), 1);
    }

    #[test]
    fn path_and_url_specifiers_are_local_or_remote() {
        assert!(RepositorySpecifier::path("/tmp/pkg").is_local());
        assert!(url("https://example.com/org/repo").is_remote());
    }

    #[test]
    fn from_location_round_trips_urls_and_paths() {
        assert!(RepositorySpecifier::from_location("https://example.com/org/repo").is_remote());
        assert!(RepositorySpecifier::from_location("/tmp/pkg").is_local());
    }
}

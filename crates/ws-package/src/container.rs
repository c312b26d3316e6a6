// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The Package Container (spec.md §4.3): a per-package-reference view over
//! available versions, manifests at a revision, and transitive dependency
//! constraints.

use std::collections::HashMap;
use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::Mutex;
use ws_types::manifest::{DependencyDeclaration, ManifestLoader, ProductFilter};
use ws_types::reference::PackageReference;
use ws_types::revision::RevisionInspector;
use ws_types::version::{ToolsVersion, Version};

/// A specific point in a package's history, as addressed by
/// `getDependencies` (spec.md §4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionOrRevision {
    Version(Version),
    Branch(String),
    Revision(String),
}

#[derive(Debug, Error)]
pub enum UnsupportedToolsVersion {
    #[error("manifest declares tools-version {declared}, which is newer than the current {current}")]
    TooNew {
        declared: ToolsVersion,
        current: ToolsVersion,
    },
    #[error("manifest declares tools-version {declared}, which is older than the minimum supported {minimum}")]
    TooOld {
        declared: ToolsVersion,
        minimum: ToolsVersion,
    },
}

impl UnsupportedToolsVersion {
    fn check(declared: ToolsVersion) -> Result<(), Self> {
        if declared > ToolsVersion::CURRENT {
            Err(Self::TooNew {
                declared,
                current: ToolsVersion::CURRENT,
            })
        } else if declared < ToolsVersion::MINIMUM_SUPPORTED {
            Err(Self::TooOld {
                declared,
                minimum: ToolsVersion::MINIMUM_SUPPORTED,
            })
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Error)]
#[error("getting dependencies for {reference:?} at {repository}")]
pub struct GetDependenciesError {
    pub repository: String,
    pub reference: PackageReference,
    #[source]
    pub underlying: GetDependenciesCause,
}

#[derive(Debug, Error)]
pub enum GetDependenciesCause {
    #[error(transparent)]
    UnsupportedToolsVersion(#[from] UnsupportedToolsVersion),
    #[error("revision lookup failed: {0}")]
    Revision(String),
    #[error("manifest load failed: {0}")]
    Manifest(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    UnsupportedToolsVersion(#[from] UnsupportedToolsVersion),
    #[error("no branch named {requested:?} (available: {})", .available.join(", "))]
    NoSuchBranch { requested: String, available: Vec<String> },
    #[error("no commit named {0:?}")]
    NoSuchCommit(String),
    #[error("no tag named {0:?}")]
    NoSuchTag(String),
    #[error(transparent)]
    GetDependencies(#[from] GetDependenciesError),
}

/// Per-version dependency-resolution cache, keyed by the *pair*
/// `(Version, ProductFilter)` — never by version alone (spec.md §9's
/// historical product-filter cache bug).
type DependencyCacheKey = (Version, ProductFilter);

/// Per-package view: versions, manifest-at-revision, constraints (spec.md
/// §4.3). Generic over the `RevisionInspector` that reads tags/branches out
/// of the clone and the `ManifestLoader` that parses a manifest at a
/// revision — both external collaborators this core never implements
/// itself.
pub struct PackageContainer<I: RevisionInspector, L: ManifestLoader> {
    reference: PackageReference,
    repository_location: String,
    clone_path: PathBuf,
    inspector: I,
    loader: L,
    /// Memoized admission test per candidate version; empty before first
    /// scan (spec.md §4.3).
    admission_cache: Mutex<HashMap<Version, bool>>,
    /// Version -> the tag string and revision id it was first seen under.
    /// Populated lazily by `tools_versions_appropriate_versions_descending`
    /// and consulted by `get_dependencies` to resolve a bare `Version` to a
    /// revision without re-listing tags.
    version_revisions: Mutex<HashMap<Version, String>>,
    dependency_cache: Mutex<HashMap<DependencyCacheKey, Vec<DependencyDeclaration>>>,
}

impl<I: RevisionInspector, L: ManifestLoader> PackageContainer<I, L> {
    pub fn new(
        reference: PackageReference,
        repository_location: impl Into<String>,
        clone_path: impl Into<PathBuf>,
        inspector: I,
        loader: L,
    ) -> Self {
        Self {
            reference,
            repository_location: repository_location.into(),
            clone_path: clone_path.into(),
            inspector,
            loader,
            admission_cache: Mutex::new(HashMap::new()),
            version_revisions: Mutex::new(HashMap::new()),
            dependency_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn reference(&self) -> &PackageReference {
        &self.reference
    }

    /// `toolsVersionsAppropriateVersionsDescending()` (spec.md §4.3).
    ///
    /// Scans every tag, keeps the ones that parse as a [`Version`], dedupes
    /// equivalent tags (`1.1`, `1.1.0`, `v1.1.0`) to a single emitted
    /// `Version`, and filters out any whose manifest tools-version fails the
    /// gate. Pre-releases are included. Descending order.
    pub async fn tools_versions_appropriate_versions_descending(&self) -> Result<Vec<Version>, Error> {
        let tags = self
            .inspector
            .list_tags(&self.clone_path)
            .await
            .map_err(|e| Error::NoSuchTag(e.to_string()))?;

        // First tag wins for a given Version value; later tags resolving to
        // an already-seen Version are dropped so it is emitted exactly once.
        let mut by_version: HashMap<Version, String> = HashMap::new();
        for tag in tags {
            if let Some(version) = Version::parse_tag(&tag) {
                by_version.entry(version).or_insert(tag);
            }
        }

        let mut admitted = Vec::new();
        for (version, tag) in by_version {
            if self.is_admitted(&version, &tag).await? {
                self.version_revisions
                    .lock()
                    .await
                    .entry(version.clone())
                    .or_insert_with(|| tag.clone());
                admitted.push(version);
            }
        }

        admitted.sort_by(|a, b| b.cmp(a));
        Ok(admitted)
    }

    async fn is_admitted(&self, version: &Version, tag: &str) -> Result<bool, Error> {
        if let Some(admitted) = self.admission_cache.lock().await.get(version) {
            return Ok(*admitted);
        }

        let revision = self
            .inspector
            .resolve_tag(&self.clone_path, tag)
            .await
            .map_err(|e| Error::NoSuchTag(e.to_string()))?;

        let tools_version = self
            .loader
            .tools_version(&self.reference, &revision)
            .await
            .map_err(|e| Error::NoSuchTag(e.to_string()))?;

        let admitted = UnsupportedToolsVersion::check(tools_version).is_ok();
        self.admission_cache.lock().await.insert(version.clone(), admitted);
        Ok(admitted)
    }

    /// `getRevision(forTag)` (spec.md §4.3).
    pub async fn get_revision(&self, for_tag: &str) -> Result<String, Error> {
        self.inspector
            .resolve_tag(&self.clone_path, for_tag)
            .await
            .map_err(|_| Error::NoSuchTag(for_tag.to_string()))
    }

    /// Resolve a branch name to a revision, or fail listing every branch the
    /// clone actually has, closest Levenshtein match first (spec.md §4.3).
    pub async fn get_branch_revision(&self, branch: &str) -> Result<String, Error> {
        match self.inspector.resolve_branch(&self.clone_path, branch).await {
            Ok(revision) => Ok(revision),
            Err(_) => {
                let mut available = self
                    .inspector
                    .list_branches(&self.clone_path)
                    .await
                    .unwrap_or_default();
                sort_by_closeness(branch, &mut available);
                Err(Error::NoSuchBranch {
                    requested: branch.to_string(),
                    available,
                })
            }
        }
    }

    pub async fn get_commit_revision(&self, commit: &str) -> Result<String, Error> {
        self.inspector
            .resolve_commit(&self.clone_path, commit)
            .await
            .map_err(|_| Error::NoSuchCommit(commit.to_string()))
    }

    /// `getDependencies(atVersionOrRevision, productFilter)` (spec.md
    /// §4.3): load the manifest at that revision, then project its
    /// declared dependencies under `filter`. The `(version, filter)` pair
    /// is cached; the cache key includes `filter` so two different filters
    /// for the same version never collide (spec.md §9).
    pub async fn get_dependencies(
        &self,
        at: &VersionOrRevision,
        filter: &ProductFilter,
    ) -> Result<Vec<DependencyDeclaration>, Error> {
        if let VersionOrRevision::Version(version) = at {
            if let Some(cached) = self
                .dependency_cache
                .lock()
                .await
                .get(&(version.clone(), filter.clone()))
            {
                return Ok(cached.clone());
            }
        }

        let revision = self.revision_for(at).await?;

        let tools_version = self
            .loader
            .tools_version(&self.reference, &revision)
            .await
            .map_err(|e| self.dependencies_error(GetDependenciesCause::Manifest(e.to_string())))?;

        UnsupportedToolsVersion::check(tools_version)
            .map_err(|cause| self.dependencies_error(GetDependenciesCause::from(cause)))?;

        let manifest = self
            .loader
            .load(&self.reference, &revision)
            .await
            .map_err(|e| self.dependencies_error(GetDependenciesCause::Manifest(e.to_string())))?;

        let projected: Vec<DependencyDeclaration> = filter
            .project(&manifest.dependencies)
            .into_iter()
            .cloned()
            .collect();

        if let VersionOrRevision::Version(version) = at {
            self.dependency_cache
                .lock()
                .await
                .insert((version.clone(), filter.clone()), projected.clone());
        }

        Ok(projected)
    }

    async fn revision_for(&self, at: &VersionOrRevision) -> Result<String, Error> {
        match at {
            VersionOrRevision::Version(version) => {
                if let Some(revision) = self.version_revisions.lock().await.get(version).cloned() {
                    // Stored value is the tag string, not yet a revision id.
                    return self.get_revision(&revision).await;
                }
                // Not yet seen by a descending scan; re-derive directly.
                self.tools_versions_appropriate_versions_descending().await?;
                let tag = self
                    .version_revisions
                    .lock()
                    .await
                    .get(version)
                    .cloned()
                    .ok_or_else(|| Error::NoSuchTag(version.to_string()))?;
                self.get_revision(&tag).await
            }
            VersionOrRevision::Branch(branch) => self.get_branch_revision(branch).await,
            VersionOrRevision::Revision(revision) => self.get_commit_revision(revision).await,
        }
    }

    fn dependencies_error(&self, cause: GetDependenciesCause) -> Error {
        Error::GetDependencies(GetDependenciesError {
            repository: self.repository_location.clone(),
            reference: self.reference.clone(),
            underlying: cause,
        })
    }
}

/// Orders `candidates` by Levenshtein distance to `requested` so the
/// likeliest typo fix is named first in the branch-not-found error; every
/// actual branch is still listed, regardless of distance.
fn sort_by_closeness(requested: &str, candidates: &mut [String]) {
    candidates.sort_by_key(|candidate| rapidfuzz::distance::levenshtein::distance(requested.chars(), candidate.chars()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap as StdHashMap;
    use std::path::Path;
    use std::sync::Mutex as StdMutex;
    use ws_types::identity::PackageIdentity;
    use ws_types::manifest::Manifest;
    use ws_types::reference::ReferenceKind;
    use ws_types::version::ToolsVersion;

    #[derive(Default)]
    struct FakeInspector {
        tags: Vec<(&'static str, &'static str)>,
        branches: Vec<&'static str>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("fake inspector error: {0}")]
    struct FakeError(String);

    #[async_trait]
    impl RevisionInspector for FakeInspector {
        type Error = FakeError;

        async fn list_tags(&self, _path: &Path) -> Result<Vec<String>, Self::Error> {
            Ok(self.tags.iter().map(|(t, _)| t.to_string()).collect())
        }

        async fn resolve_tag(&self, _path: &Path, tag: &str) -> Result<String, Self::Error> {
            self.tags
                .iter()
                .find(|(t, _)| *t == tag)
                .map(|(_, rev)| rev.to_string())
                .ok_or_else(|| FakeError(format!("no such tag {tag}")))
        }

        async fn list_branches(&self, _path: &Path) -> Result<Vec<String>, Self::Error> {
            Ok(self.branches.iter().map(|b| b.to_string()).collect())
        }

        async fn resolve_branch(&self, _path: &Path, branch: &str) -> Result<String, Self::Error> {
            if self.branches.contains(&branch) {
                Ok(format!("rev-{branch}"))
            } else {
                Err(FakeError(format!("no such branch {branch}")))
            }
        }

        async fn resolve_commit(&self, _path: &Path, commit: &str) -> Result<String, Self::Error> {
            Ok(commit.to_string())
        }
    }

    struct FakeLoader {
        tools_versions: StdMutex<StdHashMap<String, ToolsVersion>>,
        manifests: StdMutex<StdHashMap<String, Manifest>>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("fake loader error: {0}")]
    struct FakeLoaderError(String);

    #[async_trait]
    impl ManifestLoader for FakeLoader {
        type Error = FakeLoaderError;

        async fn load(&self, _reference: &PackageReference, revision: &str) -> Result<Manifest, Self::Error> {
            self.manifests
                .lock()
                .unwrap()
                .get(revision)
                .cloned()
                .ok_or_else(|| FakeLoaderError(format!("no manifest at {revision}")))
        }

        async fn tools_version(
            &self,
            _reference: &PackageReference,
            revision: &str,
        ) -> Result<ToolsVersion, Self::Error> {
            self.tools_versions
                .lock()
                .unwrap()
                .get(revision)
                .copied()
                .ok_or_else(|| FakeLoaderError(format!("no tools-version at {revision}")))
        }
    }

    fn reference() -> PackageReference {
        PackageReference::new(PackageIdentity::new("example"), ReferenceKind::RemoteSourceControl)
    }

    fn manifest(reference: &PackageReference, dependencies: Vec<DependencyDeclaration>) -> Manifest {
        Manifest {
            display_name: "Example".into(),
            identity: reference.identity.clone(),
            location: "https://example.com/example".into(),
            platforms: vec![],
            tools_version: ToolsVersion::new(5, 0, 0),
            dependencies,
            products: vec![],
            targets: vec![],
            version: None,
        }
    }

    #[tokio::test]
    async fn v_prefix_and_bare_tags_both_resolve() {
        let inspector = FakeInspector {
            tags: vec![("v1.0.0", "rev-a"), ("v1.0.1", "rev-b"), ("v2.0.3", "rev-c")],
            branches: vec![],
        };
        let reference = reference();
        let mut tools_versions = StdHashMap::new();
        tools_versions.insert("rev-a".to_string(), ToolsVersion::new(5, 0, 0));
        tools_versions.insert("rev-b".to_string(), ToolsVersion::new(5, 0, 0));
        tools_versions.insert("rev-c".to_string(), ToolsVersion::new(5, 0, 0));
        let loader = FakeLoader {
            tools_versions: StdMutex::new(tools_versions),
            manifests: StdMutex::new(StdHashMap::new()),
        };

        let container = PackageContainer::new(reference, "https://example.com/example", "/tmp/x", inspector, loader);
        let versions = container.tools_versions_appropriate_versions_descending().await.unwrap();
        let strs: Vec<_> = versions.iter().map(ToString::to_string).collect();
        assert_eq!(strs, vec!["2.0.3", "1.0.1", "1.0.0"]);
    }

    #[tokio::test]
    async fn tools_version_gate_excludes_unreadable_versions() {
        let inspector = FakeInspector {
            tags: vec![("1.0.0", "rev-a"), ("1.0.1", "rev-b"), ("1.0.2", "rev-c"), ("1.0.3", "rev-d")],
            branches: vec![],
        };
        let reference = reference();
        let mut tools_versions = StdHashMap::new();
        tools_versions.insert("rev-a".to_string(), ToolsVersion::new(3, 1, 0));
        tools_versions.insert("rev-b".to_string(), ToolsVersion::new(4, 0, 0));
        tools_versions.insert("rev-c".to_string(), ToolsVersion::new(4, 2, 0));
        tools_versions.insert("rev-d".to_string(), ToolsVersion::new(4, 2, 0));
        let loader = FakeLoader {
            tools_versions: StdMutex::new(tools_versions),
            manifests: StdMutex::new(StdHashMap::new()),
        };

        let container = PackageContainer::new(reference, "https://example.com/example", "/tmp/x", inspector, loader);
        let versions = container.tools_versions_appropriate_versions_descending().await.unwrap();
        let strs: Vec<_> = versions.iter().map(ToString::to_string).collect();
        assert_eq!(strs, vec!["1.0.3", "1.0.2", "1.0.1"]);
    }

    #[tokio::test]
    async fn product_filter_changes_projected_dependencies() {
        let inspector = FakeInspector {
            tags: vec![("1.0.0", "rev-a")],
            branches: vec![],
        };
        let reference = reference();
        let mut tools_versions = StdHashMap::new();
        tools_versions.insert("rev-a".to_string(), ToolsVersion::new(5, 0, 0));

        let dep = DependencyDeclaration {
            reference: PackageReference::new(PackageIdentity::new("onlyp"), ReferenceKind::RemoteSourceControl),
            products: ["P".to_string()].into_iter().collect(),
        };
        let mut manifests = StdHashMap::new();
        manifests.insert("rev-a".to_string(), manifest(&reference, vec![dep]));

        let loader = FakeLoader {
            tools_versions: StdMutex::new(tools_versions),
            manifests: StdMutex::new(manifests),
        };

        let container = PackageContainer::new(reference, "https://example.com/example", "/tmp/x", inspector, loader);
        let at = VersionOrRevision::Version(Version::new(1, 0, 0));

        let everything = container.get_dependencies(&at, &ProductFilter::everything()).await.unwrap();
        let specific = container
            .get_dependencies(&at, &ProductFilter::specific(["NotP".to_string()]))
            .await
            .unwrap();

        assert_eq!(everything.len(), 1);
        assert!(specific.is_empty());
    }

    #[tokio::test]
    async fn branch_typo_error_names_both_requested_and_available_branches() {
        let inspector = FakeInspector {
            tags: vec![],
            branches: vec!["main"],
        };
        let reference = reference();
        let loader = FakeLoader {
            tools_versions: StdMutex::new(StdHashMap::new()),
            manifests: StdMutex::new(StdHashMap::new()),
        };

        let container = PackageContainer::new(reference, "https://example.com/example", "/tmp/x", inspector, loader);
        let error = container.get_branch_revision("master").await.unwrap_err();
        match &error {
            Error::NoSuchBranch { requested, available } => {
                assert_eq!(requested, "master");
                assert_eq!(available, &["main".to_string()]);
            }
            other => panic!("expected NoSuchBranch, got {other:?}"),
        }
        let message = error.to_string();
        assert!(message.contains("master"), "{message}");
        assert!(message.contains("main"), "{message}");
    }

    #[tokio::test]
    async fn branch_typo_within_threshold_is_named_first() {
        let inspector = FakeInspector {
            tags: vec![],
            branches: vec!["trunk", "main"],
        };
        let reference = reference();
        let loader = FakeLoader {
            tools_versions: StdMutex::new(StdHashMap::new()),
            manifests: StdMutex::new(StdHashMap::new()),
        };

        let container = PackageContainer::new(reference, "https://example.com/example", "/tmp/x", inspector, loader);
        let error = container.get_branch_revision("mian").await.unwrap_err();
        match error {
            Error::NoSuchBranch { available, .. } => {
                assert_eq!(available.first(), Some(&"main".to_string()));
            }
            other => panic!("expected NoSuchBranch, got {other:?}"),
        }
    }
}

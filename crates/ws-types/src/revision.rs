// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! [`RevisionInspector`]: the external collaborator that reads tags,
//! branches, and commit ids out of a bare clone. Split out from
//! [`crate::provider::RepositoryProvider`] because it never mutates
//! anything on disk — the package container only ever needs read access to
//! a clone the repository manager already materialized.

use std::path::Path;

use async_trait::async_trait;

/// External collaborator backing [`crate::manifest::ManifestLoader`]'s
/// sibling concern: resolving a tag/branch/commit name to a revision id, and
/// enumerating the names available in a bare clone (spec.md §4.3).
#[async_trait]
pub trait RevisionInspector: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// All tag names in the clone at `path`, in no particular order.
    async fn list_tags(&self, path: &Path) -> Result<Vec<String>, Self::Error>;

    /// Resolve `tag` to the revision id it points at.
    async fn resolve_tag(&self, path: &Path, tag: &str) -> Result<String, Self::Error>;

    /// All branch names in the clone at `path`.
    async fn list_branches(&self, path: &Path) -> Result<Vec<String>, Self::Error>;

    /// Resolve `branch` to the revision id it currently points at.
    async fn resolve_branch(&self, path: &Path, branch: &str) -> Result<String, Self::Error>;

    /// Validate that `commit` names a real revision, returning its canonical
    /// id form.
    async fn resolve_commit(&self, path: &Path, commit: &str) -> Result<String, Self::Error>;
}

// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! [`RepositoryProvider`]: the external collaborator that actually speaks
//! to source control. The repository manager drives this interface; it
//! never touches a VCS library directly (spec.md §2 names this an
//! "external, interface-only" collaborator of the manager).

use std::path::Path;

use async_trait::async_trait;

use crate::specifier::RepositorySpecifier;

/// Outcome of a single `fetchAndPopulateCache` pass (spec.md §3.1, §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchDetails {
    pub from_cache: bool,
    pub updated_cache: bool,
}

impl FetchDetails {
    pub fn direct() -> Self {
        Self {
            from_cache: false,
            updated_cache: false,
        }
    }

    pub fn cached(updated: bool) -> Self {
        Self {
            from_cache: true,
            updated_cache: updated,
        }
    }
}

/// A unit of fetch/checkout progress, reported to the caller as it happens.
/// Providers are expected to call this at whatever granularity the
/// underlying transport gives them (object counts, bytes, etc).
pub trait ProgressCallback: Send + Sync {
    fn report(&self, completed: u64, total: Option<u64>);
}

impl<F: Fn(u64, Option<u64>) + Send + Sync> ProgressCallback for F {
    fn report(&self, completed: u64, total: Option<u64>) {
        self(completed, total)
    }
}

/// External collaborator that performs the actual source-control I/O: clone,
/// fetch, copy, and the handful of pure predicates the manager needs to
/// validate a path or ref without touching the network.
///
/// Implemented for real use by a git2-backed provider in the repository
/// crate; tests substitute an in-memory fake.
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Clone `spec` fresh into `destination` (which does not yet exist).
    async fn fetch(
        &self,
        spec: &RepositorySpecifier,
        destination: &Path,
        progress: &dyn ProgressCallback,
    ) -> Result<(), Self::Error>;

    /// Update an existing bare clone at `path` in place.
    async fn update(&self, path: &Path, progress: &dyn ProgressCallback) -> Result<(), Self::Error>;

    /// Copy a bare clone from `source` to `destination`, both already on
    /// disk, without touching the network.
    async fn copy(&self, source: &Path, destination: &Path) -> Result<(), Self::Error>;

    /// `true` iff `path` holds a bare clone this provider recognizes.
    fn is_valid_directory(&self, path: &Path) -> bool;

    /// `true` iff `reference` is a syntactically valid ref name for this
    /// provider's source-control system (used before ever touching disk).
    fn is_valid_ref_format(&self, reference: &str) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn closures_implement_progress_callback() {
        let total_seen = AtomicU64::new(0);
        let cb = |completed: u64, _total: Option<u64>| {
            total_seen.store(completed, Ordering::SeqCst);
        };
        cb.report(42, Some(100));
        assert_eq!(total_seen.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn fetch_details_constructors() {
        assert_eq!(
            FetchDetails::direct(),
            FetchDetails {
                from_cache: false,
                updated_cache: false
            }
        );
        assert_eq!(
            FetchDetails::cached(true),
            FetchDetails {
                from_cache: true,
                updated_cache: true
            }
        );
    }
}

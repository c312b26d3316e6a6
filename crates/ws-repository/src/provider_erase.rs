// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Erases a [`RepositoryProvider`] impl's associated `Error` type *and* its
//! concrete `Self` type behind a trait object, so the manager can be a
//! single non-generic concrete type. That's needed for the [`crate::handle`]
//! back-reference registry, which stores `Weak<Manager>` in one global map
//! keyed only by [`crate::handle::ManagerId`] — a generic `Manager<Prov>`
//! would need one such registry per provider type instantiation, which
//! defeats the point of a single process-wide map.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use ws_types::provider::{ProgressCallback, RepositoryProvider};
use ws_types::RepositorySpecifier;

#[derive(Debug)]
pub struct ProviderError(Box<dyn std::error::Error + Send + Sync + 'static>);

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

/// Object-safe counterpart of [`RepositoryProvider`], with the associated
/// `Error` type erased to [`ProviderError`]. [`Manager`](crate::manager::Manager)
/// holds one of these behind an `Arc<dyn DynRepositoryProvider>` rather than
/// being generic over a provider type.
#[async_trait]
pub trait DynRepositoryProvider: Send + Sync {
    async fn fetch(
        &self,
        spec: &RepositorySpecifier,
        destination: &Path,
        progress: &dyn ProgressCallback,
    ) -> Result<(), ProviderError>;

    async fn update(&self, path: &Path, progress: &dyn ProgressCallback) -> Result<(), ProviderError>;

    async fn copy(&self, source: &Path, destination: &Path) -> Result<(), ProviderError>;

    fn is_valid_directory(&self, path: &Path) -> bool;

    fn is_valid_ref_format(&self, reference: &str) -> bool;
}

#[async_trait]
impl<P: RepositoryProvider + Send + Sync + 'static> DynRepositoryProvider for P {
    async fn fetch(
        &self,
        spec: &RepositorySpecifier,
        destination: &Path,
        progress: &dyn ProgressCallback,
    ) -> Result<(), ProviderError> {
        RepositoryProvider::fetch(self, spec, destination, progress)
            .await
            .map_err(|e| ProviderError(Box::new(e)))
    }

    async fn update(&self, path: &Path, progress: &dyn ProgressCallback) -> Result<(), ProviderError> {
        RepositoryProvider::update(self, path, progress)
            .await
            .map_err(|e| ProviderError(Box::new(e)))
    }

    async fn copy(&self, source: &Path, destination: &Path) -> Result<(), ProviderError> {
        RepositoryProvider::copy(self, source, destination)
            .await
            .map_err(|e| ProviderError(Box::new(e)))
    }

    fn is_valid_directory(&self, path: &Path) -> bool {
        RepositoryProvider::is_valid_directory(self, path)
    }

    fn is_valid_ref_format(&self, reference: &str) -> bool {
        RepositoryProvider::is_valid_ref_format(self, reference)
    }
}

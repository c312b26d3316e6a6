// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The Container Provider (spec.md §4.3, §2): identity -> container
//! dispatch, cached so repeated lookups for the same reference reuse the
//! same [`PackageContainer`] (and its memoized admission/dependency
//! caches) rather than re-scanning tags every time.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use ws_types::identity::PackageIdentity;
use ws_types::manifest::ManifestLoader;
use ws_types::reference::PackageReference;
use ws_types::revision::RevisionInspector;

use crate::container::PackageContainer;

/// The per-reference collaborator the provider asks to materialize a local
/// clone before handing back a container (spec.md §2's data-flow
/// paragraph). Implemented by the workspace facade over a
/// `ws_repository::Manager`.
#[async_trait::async_trait]
pub trait ClonePathResolver: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Ensure a bare clone for `reference` at `location` is present locally
    /// and return its path.
    async fn resolve(&self, reference: &PackageReference, location: &str) -> Result<PathBuf, Self::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum Error<E: std::error::Error + Send + Sync + 'static> {
    #[error("resolving clone path: {0}")]
    Resolve(E),
}

/// Identity -> container dispatch, with a cache so the same identity always
/// returns the same [`PackageContainer`] instance (spec.md §2 "Container
/// Provider").
pub struct ContainerProvider<R, I, L>
where
    R: ClonePathResolver,
    I: RevisionInspector + Clone,
    L: ManifestLoader + Clone,
{
    resolver: R,
    inspector: I,
    loader: L,
    containers: Mutex<HashMap<PackageIdentity, Arc<PackageContainer<I, L>>>>,
}

impl<R, I, L> ContainerProvider<R, I, L>
where
    R: ClonePathResolver,
    I: RevisionInspector + Clone,
    L: ManifestLoader + Clone,
{
    pub fn new(resolver: R, inspector: I, loader: L) -> Self {
        Self {
            resolver,
            inspector,
            loader,
            containers: Mutex::new(HashMap::new()),
        }
    }

    /// Return the (possibly cached) container for `reference`, fetching a
    /// local clone through the resolver on a cache miss.
    pub async fn container_for(
        &self,
        reference: &PackageReference,
        location: &str,
    ) -> Result<Arc<PackageContainer<I, L>>, Error<R::Error>> {
        if let Some(existing) = self.containers.lock().await.get(&reference.identity).cloned() {
            log::debug!("container cache hit for {}", reference.identity);
            return Ok(existing);
        }

        log::debug!("container cache miss for {}, resolving clone path", reference.identity);
        let clone_path = self.resolver.resolve(reference, location).await.map_err(Error::Resolve)?;

        let container = Arc::new(PackageContainer::new(
            reference.clone(),
            location,
            clone_path,
            self.inspector.clone(),
            self.loader.clone(),
        ));

        self.containers
            .lock()
            .await
            .insert(reference.identity.clone(), container.clone());

        Ok(container)
    }

    /// Drop every cached container, forcing the next lookup to re-derive
    /// one from a fresh clone path.
    pub async fn invalidate_all(&self) {
        self.containers.lock().await.clear();
    }
}

// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The Workspace Facade (SPEC_FULL.md §7): binds a [`Manager`], a
//! [`ContainerProvider`], and the plugin compile/invoke pair to one on-disk
//! root, and owns the pins and managed-dependencies files alongside it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use ws_package::{ClonePathResolver, ContainerProvider, PackageContainer};
use ws_plugin::runner::InvocationOutcome;
use ws_plugin::{compile, invoke, CompileInputs, PluginDelegate, SandboxPolicy};
use ws_repository::{GitRevisionInspector, Manager, ManagerConfig, NoopDelegate};
use ws_types::manifest::ManifestLoader;
use ws_types::{ManagedDependencies, PackageReference, Pins, RepositorySpecifier};

use crate::{managed_dependencies, pins};

#[derive(Debug, Error)]
pub enum Error {
    #[error("repository manager error: {0}")]
    Manager(#[from] ws_repository::manager::Error),
    #[error("storage error: {0}")]
    Storage(#[from] ws_storage::versioned::Error),
    #[error("container provider error: {0}")]
    Container(String),
    #[error("plugin compile error: {0}")]
    PluginCompile(#[from] ws_plugin::compile::Error),
    #[error("plugin invocation error: {0}")]
    PluginInvoke(#[from] ws_plugin::runner::Error),
}

/// Binds [`ClonePathResolver`] to a [`Manager`]'s bare-clone cache: a
/// container's clone path is just whatever the repository manager already
/// materialized for that location (spec.md §2's data-flow paragraph).
pub struct ManagerResolver {
    manager: Arc<Manager>,
}

#[async_trait]
impl ClonePathResolver for ManagerResolver {
    type Error = ws_repository::manager::Error;

    async fn resolve(&self, _reference: &PackageReference, location: &str) -> Result<PathBuf, Self::Error> {
        let spec = RepositorySpecifier::from_location(location);
        let handle = self.manager.lookup(spec, false, &NoopDelegate).await?;
        Ok(self.manager.clone_path(handle.subpath()))
    }
}

/// Ties the Repository Manager, Package Container Provider, and Plugin
/// Script Runner together at one working directory. `L` is the caller's
/// [`ManifestLoader`] implementation — manifest grammar stays an external
/// collaborator (spec.md §1), this facade only wires it in.
pub struct Workspace<L: ManifestLoader + Clone> {
    root: PathBuf,
    manager: Arc<Manager>,
    containers: ContainerProvider<ManagerResolver, GitRevisionInspector, L>,
}

impl<L> Workspace<L>
where
    L: ManifestLoader + Clone + Send + Sync + 'static,
{
    /// Bind a workspace rooted at `root`, with `shared_cache_dir` as the
    /// repository manager's two-tier cache root (spec.md §6.1).
    pub async fn new(root: impl Into<PathBuf>, shared_cache_dir: Option<PathBuf>, manifest_loader: L) -> Result<Self, Error> {
        let root = root.into();

        let manager = Manager::new(
            ManagerConfig {
                working_dir: root.join("repositories"),
                shared_cache_dir,
                cache_local_packages: false,
                max_ops: 3,
            },
            ws_repository::GitRepositoryProvider,
        )
        .await?;

        let resolver = ManagerResolver { manager: manager.clone() };
        let containers = ContainerProvider::new(resolver, GitRevisionInspector, manifest_loader);

        Ok(Self { root, manager, containers })
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    fn pins_path(&self) -> PathBuf {
        self.root.join("Package.resolved")
    }

    fn managed_dependencies_path(&self) -> PathBuf {
        self.root.join(".ws-state").join("managed-dependencies.json")
    }

    pub fn load_pins(&self) -> Result<Pins, Error> {
        Ok(pins::load(&self.pins_path())?)
    }

    pub fn save_pins(&self, pins: &Pins) -> Result<(), Error> {
        Ok(pins::save(&self.pins_path(), pins)?)
    }

    pub fn load_managed_dependencies(&self) -> Result<ManagedDependencies, Error> {
        Ok(managed_dependencies::load(&self.managed_dependencies_path())?)
    }

    pub fn save_managed_dependencies(&self, managed: &ManagedDependencies) -> Result<(), Error> {
        Ok(managed_dependencies::save(&self.managed_dependencies_path(), managed)?)
    }

    /// `Workspace::container_for(reference)` (SPEC_FULL.md §7): ask the
    /// Container Provider for the (possibly cached) container backing
    /// `reference`'s clone at `location`, fetching it through the
    /// Repository Manager on a cache miss.
    pub async fn container_for(
        &self,
        reference: &PackageReference,
        location: &str,
    ) -> Result<Arc<PackageContainer<GitRevisionInspector, L>>, Error> {
        self.containers
            .container_for(reference, location)
            .await
            .map_err(|e| Error::Container(e.to_string()))
    }

    /// `Workspace::run_plugin(sources, tools_version, input, delegate)`
    /// (SPEC_FULL.md §7): compile then invoke, re-entering build/test
    /// operations through whatever `delegate` implements.
    pub async fn run_plugin(
        &self,
        compile_inputs: CompileInputs,
        sandbox: SandboxPolicy,
        input: serde_json::Value,
        delegate: Arc<dyn PluginDelegate>,
    ) -> Result<InvocationOutcome, Error> {
        log::debug!("compiling plugin from {} source file(s)", compile_inputs.sources.len());
        let compiled = compile(compile_inputs).await?;
        let cache_dir = compiled
            .compiled_executable
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        let outcome = invoke(&compiled.compiled_executable, &sandbox, &cache_dir, input, delegate).await?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ws_types::manifest::Manifest;
    use ws_types::ToolsVersion;

    #[derive(Clone)]
    struct EmptyLoader;

    #[derive(Debug, thiserror::Error)]
    #[error("no manifests in this test loader")]
    struct EmptyLoaderError;

    #[async_trait]
    impl ManifestLoader for EmptyLoader {
        type Error = EmptyLoaderError;

        async fn load(&self, _reference: &PackageReference, _revision: &str) -> Result<Manifest, Self::Error> {
            Err(EmptyLoaderError)
        }

        async fn tools_version(&self, _reference: &PackageReference, _revision: &str) -> Result<ToolsVersion, Self::Error> {
            Err(EmptyLoaderError)
        }
    }

    #[tokio::test]
    async fn new_workspace_has_empty_pins_and_managed_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path(), None, EmptyLoader).await.unwrap();

        assert!(workspace.load_pins().unwrap().is_empty());
        assert!(workspace.load_managed_dependencies().unwrap().is_empty());
    }

    #[tokio::test]
    async fn pins_round_trip_through_the_facade() {
        use ws_types::{PackageIdentity, Pin, PinState, ReferenceKind};

        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path(), None, EmptyLoader).await.unwrap();

        let mut pins = Pins::new();
        let reference = PackageReference::new(PackageIdentity::new("a"), ReferenceKind::RemoteSourceControl);
        pins.insert(Pin::new(&reference, "https://example.com/a", PinState::revision("deadbeef")));

        workspace.save_pins(&pins).unwrap();
        let reloaded = workspace.load_pins().unwrap();
        assert_eq!(reloaded.len(), 1);
    }
}

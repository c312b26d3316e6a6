// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The Repository Manager (spec.md §4.1): concurrent, content-addressed
//! cache of bare source-control clones.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fs_err as fs;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use ws_types::provider::{FetchDetails, ProgressCallback, RepositoryProvider};
use ws_types::{FsIdentifier, RepositorySpecifier};

use crate::handle::{self, ManagerId, RepositoryHandle};
use crate::provider_erase::{DynRepositoryProvider, ProviderError};
use crate::single_flight::{Lease, SingleFlight};
use crate::state::{self, RepositoriesState};

#[derive(Debug, Error)]
pub enum Error {
    #[error("repository provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("storage error: {0}")]
    Storage(#[from] ws_storage::versioned::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Delegate receiving the ordered lifecycle notifications a `lookup` call
/// produces (spec.md §5 "Ordering guarantees").
pub trait ManagerDelegate: Send + Sync {
    fn fetching_will_begin(&self, _spec: &RepositorySpecifier) {}
    fn fetching_did_finish(&self, _spec: &RepositorySpecifier, _error: Option<&str>, _duration: Duration) {}
    fn handle_will_update(&self, _spec: &RepositorySpecifier) {}
    fn handle_did_update(&self, _spec: &RepositorySpecifier, _duration: Duration) {}
}

/// A delegate that does nothing; the default for callers that don't need
/// progress/lifecycle notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelegate;
impl ManagerDelegate for NoopDelegate {}

struct NoopProgress;
impl ProgressCallback for NoopProgress {
    fn report(&self, _completed: u64, _total: Option<u64>) {}
}

pub struct ManagerConfig {
    pub working_dir: PathBuf,
    pub shared_cache_dir: Option<PathBuf>,
    pub cache_local_packages: bool,
    pub max_ops: usize,
}

pub struct Manager {
    config: ManagerConfig,
    provider: Arc<dyn DynRepositoryProvider>,
    repositories: Mutex<HashMap<String, RepositoryHandle>>,
    in_flight: SingleFlight<String>,
    worker_permits: Semaphore,
    manager_id_cell: std::sync::OnceLock<ManagerId>,
}

impl Manager {
    pub async fn new<Prov>(config: ManagerConfig, provider: Prov) -> Result<Arc<Self>, Error>
    where
        Prov: RepositoryProvider + Send + Sync + 'static,
    {
        let worker_permits = Semaphore::new(config.max_ops.min(3).max(1));

        let manager = Arc::new(Self {
            config,
            provider: Arc::new(provider),
            repositories: Mutex::new(HashMap::new()),
            in_flight: SingleFlight::new(),
            worker_permits,
            manager_id_cell: std::sync::OnceLock::new(),
        });

        let manager_id = handle::register(&manager);
        let _ = manager.manager_id_cell.set(manager_id);

        // On load error at construction, reset storage and continue with
        // empty state (spec.md §4.2), rather than failing manager creation.
        let loaded = match state::load(&manager.state_path()) {
            Ok(state) => state,
            Err(error) => {
                log::warn!("repository manager state unreadable, resetting: {error}");
                let _ = fs::remove_file(manager.state_path());
                RepositoriesState::default()
            }
        };

        let mut repositories = manager.repositories.lock().await;
        for (_, entry) in loaded.repositories.iter() {
            let specifier = entry_to_specifier(entry);
            let subpath = FsIdentifier::from_trusted(entry.subpath.clone());
            repositories.insert(
                specifier.location(),
                RepositoryHandle::new(specifier, subpath, manager_id),
            );
        }
        drop(repositories);

        Ok(manager)
    }

    fn manager_id(&self) -> ManagerId {
        *self.manager_id_cell.get().expect("manager_id set in new()")
    }

    fn state_path(&self) -> PathBuf {
        self.config.working_dir.join("checkouts-state.json")
    }

    fn repositories_dir(&self) -> PathBuf {
        self.config.working_dir.join("repositories")
    }

    pub fn clone_path(&self, subpath: &FsIdentifier) -> PathBuf {
        self.repositories_dir().join(subpath.as_str())
    }

    /// `lookup(spec, skipUpdate, completion)` — spec.md §4.1.
    pub async fn lookup(
        self: &Arc<Self>,
        spec: RepositorySpecifier,
        skip_update: bool,
        delegate: &dyn ManagerDelegate,
    ) -> Result<RepositoryHandle, Error> {
        let key = spec.location();

        loop {
            if let Some(handle) = self.repositories.lock().await.get(&key).cloned() {
                if skip_update {
                    return Ok(handle);
                }

                delegate.handle_will_update(&spec);
                let started = Instant::now();
                let path = self.clone_path(handle.subpath());
                self.provider
                    .update(&path, &NoopProgress)
                    .await
                    .map_err(Error::Provider)?;
                delegate.handle_did_update(&spec, started.elapsed());
                return Ok(handle);
            }

            match self.in_flight.enter(key.clone()).await {
                Lease::Follower(mut receiver) => {
                    let _ = receiver.changed().await;
                    continue;
                }
                Lease::Winner => {
                    let result = self.fetch_fresh(&spec, delegate).await;
                    self.in_flight.finish(&key).await;
                    return result;
                }
            }
        }
    }

    async fn fetch_fresh(
        self: &Arc<Self>,
        spec: &RepositorySpecifier,
        delegate: &dyn ManagerDelegate,
    ) -> Result<RepositoryHandle, Error> {
        let _permit = self.worker_permits.acquire().await.expect("semaphore not closed");

        let subpath = spec.filesystem_identifier();
        let destination = self.clone_path(&subpath);

        // No pre-emptive removal here: the provider clones into a scratch
        // location and only swaps it into `destination` once the clone
        // succeeds (spec.md:62), so a stale `destination` from a prior
        // failed attempt is replaced atomically rather than deleted up
        // front and possibly never replaced.
        delegate.fetching_will_begin(spec);
        let started = Instant::now();

        let result = self.fetch_and_populate_cache(spec, &subpath, &destination).await;

        match &result {
            Ok(_) => delegate.fetching_did_finish(spec, None, started.elapsed()),
            Err(error) => delegate.fetching_did_finish(spec, Some(&error.to_string()), started.elapsed()),
        }

        let _details = result?;

        let handle = RepositoryHandle::new(spec.clone(), subpath, self.manager_id());

        {
            let mut repositories = self.repositories.lock().await;
            repositories.insert(spec.location(), handle.clone());
        }

        let mut state = state::load(&self.state_path())?;
        state.insert(spec, handle.subpath());
        state::save(&self.state_path(), &state)?;

        Ok(handle)
    }

    /// The two-tier `fetchAndPopulateCache` algorithm (spec.md §4.1).
    async fn fetch_and_populate_cache(
        &self,
        spec: &RepositorySpecifier,
        subpath: &FsIdentifier,
        destination: &Path,
    ) -> Result<FetchDetails, Error> {
        let use_cache = self.config.shared_cache_dir.is_some()
            && (spec.is_remote() || self.config.cache_local_packages);

        if use_cache {
            match self.fetch_via_cache(spec, subpath, destination).await {
                Ok(details) => return Ok(details),
                Err(error) => {
                    log::warn!("cache-assisted fetch failed for {spec}, falling back to direct fetch: {error}");
                    let _ = fs::remove_dir_all(destination);
                }
            }
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        self.provider
            .fetch(spec, destination, &NoopProgress)
            .await?;
        Ok(FetchDetails::direct())
    }

    async fn fetch_via_cache(
        &self,
        spec: &RepositorySpecifier,
        subpath: &FsIdentifier,
        destination: &Path,
    ) -> Result<FetchDetails, Error> {
        let cache_root = self
            .config
            .shared_cache_dir
            .as_ref()
            .expect("use_cache implies shared_cache_dir is set");
        fs::create_dir_all(cache_root)?;

        let cache_root_lock_path = ws_storage::lock::lock_path_for(cache_root);
        let _shared = ws_storage::lock::acquire_shared(&cache_root_lock_path, "waiting on shared cache root lock")?;

        let cached_path = cache_root.join(subpath.as_str());
        let cached_lock_path = ws_storage::lock::lock_path_for(&cached_path);
        let _exclusive = ws_storage::lock::acquire_exclusive(
            &cached_lock_path,
            format_args!("waiting on exclusive lock for cached clone {}", cached_path.display()),
        )?;

        let (cache_used, cache_updated) = if cached_path.exists() {
            self.provider
                .update(&cached_path, &NoopProgress)
                .await?;
            (true, true)
        } else {
            self.provider
                .fetch(spec, &cached_path, &NoopProgress)
                .await?;
            (false, true)
        };

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        self.provider
            .copy(&cached_path, destination)
            .await?;

        Ok(FetchDetails {
            from_cache: cache_used,
            updated_cache: cache_updated,
        })
    }

    /// `remove(spec)` — exclusive removal of state entry and clone
    /// directory; no-op if absent.
    pub async fn remove(&self, spec: &RepositorySpecifier) -> Result<(), Error> {
        let mut repositories = self.repositories.lock().await;
        if let Some(handle) = repositories.remove(&spec.location()) {
            let path = self.clone_path(handle.subpath());
            if path.exists() {
                fs::remove_dir_all(path)?;
            }
            let mut state = state::load(&self.state_path())?;
            state.remove(spec);
            state::save(&self.state_path(), &state)?;
        }
        Ok(())
    }

    /// `reset()` — drop all state and delete the working directory.
    pub async fn reset(&self) -> Result<(), Error> {
        self.repositories.lock().await.clear();
        if self.config.working_dir.exists() {
            fs::remove_dir_all(&self.config.working_dir)?;
        }
        Ok(())
    }

    /// `purgeCache()` — under exclusive lock on the shared cache root,
    /// delete every cached clone entry.
    pub async fn purge_cache(&self) -> Result<(), Error> {
        let Some(cache_root) = self.config.shared_cache_dir.clone() else {
            return Ok(());
        };
        let lock_path = ws_storage::lock::lock_path_for(&cache_root);
        let _exclusive = ws_storage::lock::acquire_exclusive(&lock_path, "waiting on exclusive cache purge lock")?;

        if cache_root.exists() {
            for entry in fs::read_dir(&cache_root)? {
                let entry = entry?;
                if entry.path() == lock_path {
                    continue;
                }
                if entry.file_type()?.is_dir() {
                    fs::remove_dir_all(entry.path())?;
                } else {
                    fs::remove_file(entry.path())?;
                }
            }
        }
        Ok(())
    }

    pub fn is_valid_directory(&self, path: &Path) -> bool {
        self.provider.is_valid_directory(path)
    }

    pub fn is_valid_ref_format(&self, reference: &str) -> bool {
        self.provider.is_valid_ref_format(reference)
    }

    /// Thin pass-through: copy a handle's bare clone into a working-copy
    /// directory. `editable` is tracked by the caller (the workspace
    /// facade); this layer just performs the copy.
    pub async fn create_working_copy(
        &self,
        handle: &RepositoryHandle,
        at: &Path,
        _editable: bool,
    ) -> Result<(), Error> {
        let source = self.clone_path(handle.subpath());
        self.provider.copy(&source, at).await.map_err(Error::Provider)?;
        Ok(())
    }

    pub fn open_working_copy(&self, path: &Path) -> bool {
        self.provider.is_valid_directory(path)
    }

    /// Every specifier this manager currently holds a cached clone for.
    pub async fn list(&self) -> Vec<RepositorySpecifier> {
        self.repositories.lock().await.values().map(|h| h.specifier().clone()).collect()
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        if let Some(id) = self.manager_id_cell.get() {
            handle::deregister(*id);
        }
    }
}

fn entry_to_specifier(entry: &state::RepositoryEntry) -> RepositorySpecifier {
    RepositorySpecifier::from_location(&entry.repository_url)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use ws_types::provider::ProgressCallback;

    use super::*;

    #[derive(Clone)]
    struct FakeProvider {
        fetch_count: Arc<AtomicUsize>,
        update_count: Arc<AtomicUsize>,
    }

    impl FakeProvider {
        fn new() -> (Self, Arc<AtomicUsize>, Arc<AtomicUsize>) {
            let fetch_count = Arc::new(AtomicUsize::new(0));
            let update_count = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    fetch_count: fetch_count.clone(),
                    update_count: update_count.clone(),
                },
                fetch_count,
                update_count,
            )
        }
    }

    #[derive(Debug, Error)]
    #[error("fake provider error")]
    struct FakeProviderError;

    #[async_trait]
    impl RepositoryProvider for FakeProvider {
        type Error = FakeProviderError;

        async fn fetch(
            &self,
            _spec: &RepositorySpecifier,
            destination: &Path,
            _progress: &dyn ProgressCallback,
        ) -> Result<(), Self::Error> {
            self.fetch_count.fetch_add(1, Ordering::SeqCst);
            fs::create_dir_all(destination).map_err(|_| FakeProviderError)
        }

        async fn update(&self, _path: &Path, _progress: &dyn ProgressCallback) -> Result<(), Self::Error> {
            self.update_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn copy(&self, _source: &Path, destination: &Path) -> Result<(), Self::Error> {
            fs::create_dir_all(destination).map_err(|_| FakeProviderError)
        }

        fn is_valid_directory(&self, path: &Path) -> bool {
            path.exists()
        }

        fn is_valid_ref_format(&self, _reference: &str) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct RecordingDelegate {
        events: StdMutex<Vec<&'static str>>,
    }

    impl ManagerDelegate for RecordingDelegate {
        fn fetching_will_begin(&self, _spec: &RepositorySpecifier) {
            self.events.lock().unwrap().push("will_begin");
        }

        fn fetching_did_finish(&self, _spec: &RepositorySpecifier, _error: Option<&str>, _duration: Duration) {
            self.events.lock().unwrap().push("did_finish");
        }
    }

    fn config(working_dir: &Path) -> ManagerConfig {
        ManagerConfig {
            working_dir: working_dir.to_path_buf(),
            shared_cache_dir: None,
            cache_local_packages: false,
            max_ops: 3,
        }
    }

    fn unique_path_spec(name: &str) -> RepositorySpecifier {
        RepositorySpecifier::Path(PathBuf::from(format!("/tmp/ws-repository-tests/{name}")))
    }

    /// spec.md §5's ordering guarantee: `fetchingWillBegin` always precedes
    /// the matching `fetchingDidFinish` for a fresh fetch.
    #[tokio::test]
    async fn fetching_will_begin_precedes_fetching_did_finish() {
        let dir = tempfile::tempdir().unwrap();
        let (provider, _fetch_count, _update_count) = FakeProvider::new();
        let manager = Manager::new(config(dir.path()), provider).await.unwrap();
        let delegate = RecordingDelegate::default();

        manager
            .lookup(unique_path_spec("ordering"), false, &delegate)
            .await
            .unwrap();

        let events = delegate.events.lock().unwrap().clone();
        assert_eq!(events, vec!["will_begin", "did_finish"]);
    }

    #[tokio::test]
    async fn repeat_lookup_updates_the_existing_clone_instead_of_refetching() {
        let dir = tempfile::tempdir().unwrap();
        let (provider, fetch_count, update_count) = FakeProvider::new();
        let manager = Manager::new(config(dir.path()), provider).await.unwrap();
        let spec = unique_path_spec("repeat");

        manager.lookup(spec.clone(), false, &NoopDelegate).await.unwrap();
        manager.lookup(spec, false, &NoopDelegate).await.unwrap();

        assert_eq!(fetch_count.load(Ordering::SeqCst), 1);
        assert_eq!(update_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn skip_update_avoids_touching_the_provider_at_all_on_a_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let (provider, fetch_count, update_count) = FakeProvider::new();
        let manager = Manager::new(config(dir.path()), provider).await.unwrap();
        let spec = unique_path_spec("skip-update");

        manager.lookup(spec.clone(), false, &NoopDelegate).await.unwrap();
        manager.lookup(spec, true, &NoopDelegate).await.unwrap();

        assert_eq!(fetch_count.load(Ordering::SeqCst), 1);
        assert_eq!(update_count.load(Ordering::SeqCst), 0);
    }

    /// spec.md §3.2's single-flight guarantee, exercised at the manager's
    /// public `lookup` surface rather than at the `SingleFlight` unit alone.
    #[tokio::test]
    async fn concurrent_lookups_of_a_new_spec_are_coalesced_to_one_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let (provider, fetch_count, _update_count) = FakeProvider::new();
        let manager = Manager::new(config(dir.path()), provider).await.unwrap();
        let spec = unique_path_spec("concurrent");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            let spec = spec.clone();
            handles.push(tokio::spawn(async move {
                manager.lookup(spec, false, &NoopDelegate).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(fetch_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn list_reflects_looked_up_specifiers() {
        let dir = tempfile::tempdir().unwrap();
        let (provider, _fetch_count, _update_count) = FakeProvider::new();
        let manager = Manager::new(config(dir.path()), provider).await.unwrap();
        let spec = unique_path_spec("list");

        manager.lookup(spec.clone(), false, &NoopDelegate).await.unwrap();

        let listed = manager.list().await;
        assert_eq!(listed, vec![spec]);
    }

    #[tokio::test]
    async fn remove_deletes_clone_and_state_entry() {
        let dir = tempfile::tempdir().unwrap();
        let (provider, _fetch_count, _update_count) = FakeProvider::new();
        let manager = Manager::new(config(dir.path()), provider).await.unwrap();
        let spec = unique_path_spec("remove");

        let handle = manager.lookup(spec.clone(), false, &NoopDelegate).await.unwrap();
        let clone_path = manager.clone_path(handle.subpath());
        assert!(clone_path.exists());

        manager.remove(&spec).await.unwrap();
        assert!(!clone_path.exists());
        assert!(manager.list().await.is_empty());
    }
}

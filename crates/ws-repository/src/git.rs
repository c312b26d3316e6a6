// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! A [`RepositoryProvider`] backed by `git2`, grounded on the bare-clone +
//! checkout split `GitSource` uses for cargo/puffin's git cache: the
//! manager's working directory only ever holds bare clones, and working
//! copies are produced separately via [`RepositoryProvider::copy`] plus a
//! checkout step the workspace crate drives.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fs_err as fs;
use git2::{FetchOptions, RemoteCallbacks, Repository};
use thiserror::Error;
use ws_types::provider::{ProgressCallback, RepositoryProvider};
use ws_types::RepositorySpecifier;

#[derive(Debug, Error)]
pub enum Error {
    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),
    #[error("specifier {0} has no remote URL to fetch")]
    NotRemote(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Default, unsandboxed provider. Paths are cloned/opened directly; remote
/// URLs are fetched over whatever transport `git2`/`libgit2` supports.
#[derive(Debug, Default)]
pub struct GitRepositoryProvider;

fn fetch_options(progress: &dyn ProgressCallback) -> FetchOptions<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.transfer_progress(|stats| {
        progress.report(
            stats.received_objects() as u64,
            Some(stats.total_objects() as u64),
        );
        true
    });

    let mut options = FetchOptions::new();
    options.remote_callbacks(callbacks);
    options
}

#[async_trait]
impl RepositoryProvider for GitRepositoryProvider {
    type Error = Error;

    async fn fetch(
        &self,
        spec: &RepositorySpecifier,
        destination: &Path,
        progress: &dyn ProgressCallback,
    ) -> Result<(), Self::Error> {
        match spec {
            RepositorySpecifier::Url(url) => {
                let url = url.clone();
                let destination = destination.to_path_buf();
                tokio::task::spawn_blocking(move || -> Result<(), Error> {
                    // `&dyn ProgressCallback` can't cross into a 'static
                    // blocking closure, so transfer progress is swallowed
                    // here; the manager layer approximates its own
                    // before/after progress notifications instead.
                    clone_atomically(&destination, |scratch| {
                        let mut builder = git2::build::RepoBuilder::new();
                        builder.bare(true);
                        builder.fetch_options(fetch_options(&NullProgress));
                        builder.clone(url.as_str(), scratch)?;
                        Ok(())
                    })
                })
                .await
                .expect("blocking git clone task panicked")?;
                let _ = progress;
                Ok(())
            }
            RepositorySpecifier::Path(path) => {
                let path = path.clone();
                let destination = destination.to_path_buf();
                tokio::task::spawn_blocking(move || -> Result<(), Error> {
                    clone_atomically(&destination, |scratch| {
                        let mut builder = git2::build::RepoBuilder::new();
                        builder.bare(true);
                        builder.clone(&path.to_string_lossy(), scratch)?;
                        Ok(())
                    })
                })
                .await
                .expect("blocking git clone task panicked")?;
                Ok(())
            }
        }
    }

    async fn update(&self, path: &Path, progress: &dyn ProgressCallback) -> Result<(), Self::Error> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<(), Error> {
            let repo = Repository::open_bare(&path)?;
            let remote_names = repo.remotes()?;
            let remote_name = remote_names.get(0).unwrap_or("origin");
            let mut remote = repo.find_remote(remote_name)?;
            remote.fetch(&[] as &[&str], Some(&mut fetch_options(&NullProgress)), None)?;
            Ok(())
        })
        .await
        .expect("blocking git fetch task panicked")?;
        let _ = progress;
        Ok(())
    }

    async fn copy(&self, source: &Path, destination: &Path) -> Result<(), Self::Error> {
        let source = source.to_path_buf();
        let destination = destination.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<(), Error> {
            clone_atomically(&destination, |scratch| {
                let mut builder = git2::build::RepoBuilder::new();
                builder.bare(true);
                builder.clone(&source.to_string_lossy(), scratch)?;
                Ok(())
            })
        })
        .await
        .expect("blocking git copy task panicked")?;
        Ok(())
    }

    fn is_valid_directory(&self, path: &Path) -> bool {
        Repository::open(path).is_ok()
    }

    fn is_valid_ref_format(&self, reference: &str) -> bool {
        git2::Reference::is_valid_name(&format!("refs/heads/{reference}"))
            || git2::Oid::from_str(reference).is_ok()
    }
}

/// Sibling scratch path to clone into before the atomic rename into place
/// (spec.md:62), so the rename stays on the same filesystem as `destination`.
fn scratch_path_for(destination: &Path) -> PathBuf {
    let file_name = destination.file_name().unwrap_or_default().to_string_lossy().into_owned();
    destination.with_file_name(format!(".{file_name}.tmp-{}", std::process::id()))
}

/// Runs `populate` against a scratch directory beside `destination` and
/// renames it into place only once `populate` succeeds, so a failed or
/// interrupted clone leaves either the old state or nothing at
/// `destination`, never a half-written directory (spec.md:62).
fn clone_atomically(destination: &Path, populate: impl FnOnce(&Path) -> Result<(), git2::Error>) -> Result<(), Error> {
    let scratch = scratch_path_for(destination);
    if scratch.exists() {
        fs::remove_dir_all(&scratch)?;
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }

    populate(&scratch)?;

    if destination.exists() {
        fs::remove_dir_all(destination)?;
    }
    fs::rename(&scratch, destination)?;
    Ok(())
}

/// `transfer_progress` callbacks in `git2` can't cross the `spawn_blocking`
/// boundary along with a `&dyn ProgressCallback` borrowed from the async
/// caller's stack, so the blocking clone/fetch calls report through this
/// no-op and progress is approximated at the manager layer instead.
struct NullProgress;

impl ProgressCallback for NullProgress {
    fn report(&self, _completed: u64, _total: Option<u64>) {}
}

/// [`ws_types::RevisionInspector`] backed by `git2`, reading tags/branches
/// directly out of a bare clone the repository manager already materialized.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitRevisionInspector;

#[async_trait]
impl ws_types::RevisionInspector for GitRevisionInspector {
    type Error = Error;

    async fn list_tags(&self, path: &Path) -> Result<Vec<String>, Self::Error> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<Vec<String>, Error> {
            let repo = Repository::open_bare(&path)?;
            let tag_names = repo.tag_names(None)?;
            Ok(tag_names.iter().flatten().map(str::to_string).collect())
        })
        .await
        .expect("blocking git list_tags task panicked")
    }

    async fn resolve_tag(&self, path: &Path, tag: &str) -> Result<String, Self::Error> {
        let path = path.to_path_buf();
        let tag = tag.to_string();
        tokio::task::spawn_blocking(move || -> Result<String, Error> {
            let repo = Repository::open_bare(&path)?;
            let reference = repo.find_reference(&format!("refs/tags/{tag}"))?;
            let object = reference.peel(git2::ObjectType::Commit)?;
            Ok(object.id().to_string())
        })
        .await
        .expect("blocking git resolve_tag task panicked")
    }

    async fn list_branches(&self, path: &Path) -> Result<Vec<String>, Self::Error> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<Vec<String>, Error> {
            let repo = Repository::open_bare(&path)?;
            let branches = repo.branches(Some(git2::BranchType::Local))?;
            let mut names = Vec::new();
            for branch in branches {
                let (branch, _) = branch?;
                if let Some(name) = branch.name()? {
                    names.push(name.to_string());
                }
            }
            Ok(names)
        })
        .await
        .expect("blocking git list_branches task panicked")
    }

    async fn resolve_branch(&self, path: &Path, branch: &str) -> Result<String, Self::Error> {
        let path = path.to_path_buf();
        let branch = branch.to_string();
        tokio::task::spawn_blocking(move || -> Result<String, Error> {
            let repo = Repository::open_bare(&path)?;
            let reference = repo.find_reference(&format!("refs/heads/{branch}"))?;
            let object = reference.peel(git2::ObjectType::Commit)?;
            Ok(object.id().to_string())
        })
        .await
        .expect("blocking git resolve_branch task panicked")
    }

    async fn resolve_commit(&self, path: &Path, commit: &str) -> Result<String, Self::Error> {
        let path = path.to_path_buf();
        let commit = commit.to_string();
        tokio::task::spawn_blocking(move || -> Result<String, Error> {
            let repo = Repository::open_bare(&path)?;
            let oid = git2::Oid::from_str(&commit)?;
            let object = repo.find_commit(oid)?;
            Ok(object.id().to_string())
        })
        .await
        .expect("blocking git resolve_commit task panicked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_format_accepts_branch_names_and_oids() {
        let provider = GitRepositoryProvider;
        assert!(provider.is_valid_ref_format("main"));
        assert!(provider.is_valid_ref_format("0123456789abcdef0123456789abcdef01234567"));
    }

    #[test]
    fn ref_format_rejects_garbage() {
        let provider = GitRepositoryProvider;
        assert!(!provider.is_valid_ref_format("not a valid ref\n"));
    }
}

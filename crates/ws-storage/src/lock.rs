// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Advisory file locking, generalized from the installation lockfile to
//! support both the exclusive locks state-file writes need and the shared
//! locks the repository cache's read/copy paths need (spec.md §3.2, §5).

use std::fmt;
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fs_err::{self as fs, File};
use nix::fcntl::{flock, FlockArg};
use thiserror::Error;

/// An acquired file lock. Released automatically when the last clone is
/// dropped (the underlying fd closes, which releases the `flock`).
#[derive(Debug, Clone)]
pub struct Lock(Arc<File>);

#[derive(Debug, Error)]
pub enum Error {
    #[error("io")]
    Io(#[from] io::Error),
    #[error("obtaining file lock")]
    Flock(#[from] nix::Error),
}

fn open_lock_file(path: impl Into<PathBuf>) -> Result<File, Error> {
    let path = path.into();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)?)
}

/// Acquire an exclusive lock at `path`, blocking (and logging `block_msg`
/// once) if another process already holds it.
pub fn acquire_exclusive(path: impl Into<PathBuf>, block_msg: impl fmt::Display) -> Result<Lock, Error> {
    let file = open_lock_file(path)?;

    match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
        Ok(()) => {}
        Err(nix::errno::Errno::EWOULDBLOCK) => {
            log::info!("{block_msg}");
            flock(file.as_raw_fd(), FlockArg::LockExclusive)?;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Lock(Arc::new(file)))
}

/// Acquire a shared lock at `path`. Any number of readers may hold a shared
/// lock concurrently; it blocks only against an exclusive holder.
pub fn acquire_shared(path: impl Into<PathBuf>, block_msg: impl fmt::Display) -> Result<Lock, Error> {
    let file = open_lock_file(path)?;

    match flock(file.as_raw_fd(), FlockArg::LockSharedNonblock) {
        Ok(()) => {}
        Err(nix::errno::Errno::EWOULDBLOCK) => {
            log::info!("{block_msg}");
            flock(file.as_raw_fd(), FlockArg::LockShared)?;
        }
        Err(e) => return Err(e.into()),
    }

    Ok(Lock(Arc::new(file)))
}

/// Path a lock file should live at for a given directory this lock is
/// protecting — `<dir>/.lock`, matching the installation lockfile's layout.
pub fn lock_path_for(dir: &Path) -> PathBuf {
    dir.join(".lock")
}

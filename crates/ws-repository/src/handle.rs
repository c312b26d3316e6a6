// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! [`RepositoryHandle`] and the manager-id registry that resolves its
//! back-reference (spec.md §9 "Back-reference cycle").
//!
//! A handle is a plain value: `{specifier, subpath, manager_id}`. It holds
//! no `Arc<Manager>`/`Weak<Manager>` of its own, so handles never keep a
//! manager alive and a manager's map of handles never forms an ownership
//! cycle with the handles it hands out. Operations that need the owning
//! manager (e.g. `Manager::open`) look it up in [`REGISTRY`] by id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock, Weak};

use derive_more::{Display, From};
use ws_types::{FsIdentifier, RepositorySpecifier};

use crate::manager::Manager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, From)]
pub struct ManagerId(u64);

static NEXT_MANAGER_ID: AtomicU64 = AtomicU64::new(1);

fn registry() -> &'static Mutex<HashMap<ManagerId, Weak<Manager>>> {
    static REGISTRY: OnceLock<Mutex<HashMap<ManagerId, Weak<Manager>>>> = OnceLock::new();
    REGISTRY.get_or_init(Default::default)
}

/// Allocate a fresh id and register `manager`'s weak reference under it.
/// Called once from `Manager::new`.
pub(crate) fn register(manager: &std::sync::Arc<Manager>) -> ManagerId {
    let id = ManagerId(NEXT_MANAGER_ID.fetch_add(1, Ordering::Relaxed));
    registry().lock().unwrap().insert(id, std::sync::Arc::downgrade(manager));
    id
}

pub(crate) fn deregister(id: ManagerId) {
    registry().lock().unwrap().remove(&id);
}

/// Resolve a handle's owning manager, if it's still alive.
pub fn resolve(id: ManagerId) -> Option<std::sync::Arc<Manager>> {
    registry().lock().unwrap().get(&id)?.upgrade()
}

/// `{specifier, subpath}` plus an opaque, by-value back-reference to the
/// manager that produced it (spec.md §3.1, §3.3). Immutable after creation.
#[derive(Debug, Clone)]
pub struct RepositoryHandle {
    specifier: RepositorySpecifier,
    subpath: FsIdentifier,
    manager_id: ManagerId,
}

impl RepositoryHandle {
    pub(crate) fn new(specifier: RepositorySpecifier, subpath: FsIdentifier, manager_id: ManagerId) -> Self {
        Self {
            specifier,
            subpath,
            manager_id,
        }
    }

    pub fn specifier(&self) -> &RepositorySpecifier {
        &self.specifier
    }

    pub fn subpath(&self) -> &FsIdentifier {
        &self.subpath
    }

    pub fn manager_id(&self) -> ManagerId {
        self.manager_id
    }

    /// Resolve the owning manager and run `f` against it, if the manager is
    /// still alive.
    pub fn with_manager<R>(&self, f: impl FnOnce(&Manager) -> R) -> Option<R> {
        resolve(self.manager_id).map(|manager| f(&manager))
    }
}

impl PartialEq for RepositoryHandle {
    fn eq(&self, other: &Self) -> bool {
        self.specifier == other.specifier && self.subpath == other.subpath
    }
}

impl Eq for RepositoryHandle {}

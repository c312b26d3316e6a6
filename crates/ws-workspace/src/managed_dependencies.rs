// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Persistence for the managed-dependency set (spec.md §3.1/§3.3): the
//! workspace's on-disk record of what's actually checked out, alongside
//! [`crate::pins`]'s record of what resolution decided.

use std::path::Path;

use ws_storage::versioned;
use ws_types::ManagedDependencies;

pub const MANAGED_DEPENDENCIES_SCHEMA_VERSION: u32 = 1;

pub fn load(path: &Path) -> Result<ManagedDependencies, versioned::Error> {
    versioned::load(path, |version, object| {
        versioned::exact_version(version, object, MANAGED_DEPENDENCIES_SCHEMA_VERSION)
    })
}

pub fn save(path: &Path, managed: &ManagedDependencies) -> Result<(), versioned::Error> {
    versioned::save(path, MANAGED_DEPENDENCIES_SCHEMA_VERSION, managed)
}

// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The checkouts-state file: spec.md §4.2 — "exactly the specifiers whose
//! on-disk bare clones... are considered ready-to-use."

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use ws_types::{FsIdentifier, RepositorySpecifier};

use ws_storage::versioned;

pub const STATE_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    #[serde(rename = "repositoryURL")]
    pub repository_url: String,
    pub subpath: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoriesState {
    pub repositories: BTreeMap<String, RepositoryEntry>,
}

impl RepositoriesState {
    pub fn insert(&mut self, spec: &RepositorySpecifier, subpath: &FsIdentifier) {
        self.repositories.insert(
            spec.location(),
            RepositoryEntry {
                repository_url: spec.location(),
                subpath: subpath.as_str().to_string(),
            },
        );
    }

    pub fn remove(&mut self, spec: &RepositorySpecifier) {
        self.repositories.remove(&spec.location());
    }

    pub fn get(&self, spec: &RepositorySpecifier) -> Option<&RepositoryEntry> {
        self.repositories.get(&spec.location())
    }
}

pub fn load(path: &Path) -> Result<RepositoriesState, versioned::Error> {
    versioned::load(path, |version, object| {
        versioned::exact_version(version, object, STATE_SCHEMA_VERSION)
    })
}

pub fn save(path: &Path, state: &RepositoriesState) -> Result<(), versioned::Error> {
    versioned::save(path, STATE_SCHEMA_VERSION, state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_save_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkouts-state.json");

        let spec = RepositorySpecifier::path("/tmp/pkg");
        let mut state = RepositoriesState::default();
        state.insert(&spec, &spec.filesystem_identifier());

        save(&path, &state).unwrap();
        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded.repositories, state.repositories);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkouts-state.json");
        let state = load(&path).unwrap();
        assert!(state.repositories.is_empty());
    }
}

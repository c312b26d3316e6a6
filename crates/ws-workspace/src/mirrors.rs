// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The mirrors file (spec.md §6.4): `original -> mirror` substitution for
//! fetch locations. Local mirrors, when non-empty, replace shared mirrors
//! entirely rather than merging with them (spec.md §8.2 "Mirror override").

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use ws_storage::versioned;

pub const MIRRORS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct MirrorEntry {
    original: String,
    mirror: String,
}

/// An `original -> mirror` mapping loaded from a single mirrors file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mirrors {
    entries: IndexMap<String, String>,
}

impl Mirrors {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set(&mut self, original: impl Into<String>, mirror: impl Into<String>) {
        self.entries.insert(original.into(), mirror.into());
    }

    pub fn unset(&mut self, original: &str) {
        self.entries.shift_remove(original);
    }

    /// Resolve `original` through this mirror set, passing it through
    /// unchanged if no mirror is configured for it.
    fn resolve(&self, original: &str) -> String {
        self.entries.get(original).cloned().unwrap_or_else(|| original.to_string())
    }
}

impl Serialize for Mirrors {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries: Vec<MirrorEntry> = self
            .entries
            .iter()
            .map(|(original, mirror)| MirrorEntry {
                original: original.clone(),
                mirror: mirror.clone(),
            })
            .collect();
        entries.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Mirrors {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries: Vec<MirrorEntry> = Vec::deserialize(deserializer)?;
        Ok(Self {
            entries: entries.into_iter().map(|e| (e.original, e.mirror)).collect(),
        })
    }
}

pub fn load(path: &Path) -> Result<Mirrors, versioned::Error> {
    versioned::load(path, |version, object| {
        versioned::exact_version(version, object, MIRRORS_SCHEMA_VERSION)
    })
}

pub fn save(path: &Path, mirrors: &Mirrors) -> Result<(), versioned::Error> {
    versioned::save(path, MIRRORS_SCHEMA_VERSION, mirrors)
}

/// Binds a shared (system-scope) and local (workspace-scope) mirrors file
/// together per spec.md §6.4's override rule: local wins outright when it
/// has any entries at all, otherwise shared applies.
#[derive(Debug, Clone, Default)]
pub struct LayeredMirrors {
    pub shared: Mirrors,
    pub local: Mirrors,
}

impl LayeredMirrors {
    pub fn resolve(&self, original: &str) -> String {
        if self.local.is_empty() {
            self.shared.resolve(original)
        } else {
            self.local.resolve(original)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirrors.json");
        let mut mirrors = Mirrors::default();
        mirrors.set("https://github.com/a/b", "https://mirror.example.com/a/b");

        save(&path, &mirrors).unwrap();
        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded, mirrors);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mirrors = load(&dir.path().join("mirrors.json")).unwrap();
        assert!(mirrors.is_empty());
    }

    #[test]
    fn nonempty_local_overrides_shared_entirely() {
        let mut shared = Mirrors::default();
        shared.set("https://github.com/a/b", "https://shared-mirror/a/b");

        let mut local = Mirrors::default();
        local.set("https://github.com/c/d", "https://local-mirror/c/d");

        let layered = LayeredMirrors { shared, local };

        // Local has an entry, but not for this key — shared is not
        // consulted once local is non-empty, so the original passes through.
        assert_eq!(layered.resolve("https://github.com/a/b"), "https://github.com/a/b");
        assert_eq!(layered.resolve("https://github.com/c/d"), "https://local-mirror/c/d");
    }

    #[test]
    fn empty_local_falls_back_to_shared() {
        let mut shared = Mirrors::default();
        shared.set("https://github.com/a/b", "https://shared-mirror/a/b");

        let layered = LayeredMirrors {
            shared,
            local: Mirrors::default(),
        };

        assert_eq!(layered.resolve("https://github.com/a/b"), "https://shared-mirror/a/b");
    }
}

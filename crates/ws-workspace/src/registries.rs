// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The registries file (spec.md §6.4): named registry configuration. Shared
//! is merged first, local overrides individual keys — unlike mirrors, which
//! is an all-or-nothing override (spec.md §9's additive-schema spirit
//! extended to config layering).
//!
//! Registry protocol details are out of scope (spec.md §1); a
//! [`RegistryConfig`] is opaque beyond its `url`, with anything else a
//! registry needs carried through `extra` untouched.
//!
//! Unlike every other persisted document in this workspace, the registries
//! file's top-level key is `registries`, not `object` (spec.md §6.4's
//! schema), so this module writes its own envelope rather than going
//! through [`ws_storage::versioned`].

use std::io;
use std::path::Path;

use fs_err as fs;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] io::Error),
    #[error("lock: {0}")]
    Lock(#[from] ws_storage::lock::Error),
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown schema version {0}")]
    UnknownVersion(u32),
}

pub const REGISTRIES_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub url: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registries {
    registries: IndexMap<String, RegistryConfig>,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    version: u32,
    registries: IndexMap<String, RegistryConfig>,
}

impl Registries {
    pub fn set(&mut self, name: impl Into<String>, config: RegistryConfig) {
        self.registries.insert(name.into(), config);
    }

    pub fn get(&self, name: &str) -> Option<&RegistryConfig> {
        self.registries.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.registries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RegistryConfig)> {
        self.registries.iter()
    }

    /// Merge `shared` and `local`: shared entries first, then local entries
    /// inserted on top, overriding any shared entry with the same name
    /// (spec.md §6.4).
    pub fn merge(shared: &Self, local: &Self) -> Self {
        let mut merged = shared.registries.clone();
        for (name, config) in &local.registries {
            merged.insert(name.clone(), config.clone());
        }
        Self { registries: merged }
    }
}

pub fn load(path: &Path) -> Result<Registries, Error> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Registries::default()),
        Err(e) => return Err(e.into()),
    };

    let envelope: Envelope = serde_json::from_slice(&bytes)?;
    if envelope.version != REGISTRIES_SCHEMA_VERSION {
        return Err(Error::UnknownVersion(envelope.version));
    }
    Ok(Registries {
        registries: envelope.registries,
    })
}

pub fn save(path: &Path, registries: &Registries) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let lock_path = ws_storage::lock::lock_path_for(path.parent().unwrap_or_else(|| Path::new(".")));
    let _lock = ws_storage::lock::acquire_exclusive(&lock_path, format_args!("waiting for lock on {}", path.display()))?;

    let envelope = Envelope {
        version: REGISTRIES_SCHEMA_VERSION,
        registries: registries.registries.clone(),
    };
    fs::write(path, serde_json::to_vec_pretty(&envelope)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> RegistryConfig {
        RegistryConfig {
            url: url.to_string(),
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registries.json");
        let mut registries = Registries::default();
        registries.set("default", config("https://registry.example.com"));

        save(&path, &registries).unwrap();
        let reloaded = load(&path).unwrap();
        assert_eq!(reloaded, registries);
    }

    #[test]
    fn local_overrides_shared_by_key() {
        let mut shared = Registries::default();
        shared.set("default", config("https://shared.example.com"));
        shared.set("internal", config("https://shared-internal.example.com"));

        let mut local = Registries::default();
        local.set("default", config("https://local.example.com"));

        let merged = Registries::merge(&shared, &local);
        assert_eq!(merged.get("default").unwrap().url, "https://local.example.com");
        assert_eq!(merged.get("internal").unwrap().url, "https://shared-internal.example.com");
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registries = load(&dir.path().join("registries.json")).unwrap();
        assert!(registries.is_empty());
    }
}

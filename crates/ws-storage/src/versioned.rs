// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Generic schema-versioned JSON persistence (spec.md §4.2, §9
//! "Schema-versioned JSON"): every persisted file carries an integer
//! `version` alongside its payload; an unknown version is a hard load
//! error, never silently coerced.

use std::io;
use std::path::Path;

use fs_err as fs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::lock;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io")]
    Io(#[from] io::Error),
    #[error("lock")]
    Lock(#[from] lock::Error),
    #[error("malformed document")]
    Json(#[from] serde_json::Error),
    #[error("unknown schema version {0}")]
    UnknownVersion(u32),
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    object: T,
}

/// Load a versioned document from `path`. Returns `T::default()` if the
/// file does not exist yet. `migrate` is handed the on-disk `version` and
/// raw `object` payload and is responsible for producing a `T`, erroring on
/// any version it doesn't recognize — callers that only ever write one
/// schema version can just check `version == CURRENT` and deserialize
/// directly.
pub fn load<T, F>(path: &Path, migrate: F) -> Result<T, Error>
where
    T: Default,
    F: FnOnce(u32, Value) -> Result<T, Error>,
{
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(e.into()),
    };

    let envelope: Envelope<Value> = serde_json::from_slice(&bytes)?;
    migrate(envelope.version, envelope.object)
}

/// Deserialize `object` as `T` iff `version == expected`; otherwise a hard
/// `UnknownVersion` error. The common case for a document with exactly one
/// schema generation so far.
pub fn exact_version<T: DeserializeOwned>(version: u32, object: Value, expected: u32) -> Result<T, Error> {
    if version != expected {
        return Err(Error::UnknownVersion(version));
    }
    Ok(serde_json::from_value(object)?)
}

/// Persist `object` at `version` under an exclusive lock on `path`,
/// creating the parent directory if missing. The write is whole-file
/// (serialize then `write`), matching the small, infrequently updated state
/// files this core manages — there is no partial/streaming write path.
pub fn save<T: Serialize>(path: &Path, version: u32, object: &T) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let lock_path = lock::lock_path_for(path.parent().unwrap_or_else(|| Path::new(".")));
    let _lock = lock::acquire_exclusive(&lock_path, format_args!("waiting for lock on {}", path.display()))?;

    let envelope = Envelope { version, object };
    let serialized = serde_json::to_vec_pretty(&envelope)?;
    fs::write(path, serialized)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Doc {
        names: Vec<String>,
    }

    const DOC_VERSION: u32 = 1;

    #[test]
    fn missing_file_loads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let doc: Doc = load(&path, |v, o| exact_version(v, o, DOC_VERSION)).unwrap();
        assert_eq!(doc, Doc::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let doc = Doc {
            names: vec!["a".into(), "b".into()],
        };
        save(&path, DOC_VERSION, &doc).unwrap();
        let reloaded: Doc = load(&path, |v, o| exact_version(v, o, DOC_VERSION)).unwrap();
        assert_eq!(reloaded, doc);
    }

    #[test]
    fn unknown_version_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        save(&path, 99, &Doc::default()).unwrap();
        let result: Result<Doc, Error> = load(&path, |v, o| exact_version(v, o, DOC_VERSION));
        assert!(matches!(result, Err(Error::UnknownVersion(99))));
    }
}

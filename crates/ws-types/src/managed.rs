// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! [`ManagedDependency`]/[`ManagedArtifact`]: the working-tree lifecycle
//! entities spec.md §3.1/§3.3 describe alongside [`crate::pin`]. A pin
//! records what resolution *decided*; a managed dependency records what's
//! actually checked out on disk for it, including the `edited` state a pin
//! alone can't express.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::identity::PackageIdentity;
use crate::reference::PackageReference;

/// The resolved point in history a source-control checkout sits at —
/// structurally identical to [`crate::pin::PinState`], but kept as its own
/// type since a managed dependency's checkout state is a working-tree fact
/// ("what's on disk right now") rather than a resolution record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CheckoutState {
    Version { version: String, revision: String },
    Branch { branch: String, revision: String },
    Revision { revision: String },
}

impl CheckoutState {
    pub fn revision_id(&self) -> &str {
        match self {
            Self::Version { revision, .. } => revision,
            Self::Branch { revision, .. } => revision,
            Self::Revision { revision } => revision,
        }
    }
}

/// spec.md §3.1: `state ∈ {sourceControlCheckout, registryDownload, edited,
/// fileSystem, custom}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ManagedDependencyState {
    SourceControlCheckout(CheckoutState),
    RegistryDownload { version: String },
    /// `unmanagedPath` is `Some` when the edit points at an
    /// already-existing directory the user supplied, `None` when the
    /// workspace created the editable checkout itself.
    Edited { unmanaged_path: Option<PathBuf> },
    FileSystem,
    Custom { version: String, path: PathBuf },
}

/// `{packageRef, state, subpath}` (spec.md §3.1). Lifecycle (spec.md §3.3):
/// created at checkout, transitions `checkout -> edited -> checkout` or
/// `-> removed`; the on-disk working copy is owned exclusively by the
/// workspace except while edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedDependency {
    pub package_ref: PackageReference,
    pub state: ManagedDependencyState,
    pub subpath: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("dependency is already edited")]
    AlreadyEdited,
    #[error("dependency is not currently edited")]
    NotEdited,
}

impl ManagedDependency {
    pub fn checkout(package_ref: PackageReference, state: CheckoutState, subpath: impl Into<String>) -> Self {
        Self {
            package_ref,
            state: ManagedDependencyState::SourceControlCheckout(state),
            subpath: subpath.into(),
        }
    }

    pub fn registry_download(package_ref: PackageReference, version: impl Into<String>, subpath: impl Into<String>) -> Self {
        Self {
            package_ref,
            state: ManagedDependencyState::RegistryDownload { version: version.into() },
            subpath: subpath.into(),
        }
    }

    /// `checkout -> edited` (spec.md §3.3). Fails if already edited —
    /// editing twice without an intervening `unedit` would silently drop
    /// the original checkout state the edit needs to revert to.
    pub fn edit(&mut self, unmanaged_path: Option<PathBuf>) -> Result<(), TransitionError> {
        if matches!(self.state, ManagedDependencyState::Edited { .. }) {
            return Err(TransitionError::AlreadyEdited);
        }
        self.state = ManagedDependencyState::Edited { unmanaged_path };
        Ok(())
    }

    /// `edited -> checkout` (spec.md §3.3), restoring the source-control
    /// checkout this dependency resolved to before it was edited.
    pub fn unedit(&mut self, restored: CheckoutState) -> Result<(), TransitionError> {
        if !matches!(self.state, ManagedDependencyState::Edited { .. }) {
            return Err(TransitionError::NotEdited);
        }
        self.state = ManagedDependencyState::SourceControlCheckout(restored);
        Ok(())
    }

    pub fn is_edited(&self) -> bool {
        matches!(self.state, ManagedDependencyState::Edited { .. })
    }
}

/// Source a managed build artifact was materialized from (spec.md §3.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ArtifactSource {
    Remote { url: String, checksum: String },
    Local { checksum: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedArtifact {
    pub package_ref: PackageReference,
    pub target_name: String,
    pub source: ArtifactSource,
    pub path: PathBuf,
}

/// An insertion-ordered set of [`ManagedDependency`], keyed by identity —
/// the in-memory/on-disk view the workspace facade persists alongside the
/// pins file (spec.md §2's data-flow paragraph).
#[derive(Debug, Clone, Default)]
pub struct ManagedDependencies {
    entries: IndexMap<PackageIdentity, ManagedDependency>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ManagedDependenciesWire {
    dependencies: Vec<ManagedDependency>,
}

impl Serialize for ManagedDependencies {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = ManagedDependenciesWire {
            dependencies: self.entries.values().cloned().collect(),
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ManagedDependencies {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = ManagedDependenciesWire::deserialize(deserializer)?;
        Ok(Self {
            entries: wire
                .dependencies
                .into_iter()
                .map(|dep| (dep.package_ref.identity.clone(), dep))
                .collect(),
        })
    }
}

impl ManagedDependencies {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dependency: ManagedDependency) -> Option<ManagedDependency> {
        self.entries.insert(dependency.package_ref.identity.clone(), dependency)
    }

    pub fn get(&self, identity: &PackageIdentity) -> Option<&ManagedDependency> {
        self.entries.get(identity)
    }

    pub fn get_mut(&mut self, identity: &PackageIdentity) -> Option<&mut ManagedDependency> {
        self.entries.get_mut(identity)
    }

    /// `-> removed` (spec.md §3.3).
    pub fn remove(&mut self, identity: &PackageIdentity) -> Option<ManagedDependency> {
        self.entries.shift_remove(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PackageIdentity, &ManagedDependency)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ReferenceKind;

    fn reference(name: &str) -> PackageReference {
        PackageReference::new(PackageIdentity::new(name), ReferenceKind::RemoteSourceControl)
    }

    #[test]
    fn checkout_then_edit_then_unedit_round_trips() {
        let mut dep = ManagedDependency::checkout(
            reference("a"),
            CheckoutState::Version {
                version: "1.0.0".into(),
                revision: "deadbeef".into(),
            },
            "a-123",
        );
        assert!(!dep.is_edited());

        dep.edit(None).unwrap();
        assert!(dep.is_edited());

        let err = dep.edit(Some(PathBuf::from("/tmp/a"))).unwrap_err();
        assert_eq!(err, TransitionError::AlreadyEdited);

        dep.unedit(CheckoutState::Version {
            version: "1.0.0".into(),
            revision: "deadbeef".into(),
        })
        .unwrap();
        assert!(!dep.is_edited());
    }

    #[test]
    fn unedit_without_prior_edit_is_an_error() {
        let mut dep = ManagedDependency::checkout(
            reference("a"),
            CheckoutState::Revision { revision: "abc".into() },
            "a-123",
        );
        let err = dep
            .unedit(CheckoutState::Revision { revision: "abc".into() })
            .unwrap_err();
        assert_eq!(err, TransitionError::NotEdited);
    }

    #[test]
    fn set_preserves_insertion_order_and_supports_removal() {
        let mut set = ManagedDependencies::new();
        set.insert(ManagedDependency::checkout(
            reference("b"),
            CheckoutState::Revision { revision: "1".into() },
            "b-1",
        ));
        set.insert(ManagedDependency::checkout(
            reference("a"),
            CheckoutState::Revision { revision: "2".into() },
            "a-1",
        ));

        let identities: Vec<_> = set.iter().map(|(id, _)| id.as_str().to_string()).collect();
        assert_eq!(identities, vec!["b", "a"]);

        set.remove(&PackageIdentity::new("b"));
        assert_eq!(set.len(), 1);
        assert!(set.get(&PackageIdentity::new("b")).is_none());
    }
}

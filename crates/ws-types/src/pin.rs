// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! [`Pin`]/[`Pins`]: the `Package.resolved` data model (spec.md §6.2).

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::identity::PackageIdentity;
use crate::reference::{PackageReference, ReferenceKind};
use crate::version::Version;

/// Current schema version written by this implementation. Readers accept
/// `1` and `2`; writers always emit `2`.
pub const PINS_SCHEMA_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PinState {
    Version { version: String, revision: String },
    Branch { branch: String, revision: String },
    Revision { revision: String },
}

impl PinState {
    pub fn version(version: &Version, revision: impl Into<String>) -> Self {
        Self::Version {
            version: version.to_string(),
            revision: revision.into(),
        }
    }

    pub fn branch(name: impl Into<String>, revision: impl Into<String>) -> Self {
        Self::Branch {
            branch: name.into(),
            revision: revision.into(),
        }
    }

    pub fn revision(id: impl Into<String>) -> Self {
        Self::Revision { revision: id.into() }
    }

    pub fn revision_id(&self) -> &str {
        match self {
            Self::Version { revision, .. } => revision,
            Self::Branch { revision, .. } => revision,
            Self::Revision { revision } => revision,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    pub identity: PackageIdentity,
    pub kind: ReferenceKind,
    pub location: String,
    pub state: PinState,
}

impl Pin {
    pub fn new(reference: &PackageReference, location: impl Into<String>, state: PinState) -> Self {
        Self {
            identity: reference.identity.clone(),
            kind: reference.kind,
            location: location.into(),
            state,
        }
    }
}

/// A totally ordered (insertion-order-preserving) mapping from identity to
/// pin, plus the schema version it was loaded under. Order preservation
/// matters: `Package.resolved` is expected to diff cleanly in source
/// control, so pins keep the order they were first inserted in rather than
/// being re-sorted on every save.
#[derive(Debug, Clone, Default)]
pub struct Pins {
    entries: IndexMap<PackageIdentity, Pin>,
}

/// Wire shape of a pins document's envelope payload (spec.md §6.2):
/// `{ "pins": [ Pin, ... ] }`, an array rather than a map so ordering is
/// explicit in the serialized form too.
#[derive(Debug, Serialize, Deserialize)]
struct PinsWire {
    pins: Vec<Pin>,
}

impl Serialize for Pins {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = PinsWire {
            pins: self.entries.values().cloned().collect(),
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Pins {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = PinsWire::deserialize(deserializer)?;
        Ok(Self {
            entries: wire.pins.into_iter().map(|pin| (pin.identity.clone(), pin)).collect(),
        })
    }
}

impl Pins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pin: Pin) -> Option<Pin> {
        self.entries.insert(pin.identity.clone(), pin)
    }

    pub fn get(&self, identity: &PackageIdentity) -> Option<&Pin> {
        self.entries.get(identity)
    }

    pub fn remove(&mut self, identity: &PackageIdentity) -> Option<Pin> {
        self.entries.shift_remove(identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PackageIdentity, &Pin)> {
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

    fn reference(name: &str) -> PackageReference {
        PackageReference::new(PackageIdentity::new(name), ReferenceKind::RemoteSourceControl)
    }

    #[test]
    fn pin_state_carries_matching_revision() {
        let v = Version::new(1, 2, 3);
        let state = PinState::version(&v, "deadbeef");
        assert_eq!(state.revision_id(), "deadbeef");
    }

    #[test]
    fn pins_preserve_insertion_order() {
        let mut pins = Pins::new();
        pins.insert(Pin::new(&reference("b"), "https://example.com/b", PinState::revision("1")));
        pins.insert(Pin::new(&reference("a"), "https://example.com/a", PinState::revision("2")));
        let identities: Vec<_> = pins.iter().map(|(id, _)| id.as_str().to_string()).collect();
        assert_eq!(identities, vec!["b", "a"]);
    }

    #[test]
    fn reinserting_same_identity_replaces_in_place() {
        let mut pins = Pins::new();
        pins.insert(Pin::new(&reference("a"), "https://example.com/a", PinState::revision("1")));
        pins.insert(Pin::new(&reference("a"), "https://example.com/a", PinState::revision("2")));
        assert_eq!(pins.len(), 1);
        assert_eq!(pins.get(&PackageIdentity::new("a")).unwrap().state.revision_id(), "2");
    }
}

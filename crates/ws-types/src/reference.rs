// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! [`PackageReference`]: identity plus the kind of source it resolves to.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::identity::PackageIdentity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReferenceKind {
    Root,
    FileSystem,
    LocalSourceControl,
    RemoteSourceControl,
    Registry,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageReference {
    pub identity: PackageIdentity,
    pub kind: ReferenceKind,
}

impl PackageReference {
    pub fn new(identity: PackageIdentity, kind: ReferenceKind) -> Self {
        Self { identity, kind }
    }

    pub fn is_root(&self) -> bool {
        matches!(self.kind, ReferenceKind::Root)
    }

    pub fn is_source_control(&self) -> bool {
        matches!(
            self.kind,
            ReferenceKind::LocalSourceControl | ReferenceKind::RemoteSourceControl
        )
    }
}

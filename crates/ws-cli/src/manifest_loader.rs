// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The demo binary's [`ManifestLoader`]: manifest grammar stays an external
//! collaborator (spec.md §1), so this host never actually parses one.

use async_trait::async_trait;
use thiserror::Error;
use ws_types::manifest::{Manifest, ManifestLoader};
use ws_types::{PackageReference, ToolsVersion};

#[derive(Debug, Error)]
#[error("manifest parsing is not implemented by this host")]
pub struct UnimplementedError;

/// Always refuses: wiring in a real manifest grammar is left to whatever
/// embeds this core as a library.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnimplementedManifestLoader;

#[async_trait]
impl ManifestLoader for UnimplementedManifestLoader {
    type Error = UnimplementedError;

    async fn load(&self, _reference: &PackageReference, _revision: &str) -> Result<Manifest, Self::Error> {
        Err(UnimplementedError)
    }

    async fn tools_version(&self, _reference: &PackageReference, _revision: &str) -> Result<ToolsVersion, Self::Error> {
        Err(UnimplementedError)
    }
}

// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! [`Manifest`] and the [`ManifestLoader`] collaborator that produces one.
//!
//! Manifest *grammar* is out of scope for this core (spec.md §1 lists
//! manifest parsing as an external collaborator); this module only defines
//! the shape the rest of the workspace needs to agree on.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::identity::PackageIdentity;
use crate::reference::PackageReference;
use crate::version::{ToolsVersion, Version};

/// A declared platform/minimum-version requirement, e.g. `macOS("13.0")`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformRequirement {
    pub name: String,
    pub minimum_version: Option<String>,
}

/// A single declared dependency edge, prior to resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDeclaration {
    pub reference: PackageReference,
    /// Products of this dependency actually required by the declaring
    /// manifest; empty means "whatever the default product is."
    pub products: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub dependencies: Vec<String>,
}

/// The parsed contents of a manifest at some revision. Opaque beyond this
/// shape — the grammar that produces it is an external collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub display_name: String,
    pub identity: PackageIdentity,
    pub location: String,
    pub platforms: Vec<PlatformRequirement>,
    pub tools_version: ToolsVersion,
    pub dependencies: Vec<DependencyDeclaration>,
    pub products: Vec<Product>,
    pub targets: Vec<Target>,
    pub version: Option<Version>,
}

impl Manifest {
    /// `true` iff this manifest is readable under the host's tools-version
    /// ceiling (spec.md §3.2 / §4.3).
    pub fn is_readable(&self) -> bool {
        self.tools_version.is_readable()
    }
}

/// Restricts which of a dependency's advertised products participate in
/// resolution. The *same* `(version, filter)` pair must always produce the
/// same projected dependency set — see the historical product-filter cache
/// bug recorded alongside [`crate::pin`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductFilter {
    Everything,
    Specific(BTreeSet<String>),
}

impl ProductFilter {
    pub fn everything() -> Self {
        Self::Everything
    }

    pub fn specific(products: impl IntoIterator<Item = String>) -> Self {
        Self::Specific(products.into_iter().collect())
    }

    pub fn allows(&self, product: &str) -> bool {
        match self {
            Self::Everything => true,
            Self::Specific(set) => set.contains(product),
        }
    }

    /// Project a dependency's declared products through this filter,
    /// producing the subset of the declaration that's actually in scope.
    pub fn project<'a>(
        &self,
        declarations: &'a [DependencyDeclaration],
    ) -> Vec<&'a DependencyDeclaration> {
        declarations
            .iter()
            .filter(|d| d.products.is_empty() || d.products.iter().any(|p| self.allows(p)))
            .collect()
    }
}

/// External collaborator that turns a manifest's raw bytes, read at some
/// revision, into a [`Manifest`]. Manifest grammar and the mechanics of
/// locating the manifest blob in a working tree are both out of scope here;
/// the core only ever calls through this interface.
#[async_trait]
pub trait ManifestLoader: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn load(
        &self,
        reference: &PackageReference,
        revision: &str,
    ) -> Result<Manifest, Self::Error>;

    /// Read just the tools-version line without parsing the full manifest —
    /// used by the tools-version gate so a manifest that fails to parse
    /// under an unsupported tools-version still gets a typed
    /// `UnsupportedToolsVersion` rather than a generic parse error.
    async fn tools_version(
        &self,
        reference: &PackageReference,
        revision: &str,
    ) -> Result<ToolsVersion, Self::Error>;
}

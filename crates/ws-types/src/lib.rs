// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Shared data model for the workspace core.
//!
//! These types are deliberately free of I/O: the repository manager,
//! package container, and plugin runner crates depend on this crate, not
//! the other way around.

pub mod executor;
pub mod identity;
pub mod managed;
pub mod manifest;
pub mod pin;
pub mod plugin;
pub mod provider;
pub mod reference;
pub mod revision;
pub mod specifier;
pub mod version;

pub use executor::Executor;
pub use identity::PackageIdentity;
pub use managed::{
    ArtifactSource, CheckoutState, ManagedArtifact, ManagedDependencies, ManagedDependency, ManagedDependencyState,
};
pub use manifest::{Manifest, ManifestLoader, ProductFilter};
pub use pin::{Pin, PinState, Pins};
pub use plugin::PluginCompilationResult;
pub use provider::{FetchDetails, ProgressCallback, RepositoryProvider};
pub use reference::{PackageReference, ReferenceKind};
pub use revision::RevisionInspector;
pub use specifier::{FsIdentifier, RepositorySpecifier};
pub use version::{ToolsVersion, Version};

// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The Package Container (spec.md §4.3): per-reference views over versions,
//! manifests, and dependency declarations, dispatched by identity through a
//! [`provider::ContainerProvider`].

pub mod container;
pub mod provider;

pub use container::{Error as ContainerError, PackageContainer, UnsupportedToolsVersion, VersionOrRevision};
pub use provider::{ClonePathResolver, ContainerProvider};

// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The Workspace Facade (spec.md §2; expanded in SPEC_FULL.md §7): binds
//! the Repository Manager, Package Container Provider, and Plugin Script
//! Runner to one on-disk root, and owns the layered mirrors/registries
//! configuration files alongside it.

pub mod managed_dependencies;
pub mod mirrors;
pub mod pins;
pub mod registries;
pub mod workspace;

pub use mirrors::{LayeredMirrors, Mirrors};
pub use registries::{RegistryConfig, Registries};
pub use workspace::{Error, ManagerResolver, Workspace};

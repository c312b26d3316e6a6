// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! CLI subcommand dispatch (SPEC_FULL.md §8): one module per subcommand,
//! aggregated here the way the teacher's package-manager front end does.

use std::path::PathBuf;

use clap::{Arg, ArgAction, Command};
use thiserror::Error;
use ws_workspace::Workspace;

use crate::manifest_loader::UnimplementedManifestLoader;
use crate::Ws;

pub mod pins;
pub mod plugin;
pub mod repository;

fn command() -> Command {
    Command::new("ws-cli")
        .about("Workspace core demo front end")
        .arg(
            Arg::new("root")
                .short('C')
                .long("root")
                .global(true)
                .help("Workspace root directory")
                .action(ArgAction::Set)
                .default_value("."),
        )
        .arg_required_else_help(true)
        .subcommand(repository::command())
        .subcommand(pins::command())
        .subcommand(plugin::command())
}

pub async fn process() -> Result<(), Error> {
    let matches = command().get_matches();
    let root = PathBuf::from(matches.get_one::<String>("root").expect("has default"));

    let workspace: Ws = Workspace::new(root, None, UnimplementedManifestLoader).await?;

    match matches.subcommand() {
        Some(("repository", args)) => repository::handle(args, &workspace).await.map_err(Error::Repository),
        Some(("pins", args)) => pins::handle(args, &workspace).map_err(Error::Pins),
        Some(("plugin", args)) => plugin::handle(args, &workspace).await.map_err(Error::Plugin),
        _ => unreachable!("arg_required_else_help"),
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("workspace error: {0}")]
    Workspace(#[from] ws_workspace::Error),
    #[error("repository command failed: {0}")]
    Repository(repository::Error),
    #[error("pins command failed: {0}")]
    Pins(pins::Error),
    #[error("plugin command failed: {0}")]
    Plugin(plugin::Error),
}

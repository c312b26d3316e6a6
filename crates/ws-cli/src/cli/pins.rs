// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! `ws-cli pins list` (SPEC_FULL.md §8): read-only inspection of
//! `Package.resolved`.

use clap::{ArgMatches, Command};
use thiserror::Error;

use crate::Ws;

pub fn command() -> Command {
    Command::new("pins")
        .about("Inspect the workspace's resolved pins")
        .arg_required_else_help(true)
        .subcommand(Command::new("list").about("List every pinned dependency"))
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Workspace(#[from] ws_workspace::Error),
}

pub fn handle(args: &ArgMatches, workspace: &Ws) -> Result<(), Error> {
    match args.subcommand() {
        Some(("list", _)) => {
            let pins = workspace.load_pins()?;
            if pins.is_empty() {
                println!("no pins recorded");
                return Ok(());
            }
            for (identity, pin) in pins.iter() {
                println!("{identity}\t{}\t{}", pin.location, pin.state.revision_id());
            }
            Ok(())
        }
        _ => unreachable!("arg_required_else_help"),
    }
}

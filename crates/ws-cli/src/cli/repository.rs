// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! `ws-cli repository add|refresh|list` (SPEC_FULL.md §8): drives the
//! Repository Manager directly, the way `moss remote` drives `moss::Remote`.

use clap::{arg, ArgMatches, Command};
use thiserror::Error;
use ws_repository::ManagerDelegate;
use ws_types::RepositorySpecifier;

use crate::Ws;

pub fn command() -> Command {
    Command::new("repository")
        .about("Manage the repository manager's bare-clone cache")
        .arg_required_else_help(true)
        .subcommand(Command::new("add").about("Fetch and cache a repository").arg(arg!(<LOCATION> "path or URL")))
        .subcommand(
            Command::new("refresh")
                .about("Re-fetch a cached repository, or every cached repository if none is given")
                .arg(arg!([LOCATION] "path or URL")),
        )
        .subcommand(Command::new("list").about("List every repository currently cached"))
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Manager(#[from] ws_repository::manager::Error),
}

struct LoggingDelegate;

impl ManagerDelegate for LoggingDelegate {
    fn fetching_will_begin(&self, spec: &RepositorySpecifier) {
        log::info!("fetching {spec}");
    }

    fn fetching_did_finish(&self, spec: &RepositorySpecifier, error: Option<&str>, duration: std::time::Duration) {
        match error {
            Some(message) => log::warn!("fetch of {spec} failed after {duration:?}: {message}"),
            None => log::info!("fetched {spec} in {duration:?}"),
        }
    }

    fn handle_will_update(&self, spec: &RepositorySpecifier) {
        log::info!("updating {spec}");
    }

    fn handle_did_update(&self, spec: &RepositorySpecifier, duration: std::time::Duration) {
        log::info!("updated {spec} in {duration:?}");
    }
}

pub async fn handle(args: &ArgMatches, workspace: &Ws) -> Result<(), Error> {
    match args.subcommand() {
        Some(("add", args)) => {
            let location = args.get_one::<String>("LOCATION").expect("required");
            let spec = RepositorySpecifier::from_location(location);
            let handle = workspace.manager().lookup(spec, false, &LoggingDelegate).await?;
            println!("cached at {}", workspace.manager().clone_path(handle.subpath()).display());
            Ok(())
        }
        Some(("refresh", args)) => {
            match args.get_one::<String>("LOCATION") {
                Some(location) => {
                    let spec = RepositorySpecifier::from_location(location);
                    workspace.manager().lookup(spec, false, &LoggingDelegate).await?;
                }
                None => {
                    for spec in workspace.manager().list().await {
                        workspace.manager().lookup(spec, false, &LoggingDelegate).await?;
                    }
                }
            }
            Ok(())
        }
        Some(("list", _)) => {
            for spec in workspace.manager().list().await {
                println!("{spec}");
            }
            Ok(())
        }
        _ => unreachable!("arg_required_else_help"),
    }
}

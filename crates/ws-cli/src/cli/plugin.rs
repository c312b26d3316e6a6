// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! `ws-cli plugin run` (SPEC_FULL.md §8): compile and invoke a plugin
//! against the workspace's plugin cache, with [`ws_plugin::NoopDelegate`]
//! servicing build/test/symbol-graph requests (none of which this demo
//! front end implements).

use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command};
use thiserror::Error;
use ws_plugin::{CompileInputs, NoopDelegate, SandboxPolicy};
use ws_types::ToolsVersion;

use crate::Ws;

pub fn command() -> Command {
    Command::new("plugin")
        .about("Compile and invoke a plugin script")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("run")
                .about("Compile plugin sources (if needed) and invoke the result")
                .arg(
                    Arg::new("SOURCES")
                        .required(true)
                        .num_args(1..)
                        .value_parser(clap::value_parser!(PathBuf))
                        .help("plugin source files"),
                )
                .arg(
                    Arg::new("plugin-api")
                        .long("plugin-api")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf))
                        .help("Path to the plugin API module sources import against"),
                )
                .arg(
                    Arg::new("swift-version")
                        .long("swift-version")
                        .default_value("5")
                        .help("-swift-version passed to the compiler"),
                )
                .arg(
                    Arg::new("tools-version")
                        .long("tools-version")
                        .default_value("5.9.0")
                        .help("-package-description-version passed to the compiler"),
                )
                .arg(
                    Arg::new("input")
                        .long("input")
                        .default_value("{}")
                        .help("JSON performAction input, given inline"),
                )
                .arg(
                    Arg::new("no-sandbox")
                        .long("no-sandbox")
                        .action(ArgAction::SetTrue)
                        .help("Run the compiled plugin unsandboxed"),
                ),
        )
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Workspace(#[from] ws_workspace::Error),
    #[error("{0} is not a recognized tools version")]
    BadToolsVersion(String),
    #[error("--input is not valid JSON: {0}")]
    BadInput(#[from] serde_json::Error),
}

pub async fn handle(args: &ArgMatches, workspace: &Ws) -> Result<(), Error> {
    match args.subcommand() {
        Some(("run", args)) => {
            let sources: Vec<PathBuf> = args.get_many::<PathBuf>("SOURCES").expect("required").cloned().collect();
            let plugin_api_path = args.get_one::<PathBuf>("plugin-api").expect("required").clone();
            let swift_version = args.get_one::<String>("swift-version").expect("has default").clone();
            let raw_tools_version = args.get_one::<String>("tools-version").expect("has default");
            let tools_version = ToolsVersion::parse(raw_tools_version)
                .ok_or_else(|| Error::BadToolsVersion(raw_tools_version.clone()))?;
            let input: serde_json::Value = serde_json::from_str(args.get_one::<String>("input").expect("has default"))?;
            let no_sandbox = args.get_flag("no-sandbox");

            let cache_dir = workspace.manager().clone_path(&ws_types::FsIdentifier::from_trusted("plugin-cache".to_string()));

            let compile_inputs = CompileInputs {
                sources,
                tools_version,
                cache_dir: cache_dir.clone(),
                plugin_api_path,
                extra_args: Vec::new(),
                swift_version,
            };

            let sandbox = if no_sandbox {
                SandboxPolicy::new(&cache_dir).disabled()
            } else {
                SandboxPolicy::new(&cache_dir)
            };

            let outcome = workspace.run_plugin(compile_inputs, sandbox, input, std::sync::Arc::new(NoopDelegate)).await?;

            if outcome.success {
                println!("plugin invocation succeeded");
            } else {
                match outcome.ended_by_signal {
                    Some(signal) => println!("plugin invocation failed (killed by signal {signal})"),
                    None => println!("plugin invocation failed"),
                }
            }
            Ok(())
        }
        _ => unreachable!("arg_required_else_help"),
    }
}

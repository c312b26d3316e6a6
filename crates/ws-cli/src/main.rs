// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

mod cli;
mod manifest_loader;

pub type Ws = ws_workspace::Workspace<manifest_loader::UnimplementedManifestLoader>;

#[tokio::main]
async fn main() -> Result<(), cli::Error> {
    env_logger::init();
    cli::process().await
}

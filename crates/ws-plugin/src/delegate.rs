// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! [`PluginDelegate`]: the callback surface a running plugin invocation
//! drives (spec.md §4.4.2 step 5) — diagnostics, defined commands, and the
//! three request kinds a plugin can ask the host to service by re-entering
//! the workspace.

use std::path::PathBuf;

use async_trait::async_trait;
use ws_types::plugin::{
    BuildCommandConfiguration, BuildOperationRequest, BuildOperationResult, DiagnosticSeverity,
    SymbolGraphRequest, SymbolGraphResult, TestOperationRequest, TestOperationResult,
};

#[async_trait]
pub trait PluginDelegate: Send + Sync {
    fn emit_diagnostic(&self, severity: DiagnosticSeverity, message: String, file: Option<PathBuf>, line: Option<u32>) {
        let _ = (severity, message, file, line);
    }

    fn define_build_command(&self, configuration: BuildCommandConfiguration, inputs: Vec<PathBuf>, outputs: Vec<PathBuf>) {
        let _ = (configuration, inputs, outputs);
    }

    fn define_prebuild_command(&self, configuration: BuildCommandConfiguration, output_directory: PathBuf) {
        let _ = (configuration, output_directory);
    }

    /// A chunk of the plugin's free-form stderr stream, forwarded as it
    /// arrives (spec.md §4.4.2 step 4).
    fn plugin_emitted_output(&self, _chunk: &[u8]) {}

    async fn handle_build_operation(&self, request: BuildOperationRequest) -> Result<BuildOperationResult, String> {
        let _ = request;
        Err("build operations are not supported by this host".to_string())
    }

    async fn handle_test_operation(&self, request: TestOperationRequest) -> Result<TestOperationResult, String> {
        let _ = request;
        Err("test operations are not supported by this host".to_string())
    }

    async fn handle_symbol_graph(&self, request: SymbolGraphRequest) -> Result<SymbolGraphResult, String> {
        let _ = request;
        Err("symbol graph generation is not supported by this host".to_string())
    }
}

/// A delegate that drops every notification and refuses every request; used
/// where a caller only cares about the invocation's final success/failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDelegate;

#[async_trait]
impl PluginDelegate for NoopDelegate {}

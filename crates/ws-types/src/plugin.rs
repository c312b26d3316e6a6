// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! Plugin compilation result and the bidirectional wire protocol (spec.md
//! §4.4, §6.3). Framing itself (length-prefix read/write) lives in the
//! plugin-runner crate; these are just the message shapes both sides agree
//! on.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Outcome of a single plugin compilation attempt (spec.md §4.4.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginCompilationResult {
    pub compiler_result: Option<CompilerInvocationResult>,
    pub diagnostics_file: PathBuf,
    pub compiled_executable: PathBuf,
    pub was_cached: bool,
}

/// Raw outcome of actually invoking the compiler (only present when a
/// compile was attempted — a cache hit skips invoking it entirely).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerInvocationResult {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CompilerInvocationResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
    Remark,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: u32,
}

/// A request for the host to build some subset of targets, as issued by a
/// running plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOperationRequest {
    pub subset: Vec<String>,
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOperationResult {
    pub succeeded: bool,
    pub log_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOperationRequest {
    pub subset: Vec<String>,
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOperationResult {
    pub succeeded: bool,
    pub log_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolGraphRequest {
    pub target: String,
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolGraphResult {
    pub directory: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCommandConfiguration {
    pub display_name: String,
    pub executable: PathBuf,
    pub arguments: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub working_directory: Option<PathBuf>,
}

/// Message the host sends to a running plugin. Exactly one is sent to open
/// the conversation (`PerformAction`); the rest are replies to a request the
/// plugin made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "message", rename_all = "camelCase")]
pub enum HostToPluginMessage {
    PerformAction { input: serde_json::Value },
    BuildOperationResponse { result: BuildOperationResult },
    TestOperationResponse { result: TestOperationResult },
    SymbolGraphResponse { result: SymbolGraphResult },
    ErrorResponse { error: String },
}

/// Message a running plugin sends to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "message", rename_all = "camelCase")]
pub enum PluginToHostMessage {
    EmitDiagnostic {
        severity: DiagnosticSeverity,
        message: String,
        file: Option<PathBuf>,
        line: Option<u32>,
    },
    DefineBuildCommand {
        configuration: BuildCommandConfiguration,
        inputs: Vec<PathBuf>,
        outputs: Vec<PathBuf>,
    },
    DefinePrebuildCommand {
        configuration: BuildCommandConfiguration,
        output_directory: PathBuf,
    },
    BuildOperationRequest(BuildOperationRequest),
    TestOperationRequest(TestOperationRequest),
    SymbolGraphRequest(SymbolGraphRequest),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_to_plugin_messages_round_trip_through_json() {
        let msg = HostToPluginMessage::ErrorResponse {
            error: "no such target".into(),
        };
        let encoded = serde_json::to_vec(&msg).unwrap();
        let decoded: HostToPluginMessage = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn plugin_to_host_messages_round_trip_through_json() {
        let msg = PluginToHostMessage::EmitDiagnostic {
            severity: DiagnosticSeverity::Error,
            message: "boom".into(),
            file: Some(PathBuf::from("Plugin.swift")),
            line: Some(12),
        };
        let encoded = serde_json::to_vec(&msg).unwrap();
        let decoded: PluginToHostMessage = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(msg, decoded);
    }
}

// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The plugin compile step (spec.md §4.4.1): compile plugin sources to a
//! host executable, cached by an input hash so a repeat compile of the same
//! sources/command/environment is a cache hit.

use std::path::{Path, PathBuf};

use fs_err::tokio as fs;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::process::Command;
use ws_types::plugin::{CompilerInvocationResult, PluginCompilationResult};
use ws_types::ToolsVersion;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("compilation failed: {result:?}")]
    CompilationFailed { result: CompilerInvocationResult },
}

/// Inputs to a single compile attempt (spec.md §4.4.1).
pub struct CompileInputs {
    pub sources: Vec<PathBuf>,
    pub tools_version: ToolsVersion,
    pub cache_dir: PathBuf,
    /// Path to the plugin API module the compiled sources import against
    /// (`-I pluginAPIPath`).
    pub plugin_api_path: PathBuf,
    /// Host-specific target/SDK/module-cache flags appended verbatim;
    /// opaque to this core (spec.md §1 leaves toolchain specifics external).
    pub extra_args: Vec<String>,
    pub swift_version: String,
}

/// Map a source file's root basename to a valid C identifier (spec.md
/// §4.4.1 step 1): non-identifier characters become `_`, and a leading
/// digit gets an `_` prefix so the result is always a legal symbol/file
/// stem.
pub fn mangle(root_basename: &str) -> String {
    let mut mangled: String = root_basename
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if mangled.is_empty() {
        return "_plugin".to_string();
    }
    if mangled.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        mangled.insert(0, '_');
    }
    mangled
}

fn exec_name(inputs: &CompileInputs) -> Option<String> {
    let root = inputs.sources.first()?;
    let stem = root.file_stem()?.to_str()?;
    Some(mangle(stem))
}

fn build_command(inputs: &CompileInputs, exec_file: &Path, dia_file: &Path) -> Command {
    let mut command = Command::new("swiftc");
    command.arg("-parse-as-library");
    for source in &inputs.sources {
        command.arg(source);
    }
    command
        .arg("-I")
        .arg(&inputs.plugin_api_path)
        .arg("-swift-version")
        .arg(&inputs.swift_version)
        .arg("-package-description-version")
        .arg(inputs.tools_version.to_string())
        .arg("-serialize-diagnostics-path")
        .arg(dia_file)
        .arg("-o")
        .arg(exec_file)
        .args(&inputs.extra_args);
    command
}

/// `SHA-256(command || sorted(env) || concat(sourceFiles))` (spec.md
/// §4.4.1 step 3). A hashing failure (a source file that can't be read) is
/// non-fatal: the caller treats it as a cache miss, never as a compile
/// error.
async fn input_hash(command: &Command, inputs: &CompileInputs) -> Option<String> {
    let mut hasher = Sha256::new();

    hasher.update(format!("{command:?}").as_bytes());

    let mut env_vars: Vec<(String, String)> = std::env::vars().collect();
    env_vars.sort();
    for (key, value) in env_vars {
        hasher.update(key.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"\0");
    }

    for source in &inputs.sources {
        let bytes = fs::read(source).await.ok()?;
        hasher.update(&bytes);
    }

    Some(hex::encode(hasher.finalize()))
}

fn hash_file_path(exec_file: &Path) -> PathBuf {
    let mut path = exec_file.as_os_str().to_owned();
    path.push(".inputhash");
    PathBuf::from(path)
}

fn dia_file_path(cache_dir: &Path, exec_name: &str) -> PathBuf {
    cache_dir.join(format!("{exec_name}.dia"))
}

/// Compile `inputs.sources` into a cached executable under `cache_dir`,
/// reusing a prior build byte-for-byte when `<execName>.inputhash` matches
/// (spec.md §4.4.1, §8.2 "Cache hit idempotence").
pub async fn compile(inputs: CompileInputs) -> Result<PluginCompilationResult, Error> {
    let name = exec_name(&inputs).unwrap_or_else(|| "_plugin".to_string());
    fs::create_dir_all(&inputs.cache_dir).await?;

    let exec_file = inputs.cache_dir.join(&name);
    let dia_file = dia_file_path(&inputs.cache_dir, &name);
    let hash_file = hash_file_path(&exec_file);

    let command = build_command(&inputs, &exec_file, &dia_file);
    let hash = input_hash(&command, &inputs).await;

    if let Some(hash) = &hash {
        if exec_file.exists() {
            if let Ok(existing) = fs::read_to_string(&hash_file).await {
                if existing == *hash {
                    log::debug!("plugin compile cache hit for {name}");
                    return Ok(PluginCompilationResult {
                        compiler_result: None,
                        diagnostics_file: dia_file,
                        compiled_executable: exec_file,
                        was_cached: true,
                    });
                }
            }
        }
    }

    log::debug!("plugin compile cache miss for {name}, invoking swiftc");
    let mut command = command;
    let output = command.output().await?;

    let invocation = CompilerInvocationResult {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !invocation.succeeded() {
        log::warn!("plugin compile failed for {name}: exit code {:?}", invocation.exit_code);
        let _ = fs::remove_file(&exec_file).await;
        let _ = fs::remove_file(&hash_file).await;
        return Err(Error::CompilationFailed { result: invocation });
    }

    if let Some(hash) = hash {
        fs::write(&hash_file, hash).await?;
    }

    Ok(PluginCompilationResult {
        compiler_result: Some(invocation),
        diagnostics_file: dia_file,
        compiled_executable: exec_file,
        was_cached: false,
    })
}

// SPDX-FileCopyrightText: Copyright © 2020-2025 Serpent OS Developers
//
// SPDX-License-Identifier: MPL-2.0

//! The invoke half of the Plugin Script Runner (spec.md §4.4.2): spawn a
//! compiled plugin executable under a [`crate::sandbox::SandboxPolicy`] and
//! drive the length-prefixed JSON message loop to completion.

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use ws_types::plugin::{DiagnosticSeverity, HostToPluginMessage, PluginToHostMessage};

use crate::delegate::PluginDelegate;
use crate::framing;
use crate::sandbox::SandboxPolicy;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("plugin communication error: {0}")]
    Communication(#[from] framing::Error),
    #[error("plugin task panicked")]
    TaskPanicked,
}

impl From<tokio::task::JoinError> for Error {
    fn from(_: tokio::task::JoinError) -> Self {
        Error::TaskPanicked
    }
}

/// Outcome of a completed invocation (spec.md §4.4.2 step 6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutcome {
    pub success: bool,
    /// `Some(signal)` iff the child died by an uncaught signal rather than
    /// exiting normally (`invocationEndedBySignal`).
    pub ended_by_signal: Option<i32>,
}

/// Spawn `compiled_executable` under `sandbox`, send the opening
/// `performAction(input)` message, and service the plugin's requests via
/// `delegate` until it exits.
pub async fn invoke(
    compiled_executable: &Path,
    sandbox: &SandboxPolicy,
    cache_dir: &Path,
    input: serde_json::Value,
    delegate: Arc<dyn PluginDelegate>,
) -> Result<InvocationOutcome, Error> {
    let mut command = Command::new(compiled_executable);
    command
        .current_dir(cache_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    sandbox.apply(&mut command);

    let mut child = command.spawn()?;
    let stdin = child.stdin.take().expect("stdin was piped");
    let stdout = child.stdout.take().expect("stdout was piped");
    let stderr = child.stderr.take().expect("stderr was piped");

    // Single serialized output queue: every write to the plugin's stdin —
    // the opening `performAction` and every reply to a request — goes
    // through this channel so writes never interleave (spec.md §5).
    let (outbox, mut inbox) = mpsc::unbounded_channel::<HostToPluginMessage>();

    let writer = tokio::spawn(async move {
        let mut stdin = stdin;
        while let Some(message) = inbox.recv().await {
            if framing::write_message(&mut stdin, &message).await.is_err() {
                break;
            }
        }
    });

    outbox
        .send(HostToPluginMessage::PerformAction { input })
        .expect("writer task just started, receiver cannot have dropped yet");

    let had_error_diagnostic = Arc::new(AtomicBool::new(false));

    let stdout_task = tokio::spawn(read_stdout_loop(
        stdout,
        delegate.clone(),
        outbox.clone(),
        had_error_diagnostic.clone(),
    ));
    let stderr_task = tokio::spawn(read_stderr_loop(stderr, delegate.clone()));

    let status = child.wait().await?;

    // Drop our handle so the writer task drains any already-queued replies
    // and then exits once every sender clone (including the request-handler
    // tasks spawned below) has gone away.
    drop(outbox);

    stdout_task.await??;
    stderr_task.await?;
    let _ = writer.await;

    #[cfg(unix)]
    let ended_by_signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    };
    #[cfg(not(unix))]
    let ended_by_signal: Option<i32> = None;

    if ended_by_signal.is_some() {
        return Ok(InvocationOutcome {
            success: false,
            ended_by_signal,
        });
    }

    let success = status.success();
    if !success && !had_error_diagnostic.load(Ordering::SeqCst) {
        delegate.emit_diagnostic(
            DiagnosticSeverity::Error,
            format!(
                "plugin exited with status {} without reporting an error",
                status.code().map_or_else(|| "<unknown>".to_string(), |c| c.to_string())
            ),
            None,
            None,
        );
    }

    Ok(InvocationOutcome {
        success,
        ended_by_signal: None,
    })
}

async fn read_stdout_loop(
    mut stdout: tokio::process::ChildStdout,
    delegate: Arc<dyn PluginDelegate>,
    outbox: mpsc::UnboundedSender<HostToPluginMessage>,
    had_error_diagnostic: Arc<AtomicBool>,
) -> Result<(), Error> {
    loop {
        let message: Option<PluginToHostMessage> = framing::read_message(&mut stdout).await?;
        let Some(message) = message else {
            return Ok(());
        };

        match message {
            PluginToHostMessage::EmitDiagnostic {
                severity,
                message,
                file,
                line,
            } => {
                if severity == DiagnosticSeverity::Error {
                    had_error_diagnostic.store(true, Ordering::SeqCst);
                }
                delegate.emit_diagnostic(severity, message, file, line);
            }
            PluginToHostMessage::DefineBuildCommand {
                configuration,
                inputs,
                outputs,
            } => {
                delegate.define_build_command(configuration, inputs, outputs);
            }
            PluginToHostMessage::DefinePrebuildCommand {
                configuration,
                output_directory,
            } => {
                delegate.define_prebuild_command(configuration, output_directory);
            }
            PluginToHostMessage::BuildOperationRequest(request) => {
                let delegate = delegate.clone();
                let outbox = outbox.clone();
                tokio::spawn(async move {
                    let reply = match delegate.handle_build_operation(request).await {
                        Ok(result) => HostToPluginMessage::BuildOperationResponse { result },
                        Err(error) => HostToPluginMessage::ErrorResponse { error },
                    };
                    let _ = outbox.send(reply);
                });
            }
            PluginToHostMessage::TestOperationRequest(request) => {
                let delegate = delegate.clone();
                let outbox = outbox.clone();
                tokio::spawn(async move {
                    let reply = match delegate.handle_test_operation(request).await {
                        Ok(result) => HostToPluginMessage::TestOperationResponse { result },
                        Err(error) => HostToPluginMessage::ErrorResponse { error },
                    };
                    let _ = outbox.send(reply);
                });
            }
            PluginToHostMessage::SymbolGraphRequest(request) => {
                let delegate = delegate.clone();
                let outbox = outbox.clone();
                tokio::spawn(async move {
                    let reply = match delegate.handle_symbol_graph(request).await {
                        Ok(result) => HostToPluginMessage::SymbolGraphResponse { result },
                        Err(error) => HostToPluginMessage::ErrorResponse { error },
                    };
                    let _ = outbox.send(reply);
                });
            }
        }
    }
}

/// Forward every chunk of the plugin's free-form stderr stream to the
/// delegate as it arrives (spec.md §4.4.2 step 4). Unlike stdout, this
/// stream carries no structure — it's read as raw bytes, not framed
/// messages.
async fn read_stderr_loop(mut stderr: tokio::process::ChildStderr, delegate: Arc<dyn PluginDelegate>) {
    let mut buffer = [0u8; 4096];
    loop {
        match stderr.read(&mut buffer).await {
            Ok(0) => return,
            Ok(n) => delegate.plugin_emitted_output(&buffer[..n]),
            Err(_) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingDelegate {
        diagnostics: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl PluginDelegate for RecordingDelegate {
        fn emit_diagnostic(&self, _severity: DiagnosticSeverity, message: String, _file: Option<std::path::PathBuf>, _line: Option<u32>) {
            self.diagnostics.lock().unwrap().push(message);
        }
    }

    /// A compiled "plugin" in this test is just `/bin/cat`: it echoes the
    /// framed `performAction` message straight back as a `PluginToHostMessage`
    /// would be read, though `cat` isn't a real plugin protocol speaker —
    /// this test only exercises spawn + stdin/stdout plumbing, not the full
    /// message loop, which is covered by the framing round-trip tests.
    #[tokio::test]
    async fn invoke_reports_nonzero_exit_without_diagnostic_as_synthesized_error() {
        let dir = tempfile::tempdir().unwrap();
        let delegate = Arc::new(RecordingDelegate::default());
        let sandbox = SandboxPolicy::new(dir.path()).disabled();

        let outcome = invoke(
            Path::new("/bin/false"),
            &sandbox,
            dir.path(),
            serde_json::json!({}),
            delegate.clone(),
        )
        .await
        .unwrap();

        assert!(!outcome.success);
        assert!(delegate
            .diagnostics
            .lock()
            .unwrap()
            .iter()
            .any(|d| d.contains("without reporting an error")));
    }

    #[tokio::test]
    async fn invoke_reports_success_for_a_zero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let delegate = Arc::new(RecordingDelegate::default());
        let sandbox = SandboxPolicy::new(dir.path()).disabled();

        let outcome = invoke(
            Path::new("/bin/true"),
            &sandbox,
            dir.path(),
            serde_json::json!({}),
            delegate,
        )
        .await
        .unwrap();

        assert!(outcome.success);
        assert!(outcome.ended_by_signal.is_none());
    }
}

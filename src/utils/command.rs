//! Utilities for running external processes with cancellation and
//! captured stderr

use std::process::{ExitStatus, Stdio};
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Captured stderr is truncated to this many trailing bytes
const STDERR_LIMIT: usize = 16 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} failed ({status}): {stderr}")]
    Failed {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{program} was cancelled")]
    Cancelled { program: String },

    #[error("I/O error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProcessError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProcessError::Cancelled { .. })
    }
}

/// A spawned child whose stderr is collected in the background
pub struct CapturedChild {
    program: String,
    child: Child,
    stderr: Option<JoinHandle<String>>,
}

impl CapturedChild {
    /// Spawn `cmd` with stderr captured and the child killed if dropped.
    ///
    /// The caller configures stdin/stdout before spawning.
    pub fn spawn(cmd: &mut Command, program: &str) -> Result<Self, ProcessError> {
        cmd.stderr(Stdio::piped()).kill_on_drop(true);
        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            program: program.to_string(),
            source,
        })?;
        let stderr = child.stderr.take().map(|s| tokio::spawn(collect_stderr(s)));
        debug!("Started {} (pid {:?})", program, child.id());

        Ok(Self {
            program: program.to_string(),
            child,
            stderr,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Mutable access to the child, for taking its stdin/stdout
    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Wait for exit, or kill the child when `token` is cancelled
    pub async fn wait(mut self, token: &CancellationToken) -> Result<(), ProcessError> {
        let status = tokio::select! {
            status = self.child.wait() => status.map_err(|source| ProcessError::Io {
                program: self.program.clone(),
                source,
            })?,
            _ = token.cancelled() => {
                debug!("Killing {} after cancellation", self.program);
                let _ = self.child.kill().await;
                if let Some(handle) = self.stderr.take() {
                    handle.abort();
                }
                return Err(ProcessError::Cancelled { program: self.program.clone() });
            }
        };

        if status.success() {
            return Ok(());
        }

        let stderr = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        Err(ProcessError::Failed {
            program: self.program.clone(),
            status,
            stderr,
        })
    }
}

impl Drop for CapturedChild {
    fn drop(&mut self) {
        if let Some(handle) = self.stderr.take() {
            handle.abort();
        }
    }
}

async fn collect_stderr(mut stderr: ChildStderr) -> String {
    let mut buf = Vec::new();
    if let Err(e) = stderr.read_to_end(&mut buf).await {
        debug!("Failed to read stderr: {}", e);
    }
    let start = buf.len().saturating_sub(STDERR_LIMIT);
    String::from_utf8_lossy(&buf[start..]).trim().to_string()
}

/// Run a command to completion and return its stdout
pub async fn run_output(
    mut cmd: Command,
    program: &str,
    token: &CancellationToken,
) -> Result<String, ProcessError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Running command: {}", program);

    let output = tokio::select! {
        output = cmd.output() => output.map_err(|source| ProcessError::Spawn {
            program: program.to_string(),
            source,
        })?,
        _ = token.cancelled() => {
            return Err(ProcessError::Cancelled { program: program.to_string() });
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(ProcessError::Failed {
            program: program.to_string(),
            status: output.status,
            stderr,
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Run a command to completion, discarding stdout
pub async fn run(cmd: Command, program: &str, token: &CancellationToken) -> Result<(), ProcessError> {
    run_output(cmd, program, token).await.map(|_| ())
}

/// Run `command` through `sh -c` with extra environment variables
///
/// stdout and stderr are inherited so hook output lands next to the
/// process logs.
pub async fn run_shell_command(
    command: &str,
    env: &[(&str, &str)],
    token: &CancellationToken,
) -> Result<(), ProcessError> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);
    for (key, value) in env {
        cmd.env(key, value);
    }

    let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
        program: "sh".to_string(),
        source,
    })?;

    let status = tokio::select! {
        status = child.wait() => status.map_err(|source| ProcessError::Io {
            program: "sh".to_string(),
            source,
        })?,
        _ = token.cancelled() => {
            let _ = child.kill().await;
            return Err(ProcessError::Cancelled { program: "sh".to_string() });
        }
    };

    if !status.success() {
        return Err(ProcessError::Failed {
            program: "sh".to_string(),
            status,
            stderr: String::new(),
        });
    }
    Ok(())
}

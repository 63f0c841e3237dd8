//! rclone command wrapper
//!
//! Every invocation carries `--config <file>` (when set) and the
//! RCLONE_EXTRA_ARGS flags.

use super::command::{self, ProcessError};
use crate::config::RcloneSettings;
use crate::engines::shell_split;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("rclone {operation} failed: {source}")]
    Command {
        operation: &'static str,
        #[source]
        source: ProcessError,
    },

    #[error("failed to parse rclone {operation} output: {source}")]
    Parse {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl RemoteError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RemoteError::Command { source, .. } if source.is_cancelled())
    }
}

/// A single item returned by `rclone lsjson`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteEntry {
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Size", default)]
    pub size: i64,
    #[serde(rename = "ModTime")]
    pub mod_time: DateTime<Utc>,
    #[serde(rename = "IsDir", default)]
    pub is_dir: bool,
}

#[derive(Debug, Deserialize)]
struct SizeOutput {
    bytes: i64,
}

#[derive(Debug, Clone)]
pub struct Rclone {
    binary: String,
    remote: String,
    config_file: Option<PathBuf>,
    extra_args: Vec<String>,
}

impl Rclone {
    pub fn from_settings(settings: &RcloneSettings) -> Self {
        Self {
            binary: settings.binary.clone(),
            remote: settings.remote.clone(),
            config_file: settings.config_file.clone(),
            extra_args: shell_split(&settings.extra_args),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Join a file or directory name onto the configured remote
    pub fn remote_path(&self, name: &str) -> String {
        format!("{}/{}", self.remote.trim_end_matches('/'), name)
    }

    /// `rclone <subcommand> <args..> --config <file> <extra..>`
    fn command<I, S>(&self, subcommand: &str, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = Command::new(&self.binary);
        cmd.arg(subcommand).args(args);
        if let Some(config) = &self.config_file {
            cmd.arg("--config").arg(config);
        }
        cmd.args(&self.extra_args);
        cmd
    }

    /// `rclone rcat <path>` reading the upload from stdin
    pub fn rcat_command(&self, remote_path: &str) -> Command {
        let mut cmd = self.command("rcat", [remote_path]);
        cmd.stdin(Stdio::piped()).stdout(Stdio::null());
        cmd
    }

    /// Upload a local directory to `remote_path`
    pub async fn copy(
        &self,
        local: &Path,
        remote_path: &str,
        token: &CancellationToken,
    ) -> Result<(), RemoteError> {
        let cmd = self.command("copy", [local.as_os_str(), remote_path.as_ref()]);
        command::run(cmd, "rclone copy", token)
            .await
            .map_err(|source| RemoteError::Command {
                operation: "copy",
                source,
            })
    }

    /// Size in bytes of a remote object, via `rclone size --json`
    pub async fn size(&self, remote_path: &str, token: &CancellationToken) -> Result<u64, RemoteError> {
        let cmd = self.command("size", [remote_path, "--json"]);
        let output = command::run_output(cmd, "rclone size", token)
            .await
            .map_err(|source| RemoteError::Command {
                operation: "size",
                source,
            })?;
        let parsed: SizeOutput = serde_json::from_str(output.trim()).map_err(|source| RemoteError::Parse {
            operation: "size",
            source,
        })?;
        Ok(parsed.bytes.max(0) as u64)
    }

    /// Best-effort size lookup; any failure yields 0
    pub async fn size_or_zero(&self, remote_path: &str, token: &CancellationToken) -> u64 {
        match self.size(remote_path, token).await {
            Ok(size) => size,
            Err(e) => {
                debug!("Could not determine size of {}: {}", remote_path, e);
                0
            }
        }
    }

    /// List the top level of the configured remote
    pub async fn lsjson(&self, token: &CancellationToken) -> Result<Vec<RemoteEntry>, RemoteError> {
        let cmd = self.command("lsjson", [self.remote.as_str()]);
        let output = command::run_output(cmd, "rclone lsjson", token)
            .await
            .map_err(|source| RemoteError::Command {
                operation: "lsjson",
                source,
            })?;
        parse_lsjson(&output)
    }

    pub async fn delete_file(&self, remote_path: &str, token: &CancellationToken) -> Result<(), RemoteError> {
        let cmd = self.command("deletefile", [remote_path]);
        command::run(cmd, "rclone deletefile", token)
            .await
            .map_err(|source| RemoteError::Command {
                operation: "deletefile",
                source,
            })
    }

    pub async fn purge(&self, remote_path: &str, token: &CancellationToken) -> Result<(), RemoteError> {
        let cmd = self.command("purge", [remote_path]);
        command::run(cmd, "rclone purge", token)
            .await
            .map_err(|source| RemoteError::Command {
                operation: "purge",
                source,
            })
    }
}

/// Parse `rclone lsjson` output; empty output is an empty listing
pub fn parse_lsjson(output: &str) -> Result<Vec<RemoteEntry>, RemoteError> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).map_err(|source| RemoteError::Parse {
        operation: "lsjson",
        source,
    })
}

//! Pre- and post-backup shell hooks

use crate::utils::command::{run_shell_command, ProcessError};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, thiserror::Error)]
#[error("hook command {command:?} failed: {source}")]
pub struct HookError {
    pub command: String,
    #[source]
    pub source: ProcessError,
}

/// Runs user hook commands around a backup. Empty commands succeed
/// without running anything.
#[async_trait]
pub trait HookRunner: Send + Sync {
    async fn run_pre(&self, token: &CancellationToken, command: &str) -> Result<(), HookError>;

    /// `status` and `remote_path` are exported as DBSTASH_STATUS and
    /// DBSTASH_FILE
    async fn run_post(
        &self,
        token: &CancellationToken,
        command: &str,
        status: &str,
        remote_path: &str,
    ) -> Result<(), HookError>;
}

/// Runs hooks through `sh -c`
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellHooks;

impl ShellHooks {
    async fn run(token: &CancellationToken, command: &str, env: &[(&str, &str)]) -> Result<(), HookError> {
        run_shell_command(command, env, token)
            .await
            .map_err(|source| HookError {
                command: command.to_string(),
                source,
            })
    }
}

#[async_trait]
impl HookRunner for ShellHooks {
    async fn run_pre(&self, token: &CancellationToken, command: &str) -> Result<(), HookError> {
        if command.trim().is_empty() {
            return Ok(());
        }
        info!("Running pre-backup hook: {}", command);
        Self::run(token, command, &[]).await
    }

    async fn run_post(
        &self,
        token: &CancellationToken,
        command: &str,
        status: &str,
        remote_path: &str,
    ) -> Result<(), HookError> {
        if command.trim().is_empty() {
            return Ok(());
        }
        info!("Running post-backup hook ({}): {}", status, command);
        let env = [("DBSTASH_STATUS", status), ("DBSTASH_FILE", remote_path)];
        Self::run(token, command, &env).await
    }
}

/// Mock implementation for testing
#[allow(dead_code)]
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Recorded hook invocation
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum HookCall {
        Pre(String),
        Post {
            command: String,
            status: String,
            remote_path: String,
        },
    }

    #[derive(Clone, Default)]
    pub struct MockHooks {
        pub calls: Arc<Mutex<Vec<HookCall>>>,
        fail_pre: Arc<Mutex<bool>>,
        fail_post: Arc<Mutex<bool>>,
    }

    impl MockHooks {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_pre(self) -> Self {
            *self.fail_pre.lock().unwrap() = true;
            self
        }

        pub fn failing_post(self) -> Self {
            *self.fail_post.lock().unwrap() = true;
            self
        }

        pub fn get_calls(&self) -> Vec<HookCall> {
            self.calls.lock().unwrap().clone()
        }

        fn failure(command: &str) -> HookError {
            HookError {
                command: command.to_string(),
                source: ProcessError::Io {
                    program: "sh".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, "mock hook failure"),
                },
            }
        }
    }

    #[async_trait]
    impl HookRunner for MockHooks {
        async fn run_pre(&self, _token: &CancellationToken, command: &str) -> Result<(), HookError> {
            self.calls.lock().unwrap().push(HookCall::Pre(command.to_string()));
            if *self.fail_pre.lock().unwrap() {
                return Err(Self::failure(command));
            }
            Ok(())
        }

        async fn run_post(
            &self,
            _token: &CancellationToken,
            command: &str,
            status: &str,
            remote_path: &str,
        ) -> Result<(), HookError> {
            self.calls.lock().unwrap().push(HookCall::Post {
                command: command.to_string(),
                status: status.to_string(),
                remote_path: remote_path.to_string(),
            });
            if *self.fail_post.lock().unwrap() {
                return Err(Self::failure(command));
            }
            Ok(())
        }
    }
}

//! Backup pipelines connecting a dump tool to an rclone upload
//!
//! - `stream`: dump stdout is piped straight into `rclone rcat`
//! - `directory`: dump into a temp directory, then `rclone copy`
//! - `tar`: dump into a temp directory, then a tar stream into `rclone rcat`
//!
//! Local staging directories are removed when the pipeline returns,
//! whatever the outcome.

pub mod directory;
pub mod naming;
pub mod stream;
pub mod tar;

use crate::config::{BackupMode, Settings};
use crate::engines::{Engine, EngineError};
use crate::utils::command::{CapturedChild, ProcessError};
use crate::utils::rclone::{Rclone, RemoteError};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("building dump command: {0}")]
    Engine(#[from] EngineError),

    #[error("creating temp dir under {path:?}: {source}")]
    TempDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("dump failed: {0}")]
    Dump(#[source] ProcessError),

    #[error("upload failed: {0}")]
    Upload(#[source] RemoteError),

    #[error("archiving dump directory failed: {0}")]
    Archive(#[source] io::Error),

    #[error("relaying dump output failed: {0}")]
    Relay(#[source] io::Error),

    #[error("backup cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }

    fn dump(err: ProcessError) -> Self {
        if err.is_cancelled() {
            PipelineError::Cancelled
        } else {
            PipelineError::Dump(err)
        }
    }

    fn upload(operation: &'static str, err: ProcessError) -> Self {
        if err.is_cancelled() {
            PipelineError::Cancelled
        } else {
            PipelineError::Upload(RemoteError::Command {
                operation,
                source: err,
            })
        }
    }

    fn remote(err: RemoteError) -> Self {
        if err.is_cancelled() {
            PipelineError::Cancelled
        } else {
            PipelineError::Upload(err)
        }
    }
}

/// Where a backup ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub remote_path: String,
    /// Uploaded size in bytes, 0 when unknown
    pub size: u64,
}

/// A strategy moving one dump to the remote
#[async_trait]
pub trait BackupPipeline: Send + Sync {
    async fn execute(
        &self,
        token: &CancellationToken,
        engine: &Engine,
        settings: &Settings,
    ) -> Result<Upload, PipelineError>;

    /// Get pipeline name (for logging)
    fn name(&self) -> &'static str;
}

/// The configured transfer strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    Stream,
    Directory,
    Tar,
}

impl Pipeline {
    pub fn from_mode(mode: BackupMode) -> Self {
        match mode {
            BackupMode::Stream => Pipeline::Stream,
            BackupMode::Directory => Pipeline::Directory,
            BackupMode::Tar => Pipeline::Tar,
        }
    }
}

#[async_trait]
impl BackupPipeline for Pipeline {
    async fn execute(
        &self,
        token: &CancellationToken,
        engine: &Engine,
        settings: &Settings,
    ) -> Result<Upload, PipelineError> {
        match self {
            Pipeline::Stream => stream::execute(token, engine, settings).await,
            Pipeline::Directory => directory::execute(token, engine, settings).await,
            Pipeline::Tar => tar::execute(token, engine, settings).await,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Pipeline::Stream => "stream",
            Pipeline::Directory => "directory",
            Pipeline::Tar => "tar",
        }
    }
}

/// Create a fresh temp dir under `root`, creating `root` first if missing.
///
/// The directory is deleted when the returned guard is dropped.
pub(crate) fn staging_dir(root: &Path, prefix: &str) -> Result<tempfile::TempDir, PipelineError> {
    let temp_dir_err = |source| PipelineError::TempDir {
        path: root.to_path_buf(),
        source,
    };
    std::fs::create_dir_all(root).map_err(temp_dir_err)?;
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(root)
        .map_err(temp_dir_err)
}

/// Spawn `rclone rcat <remote_path>` with its stdin piped
pub(crate) fn spawn_rcat(
    rclone: &Rclone,
    remote_path: &str,
) -> Result<(CapturedChild, tokio::process::ChildStdin), PipelineError> {
    let mut cmd = rclone.rcat_command(remote_path);
    let mut rcat = CapturedChild::spawn(&mut cmd, "rclone rcat")
        .map_err(|e| PipelineError::upload("rcat", e))?;
    let stdin = rcat.child_mut().stdin.take().ok_or_else(|| {
        PipelineError::Relay(io::Error::new(io::ErrorKind::BrokenPipe, "rclone stdin unavailable"))
    })?;
    Ok((rcat, stdin))
}

/// Wait for a producer task feeding rclone, aborting it on cancellation
pub(crate) async fn join_producer<T>(
    mut handle: JoinHandle<io::Result<T>>,
    token: &CancellationToken,
) -> io::Result<T> {
    tokio::select! {
        joined = &mut handle => match joined {
            Ok(result) => result,
            Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
        },
        _ = token.cancelled() => {
            handle.abort();
            Err(io::Error::new(io::ErrorKind::Interrupted, "cancelled"))
        }
    }
}

/// True when a producer died from a closed pipe rather than its own fault
pub(crate) fn killed_by_signal(err: &ProcessError) -> bool {
    matches!(err, ProcessError::Failed { status, .. } if status.code().is_none())
}

/// Best-effort removal of a partial upload after a failed transfer
pub(crate) async fn cleanup_partial(settings: &Settings, rclone: &Rclone, remote_path: &str) {
    if !settings.cleanup_partial {
        return;
    }
    // The run token may already be cancelled; cleanup gets its own
    let token = CancellationToken::new();
    match rclone.delete_file(remote_path, &token).await {
        Ok(()) => debug!("Cleaned up partial upload {}", remote_path),
        Err(e) => warn!("Failed to clean up partial upload {}: {}", remote_path, e),
    }
}

/// Mock implementation for testing
#[allow(dead_code)]
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Outcome returned by [`MockPipeline`]
    #[derive(Clone, Debug)]
    pub enum MockOutcome {
        Success { remote_path: String, size: u64 },
        Failure(String),
    }

    #[derive(Clone)]
    pub struct MockPipeline {
        outcome: Arc<Mutex<MockOutcome>>,
        delay: Arc<Mutex<Option<Duration>>>,
        /// Engine names of recorded invocations
        pub calls: Arc<Mutex<Vec<String>>>,
    }

    impl Default for MockPipeline {
        fn default() -> Self {
            Self {
                outcome: Arc::new(Mutex::new(MockOutcome::Success {
                    remote_path: "remote:backup.sql".to_string(),
                    size: 1024,
                })),
                delay: Arc::new(Mutex::new(None)),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl MockPipeline {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn succeeding(remote_path: &str, size: u64) -> Self {
            let pipeline = Self::default();
            *pipeline.outcome.lock().unwrap() = MockOutcome::Success {
                remote_path: remote_path.to_string(),
                size,
            };
            pipeline
        }

        pub fn failing(message: &str) -> Self {
            let pipeline = Self::default();
            *pipeline.outcome.lock().unwrap() = MockOutcome::Failure(message.to_string());
            pipeline
        }

        /// Sleep this long (or until cancelled) before returning
        pub fn with_delay(self, delay: Duration) -> Self {
            *self.delay.lock().unwrap() = Some(delay);
            self
        }

        pub fn was_called(&self) -> bool {
            !self.calls.lock().unwrap().is_empty()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl BackupPipeline for MockPipeline {
        async fn execute(
            &self,
            token: &CancellationToken,
            engine: &Engine,
            _settings: &Settings,
        ) -> Result<Upload, PipelineError> {
            self.calls.lock().unwrap().push(engine.name().to_string());

            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = token.cancelled() => return Err(PipelineError::Cancelled),
                }
            }

            let outcome = self.outcome.lock().unwrap().clone();
            match outcome {
                MockOutcome::Success { remote_path, size } => Ok(Upload { remote_path, size }),
                MockOutcome::Failure(message) => Err(PipelineError::Dump(ProcessError::Io {
                    program: engine.name().to_string(),
                    source: io::Error::new(io::ErrorKind::Other, message),
                })),
            }
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }
}

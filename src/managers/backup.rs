//! Backup manager - orchestrates a single backup run
//!
//! A run goes pre-hook → pipeline → retention (on success) → post-hook →
//! health → notification. Only a failed pre-hook or a failed pipeline makes
//! the run fail; everything after the pipeline is housekeeping.

use crate::config::Settings;
use crate::engines::Engine;
use crate::managers::health::HealthSink;
use crate::managers::hooks::{HookError, HookRunner, ShellHooks};
use crate::managers::notification::{Notifier, WebhookNotifier};
use crate::managers::retention;
use crate::pipeline::{BackupPipeline, Pipeline, PipelineError, Upload};
use crate::utils::rclone::Rclone;
use crate::utils::remote_ops::RemoteStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

/// Outcome of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Failure,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Failure => "failure",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one run, handed to health and notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub status: RunStatus,
    pub engine: String,
    pub database: String,
    pub remote_path: String,
    /// Uploaded bytes, 0 when unknown
    pub file_size: u64,
    pub duration: Duration,
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("pre-backup hook failed: {0}")]
    PreHook(#[source] HookError),

    #[error("backup failed: {0}")]
    Pipeline(#[source] PipelineError),
}

/// The pluggable pieces a run talks to
#[derive(Clone)]
pub struct Collaborators {
    pub pipeline: Arc<dyn BackupPipeline>,
    pub hooks: Arc<dyn HookRunner>,
    pub notifier: Arc<dyn Notifier>,
    pub remote: Arc<dyn RemoteStore>,
}

impl Collaborators {
    /// Real implementations for the configured settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            pipeline: Arc::new(Pipeline::from_mode(settings.mode)),
            hooks: Arc::new(ShellHooks),
            notifier: Arc::new(WebhookNotifier::new(settings.notify.clone())),
            remote: Arc::new(Rclone::from_settings(&settings.rclone)),
        }
    }
}

/// Short random id correlating the log lines of one run
fn run_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Cancels the run token when the timeout elapses; the timer stops on drop
struct DeadlineGuard(Option<JoinHandle<()>>);

impl DeadlineGuard {
    fn arm(token: &CancellationToken, timeout: Option<Duration>) -> Self {
        let handle = timeout.map(|timeout| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                warn!("Backup exceeded timeout of {}, cancelling", humantime::format_duration(timeout));
                token.cancel();
            })
        });
        Self(handle)
    }
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            handle.abort();
        }
    }
}

pub struct BackupManager {
    settings: Arc<Settings>,
    engine: Engine,
    collaborators: Collaborators,
}

impl BackupManager {
    pub fn new(settings: Arc<Settings>, engine: Engine) -> Self {
        let collaborators = Collaborators::from_settings(&settings);
        Self::with_collaborators(settings, engine, collaborators)
    }

    /// Create a backup manager with specific collaborators
    pub fn with_collaborators(settings: Arc<Settings>, engine: Engine, collaborators: Collaborators) -> Self {
        Self {
            settings,
            engine,
            collaborators,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn engine(&self) -> Engine {
        self.engine
    }

    /// Run one backup under `parent`
    ///
    /// The run gets a child token, cancelled by `parent` or by the configured
    /// timeout. Returns the pre-hook or pipeline error, if any.
    pub async fn run_once(
        &self,
        parent: &CancellationToken,
        health: Option<&dyn HealthSink>,
    ) -> Result<(), RunError> {
        let run_id = run_id();
        let database = self.settings.db_name_or_default();
        let span = info_span!(
            "backup",
            backup_id = %run_id,
            engine = %self.engine,
            database = %database,
        );

        self.run_in_span(parent, health, database).instrument(span).await
    }

    async fn run_in_span(
        &self,
        parent: &CancellationToken,
        health: Option<&dyn HealthSink>,
        database: String,
    ) -> Result<(), RunError> {
        let token = parent.child_token();
        let _deadline = DeadlineGuard::arm(&token, self.settings.timeout);
        let started = Instant::now();

        info!(
            "Starting backup ({} pipeline)",
            self.collaborators.pipeline.name()
        );

        let outcome = self.backup(&token).await;

        let (status, upload, error) = match &outcome {
            Ok(upload) => (RunStatus::Success, Some(upload.clone()), None),
            Err(e) => (RunStatus::Failure, None, Some(e.to_string())),
        };
        let remote_path = upload.as_ref().map(|u| u.remote_path.clone()).unwrap_or_default();

        if let Err(e) = self
            .collaborators
            .hooks
            .run_post(&token, &self.settings.hooks.post_backup, status.as_str(), &remote_path)
            .await
        {
            warn!("Post-backup hook failed: {}", e);
        }

        if let Some(health) = health {
            health.update(status);
        }

        let result = RunResult {
            status,
            engine: self.engine.name().to_string(),
            database,
            remote_path,
            file_size: upload.as_ref().map(|u| u.size).unwrap_or(0),
            duration: started.elapsed(),
            error,
        };
        // A timed-out run still reports its failure
        self.collaborators.notifier.send(parent, &result).await;

        match &outcome {
            Ok(_) => info!(
                status = result.status.as_str(),
                remote_path = %result.remote_path,
                size = result.file_size,
                duration_ms = result.duration.as_millis() as u64,
                "Backup completed"
            ),
            Err(e) => error!(
                status = result.status.as_str(),
                duration_ms = result.duration.as_millis() as u64,
                "Backup failed: {}",
                e
            ),
        }

        outcome.map(|_| ())
    }

    /// Pre-hook, pipeline and retention
    async fn backup(&self, token: &CancellationToken) -> Result<Upload, RunError> {
        self.collaborators
            .hooks
            .run_pre(token, &self.settings.hooks.pre_backup)
            .await
            .map_err(RunError::PreHook)?;

        let upload = self
            .collaborators
            .pipeline
            .execute(token, &self.engine, &self.settings)
            .await
            .map_err(RunError::Pipeline)?;

        info!("Uploaded {} ({} bytes)", upload.remote_path, upload.size);

        match retention::apply(self.collaborators.remote.as_ref(), self.settings.retention, token).await {
            Ok(0) => {}
            Ok(deleted) => info!("Retention removed {} old backup(s)", deleted),
            Err(e) => warn!("Retention cleanup failed: {}", e),
        }

        Ok(upload)
    }
}

//! Cron scheduler driving backup runs
//!
//! Each firing spawns a run on a [`TaskTracker`]. With the run lock enabled a
//! firing that arrives while a run is in flight is skipped, never queued.

use crate::managers::backup::BackupManager;
use crate::managers::health::HealthSink;
use crate::utils::cron::{next_occurrence, parse_cron};
use crate::utils::locker::RunGuard;
use chrono::Utc;
use croner::errors::CronError;
use croner::Cron;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid schedule {expression:?}: {source}")]
    InvalidExpression {
        expression: String,
        #[source]
        source: CronError,
    },

    #[error("scheduler already started")]
    AlreadyStarted,

    #[error("scheduler is stopped")]
    Stopped,
}

struct Inner {
    manager: Arc<BackupManager>,
    health: Option<Arc<dyn HealthSink>>,
    guard: Arc<RunGuard>,
    /// Handed to every run; cancelled only on process shutdown
    run_token: CancellationToken,
    /// Stops accepting firings
    stop_token: CancellationToken,
    tracker: TaskTracker,
}

impl Inner {
    fn fire(self: &Arc<Self>) -> bool {
        if self.stop_token.is_cancelled() {
            debug!("Scheduler stopped, ignoring firing");
            return false;
        }

        let permit = if self.manager.settings().lock {
            match self.guard.try_acquire() {
                Some(permit) => Some(permit),
                None => {
                    warn!("Previous backup still running, skipping this run");
                    return false;
                }
            }
        } else {
            None
        };

        let inner = Arc::clone(self);
        self.tracker.spawn(async move {
            let _permit = permit;
            // The result is already logged and reported by the run itself
            let _ = inner
                .manager
                .run_once(&inner.run_token, inner.health.as_deref())
                .await;
        });
        true
    }

    async fn run_loop(self: Arc<Self>, cron: Cron) {
        let tz = self.manager.settings().timezone;
        let mut after = Utc::now();

        loop {
            let next = match next_occurrence(&cron, tz, after) {
                Ok(next) => next,
                Err(e) => {
                    warn!("No further schedule occurrence: {}", e);
                    return;
                }
            };
            debug!("Next backup at {}", next.with_timezone(&tz));

            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.stop_token.cancelled() => return,
            }

            self.fire();
            after = std::cmp::max(next, Utc::now());
        }
    }
}

pub struct Scheduler {
    inner: Arc<Inner>,
    started: Mutex<bool>,
}

impl Scheduler {
    /// `token` is the process lifetime token passed down to every run.
    pub fn new(
        manager: Arc<BackupManager>,
        health: Option<Arc<dyn HealthSink>>,
        token: CancellationToken,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                manager,
                health,
                guard: RunGuard::new(),
                run_token: token,
                stop_token: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
            started: Mutex::new(false),
        }
    }

    /// Parse `expression` and begin firing on it
    pub fn start(&self, expression: &str) -> Result<(), SchedulerError> {
        if self.inner.stop_token.is_cancelled() {
            return Err(SchedulerError::Stopped);
        }
        let cron = parse_cron(expression).map_err(|source| SchedulerError::InvalidExpression {
            expression: expression.to_string(),
            source,
        })?;

        let mut started = self.started.lock();
        if *started {
            return Err(SchedulerError::AlreadyStarted);
        }
        *started = true;

        info!(
            "Scheduler started with schedule {:?} ({})",
            expression,
            self.inner.manager.settings().timezone
        );
        let inner = Arc::clone(&self.inner);
        self.inner.tracker.spawn(inner.run_loop(cron));
        Ok(())
    }

    /// Trigger a run now. Returns false when the run was skipped because
    /// another one is in flight or the scheduler is stopped.
    pub fn fire(&self) -> bool {
        self.inner.fire()
    }

    pub fn is_running(&self) -> bool {
        self.inner.guard.is_running()
    }

    /// Stop firing and wait up to `timeout` for in-flight runs.
    ///
    /// Returns true when every run finished in time. Runs still going at the
    /// timeout are left alone.
    pub async fn stop(&self, timeout: Duration) -> bool {
        self.inner.stop_token.cancel();
        self.inner.tracker.close();

        match tokio::time::timeout(timeout, self.inner.tracker.wait()).await {
            Ok(()) => {
                info!("Scheduler stopped");
                true
            }
            Err(_) => {
                warn!(
                    "Timed out after {} waiting for running backup",
                    humantime::format_duration(timeout)
                );
                false
            }
        }
    }
}

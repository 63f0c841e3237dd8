//! Health check endpoint
//!
//! `GET /healthz` reports the engine and the outcome of the most recent run.

use crate::managers::backup::RunStatus;
use anyhow::{Context, Result};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Receives the status of each finished run
pub trait HealthSink: Send + Sync {
    fn update(&self, status: RunStatus);
}

/// Response body of `/healthz`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub engine: String,
    /// RFC 3339 time of the last run, empty before the first one
    pub last_backup: String,
    pub last_status: String,
}

#[derive(Debug)]
struct LastRun {
    at: Option<DateTime<Utc>>,
    status: String,
}

/// Last backup time and status; last writer wins
#[derive(Debug)]
pub struct HealthTracker {
    engine: String,
    last: RwLock<LastRun>,
}

impl HealthTracker {
    pub fn new(engine: &str) -> Self {
        Self {
            engine: engine.to_string(),
            last: RwLock::new(LastRun {
                at: None,
                status: "pending".to_string(),
            }),
        }
    }

    pub fn status(&self) -> HealthStatus {
        let last = self.last.read();
        HealthStatus {
            status: "healthy".to_string(),
            engine: self.engine.clone(),
            last_backup: last
                .at
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default(),
            last_status: last.status.clone(),
        }
    }
}

impl HealthSink for HealthTracker {
    fn update(&self, status: RunStatus) {
        let mut last = self.last.write();
        last.at = Some(Utc::now());
        last.status = status.as_str().to_string();
    }
}

async fn healthz(State(tracker): State<Arc<HealthTracker>>) -> Json<HealthStatus> {
    Json(tracker.status())
}

pub fn router(tracker: Arc<HealthTracker>) -> Router {
    Router::new().route("/healthz", get(healthz)).with_state(tracker)
}

/// Bind `addr` and serve until `shutdown` is cancelled
pub async fn serve(
    addr: &str,
    tracker: Arc<HealthTracker>,
    shutdown: CancellationToken,
) -> Result<JoinHandle<()>> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind health server to {}", addr))?;
    let local = listener.local_addr().context("Failed to read health server address")?;
    info!("Health check server started on {}", local);

    let app = router(tracker);
    Ok(tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            error!("Health server error: {}", e);
        }
    }))
}

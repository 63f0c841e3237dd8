//! Scheduler driving real pipelines

use dbstash::managers::backup::BackupManager;
use dbstash::managers::health::{HealthSink, HealthTracker};
use dbstash::managers::scheduler::{Scheduler, SchedulerError};
use std::sync::Arc;
use std::time::Duration;
use test_utils::*;
use tokio_util::sync::CancellationToken;

fn scheduler_for(settings: Settings) -> (Scheduler, Arc<HealthTracker>) {
    let settings = Arc::new(settings);
    let engine = Engine::from_kind(settings.engine);
    let manager = Arc::new(BackupManager::new(settings, engine));
    let health = Arc::new(HealthTracker::new(engine.name()));
    let sink: Arc<dyn HealthSink> = health.clone();
    (Scheduler::new(manager, Some(sink), CancellationToken::new()), health)
}

#[tokio::test]
async fn test_fired_run_uploads_and_updates_health() {
    let ctx = TestContext::new();
    let settings = SettingsBuilder::for_context(&ctx)
        .template("{db}")
        .dump_script(&ctx, &stream_dump_body("scheduled"))
        .build();
    let (scheduler, health) = scheduler_for(settings);

    assert!(scheduler.fire());
    assert!(scheduler.stop(Duration::from_secs(10)).await);

    assert_eq!(health.status().last_status, "success");
    assert!(ctx.remote_file("fake:backups/app.sql").exists());
}

#[tokio::test]
async fn test_overlapping_fire_skipped_while_dump_runs() {
    let ctx = TestContext::new();
    let settings = SettingsBuilder::for_context(&ctx)
        .dump_script(&ctx, "sleep 1\nprintf slow")
        .build();
    let (scheduler, _health) = scheduler_for(settings);

    assert!(scheduler.fire());
    assert!(scheduler.is_running());
    assert!(!scheduler.fire());

    assert!(scheduler.stop(Duration::from_secs(10)).await);
    assert!(!scheduler.is_running());
    let uploads = ctx
        .rclone_calls()
        .iter()
        .filter(|c| c.starts_with("rcat"))
        .count();
    assert_eq!(uploads, 1);
}

#[tokio::test]
async fn test_start_rejects_bad_expression() {
    let ctx = TestContext::new();
    let (scheduler, _health) = scheduler_for(SettingsBuilder::for_context(&ctx).build());

    let err = scheduler.start("61 * * * *").unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidExpression { .. }));
    assert!(err.to_string().contains("61 * * * *"));
}

#[tokio::test]
async fn test_stop_before_any_run() {
    let ctx = TestContext::new();
    let (scheduler, health) = scheduler_for(SettingsBuilder::for_context(&ctx).build());

    scheduler.start("0 2 * * *").assert_ok();
    assert!(scheduler.stop(Duration::from_secs(5)).await);
    assert!(!scheduler.fire());
    assert_eq!(health.status().last_status, "pending");
}

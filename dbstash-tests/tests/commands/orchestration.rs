//! Run orchestration: hooks, pipeline, retention, health and notification

use dbstash::managers::backup::{BackupManager, Collaborators, RunError, RunStatus};
use dbstash::managers::health::{HealthSink, HealthTracker};
use std::sync::Arc;
use std::time::Duration;
use test_utils::*;
use tokio_util::sync::CancellationToken;

struct Spies {
    pipeline: MockPipeline,
    hooks: MockHooks,
    notifier: MockNotifier,
    remote: MockRemote,
}

impl Spies {
    fn new(pipeline: MockPipeline) -> Self {
        Self {
            pipeline,
            hooks: MockHooks::new(),
            notifier: MockNotifier::new(),
            remote: MockRemote::with_entries(daily_entries(3)),
        }
    }

    fn hooks(mut self, hooks: MockHooks) -> Self {
        self.hooks = hooks;
        self
    }

    fn manager(&self, settings: Settings) -> BackupManager {
        let settings = Arc::new(settings);
        let engine = Engine::from_kind(settings.engine);
        BackupManager::with_collaborators(
            settings,
            engine,
            Collaborators {
                pipeline: Arc::new(self.pipeline.clone()),
                hooks: Arc::new(self.hooks.clone()),
                notifier: Arc::new(self.notifier.clone()),
                remote: Arc::new(self.remote.clone()),
            },
        )
    }
}

fn settings() -> SettingsBuilder {
    SettingsBuilder::new()
        .hooks("echo pre", "echo post")
        .retention(1, 0)
}

#[tokio::test]
async fn test_successful_run_reports_everywhere() {
    let spies = Spies::new(MockPipeline::succeeding("remote:app.sql", 2048));
    let manager = spies.manager(settings().build());
    let health = HealthTracker::new("pg");
    let token = CancellationToken::new();

    manager.run_once(&token, Some(&health)).await.assert_ok();

    assert_eq!(
        spies.hooks.get_calls(),
        vec![
            HookCall::Pre("echo pre".to_string()),
            HookCall::Post {
                command: "echo post".to_string(),
                status: "success".to_string(),
                remote_path: "remote:app.sql".to_string(),
            },
        ]
    );

    let sent = spies.notifier.get_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].status, RunStatus::Success);
    assert_eq!(sent[0].engine, "pg");
    assert_eq!(sent[0].database, "app");
    assert_eq!(sent[0].remote_path, "remote:app.sql");
    assert_eq!(sent[0].file_size, 2048);
    assert!(sent[0].error.is_none());

    let status = health.status();
    assert_eq!(status.last_status, "success");
    assert!(!status.last_backup.is_empty());

    // retention keeps one of three listed backups
    assert_eq!(spies.remote.list_calls(), 1);
    assert_eq!(spies.remote.get_deletions().len(), 2);
}

#[tokio::test]
async fn test_pre_hook_failure_skips_pipeline() {
    let spies = Spies::new(MockPipeline::new()).hooks(MockHooks::new().failing_pre());
    let manager = spies.manager(settings().build());
    let health = HealthTracker::new("pg");
    let token = CancellationToken::new();

    let err = manager.run_once(&token, Some(&health)).await.unwrap_err();

    assert!(matches!(err, RunError::PreHook(_)));
    assert!(!spies.pipeline.was_called());
    assert_eq!(spies.remote.list_calls(), 0);
    assert_eq!(health.status().last_status, "failure");

    let sent = spies.notifier.get_sent();
    assert_eq!(sent[0].status, RunStatus::Failure);
    assert!(sent[0].error.as_deref().unwrap().contains("pre-backup hook failed"));
}

#[tokio::test]
async fn test_pipeline_failure_still_runs_post_hook() {
    let spies = Spies::new(MockPipeline::failing("pg_dump: connection refused"));
    let manager = spies.manager(settings().build());
    let token = CancellationToken::new();

    let err = manager.run_once(&token, None).await.unwrap_err();
    assert!(matches!(err, RunError::Pipeline(_)));

    assert_eq!(
        spies.hooks.get_calls().last(),
        Some(&HookCall::Post {
            command: "echo post".to_string(),
            status: "failure".to_string(),
            remote_path: String::new(),
        })
    );

    // no retention after a failed backup
    assert_eq!(spies.remote.list_calls(), 0);

    let sent = spies.notifier.get_sent();
    assert_eq!(sent[0].status, RunStatus::Failure);
    assert_eq!(sent[0].file_size, 0);
    assert!(sent[0].error.as_deref().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_post_hook_failure_does_not_fail_run() {
    let spies = Spies::new(MockPipeline::new()).hooks(MockHooks::new().failing_post());
    let manager = spies.manager(settings().build());
    let token = CancellationToken::new();

    manager.run_once(&token, None).await.assert_ok();
    assert_eq!(spies.notifier.get_sent()[0].status, RunStatus::Success);
}

#[tokio::test]
async fn test_retention_failure_does_not_fail_run() {
    let mut spies = Spies::new(MockPipeline::new());
    spies.remote = MockRemote::new().fail_listing();
    let manager = spies.manager(settings().build());
    let token = CancellationToken::new();

    manager.run_once(&token, None).await.assert_ok();
    assert_eq!(spies.remote.list_calls(), 1);
}

#[tokio::test]
async fn test_timeout_cancels_run_and_still_notifies() {
    let spies = Spies::new(MockPipeline::new().with_delay(Duration::from_secs(30)));
    let manager = spies.manager(settings().timeout(Duration::from_millis(100)).build());
    let health = HealthTracker::new("pg");
    let token = CancellationToken::new();

    let result = tokio::time::timeout(Duration::from_secs(10), manager.run_once(&token, Some(&health)))
        .await
        .expect("run did not honour its timeout");

    match result {
        Err(RunError::Pipeline(e)) => assert!(e.is_cancelled()),
        other => panic!("expected a cancelled pipeline, got {:?}", other),
    }
    assert!(!token.is_cancelled());
    assert_eq!(health.status().last_status, "failure");
    assert_eq!(spies.notifier.get_sent()[0].status, RunStatus::Failure);
}

#[tokio::test]
async fn test_parent_cancellation_reaches_pipeline() {
    let spies = Spies::new(MockPipeline::new().with_delay(Duration::from_secs(30)));
    let manager = spies.manager(settings().build());
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let err = tokio::time::timeout(Duration::from_secs(10), manager.run_once(&token, None))
        .await
        .expect("run ignored cancellation")
        .unwrap_err();
    assert!(matches!(err, RunError::Pipeline(ref e) if e.is_cancelled()));
}

#[tokio::test]
async fn test_real_collaborators_end_to_end() {
    let ctx = TestContext::new();
    let pre_marker = ctx.temp_dir().join("pre-ran");
    let post_marker = ctx.temp_dir().join("post-env");
    let settings = SettingsBuilder::for_context(&ctx)
        .template("{db}")
        .dump_script(&ctx, &stream_dump_body("payload"))
        .hooks(
            &format!("touch '{}'", pre_marker.display()),
            &format!("echo \"$DBSTASH_STATUS $DBSTASH_FILE\" > '{}'", post_marker.display()),
        )
        .retention(5, 0)
        .build();
    let manager = BackupManager::new(Arc::new(settings), Engine::Postgres);
    let health: Arc<dyn HealthSink> = Arc::new(HealthTracker::new("pg"));
    let token = CancellationToken::new();

    manager.run_once(&token, Some(health.as_ref())).await.assert_ok();

    assert!(pre_marker.exists());
    let post_env = std::fs::read_to_string(&post_marker).unwrap();
    assert_eq!(post_env.trim(), "success fake:backups/app.sql");
    assert_eq!(
        std::fs::read_to_string(ctx.remote_file("fake:backups/app.sql")).unwrap(),
        "payload"
    );
    assert!(ctx.rclone_calls().iter().any(|c| c.starts_with("lsjson fake:backups")));
}

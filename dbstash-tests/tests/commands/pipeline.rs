//! Pipeline tests against fake dump tools and a fake rclone

use dbstash::pipeline::{BackupPipeline, Pipeline, PipelineError};
use std::time::{Duration, Instant};
use test_utils::*;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_stream_uploads_dump_output() {
    let ctx = TestContext::new();
    let settings = SettingsBuilder::for_context(&ctx)
        .dump_script(&ctx, &stream_dump_body("CREATE TABLE t;"))
        .template("{engine}-{db}")
        .build();
    let token = CancellationToken::new();

    let upload = Pipeline::Stream
        .execute(&token, &Engine::Postgres, &settings)
        .await
        .assert_ok();

    assert_eq!(upload.remote_path, "fake:backups/pg-app.sql");
    assert_eq!(upload.size, 15);
    let stored = std::fs::read_to_string(ctx.remote_file(&upload.remote_path)).unwrap();
    assert_eq!(stored, "CREATE TABLE t;");
}

#[tokio::test]
async fn test_stream_name_uses_template_date() {
    let ctx = TestContext::new();
    let settings = SettingsBuilder::for_context(&ctx)
        .dump_script(&ctx, &stream_dump_body("x"))
        .build();
    let token = CancellationToken::new();

    let upload = Pipeline::Stream
        .execute(&token, &Engine::Postgres, &settings)
        .await
        .assert_ok();

    let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
    assert!(upload.remote_path.starts_with(&format!("fake:backups/app-{}-", today)));
    assert!(upload.remote_path.ends_with(".sql"));
}

#[tokio::test]
async fn test_directory_mode_copies_tree() {
    let ctx = TestContext::new();
    let settings = SettingsBuilder::for_context(&ctx)
        .mode(BackupMode::Directory)
        .template("{db}")
        .dump_script(&ctx, directory_dump_body())
        .build();
    let token = CancellationToken::new();

    let upload = Pipeline::Directory
        .execute(&token, &Engine::Postgres, &settings)
        .await
        .assert_ok();

    assert_eq!(upload.remote_path, "fake:backups/app/");
    assert_eq!(upload.size, 0);
    let uploaded = ctx.remote_file(&upload.remote_path);
    assert_eq!(std::fs::read_to_string(uploaded.join("toc.dat")).unwrap(), "table data");
    assert!(uploaded.join("blobs/1.dat").exists());
    assert_eq!(ctx.staging_leftovers(&settings.temp_dir), 0);
}

#[tokio::test]
async fn test_tar_mode_streams_archive() {
    let ctx = TestContext::new();
    let settings = SettingsBuilder::for_context(&ctx)
        .engine(EngineKind::Mongo)
        .uri("mongodb://db/orders")
        .no_database()
        .mode(BackupMode::Tar)
        .template("{db}")
        .dump_script(&ctx, directory_dump_body())
        .build();
    let token = CancellationToken::new();

    let upload = Pipeline::Tar
        .execute(&token, &Engine::Mongo, &settings)
        .await
        .assert_ok();

    assert_eq!(upload.remote_path, "fake:backups/orders.tar");
    assert!(upload.size > 0);
    let archive = std::fs::read(ctx.remote_file(&upload.remote_path)).unwrap();
    let contains = |needle: &[u8]| archive.windows(needle.len()).any(|w| w == needle);
    assert!(contains(b"toc.dat"));
    assert!(contains(b"table data"));
    assert_eq!(ctx.staging_leftovers(&settings.temp_dir), 0);
}

#[tokio::test]
async fn test_tar_mode_compressed_extension() {
    let ctx = TestContext::new();
    let settings = SettingsBuilder::for_context(&ctx)
        .mode(BackupMode::Tar)
        .compress(true)
        .template("{db}")
        .dump_script(&ctx, directory_dump_body())
        .build();
    let token = CancellationToken::new();

    let upload = Pipeline::Tar
        .execute(&token, &Engine::Postgres, &settings)
        .await
        .assert_ok();

    assert_eq!(upload.remote_path, "fake:backups/app.tar.gz");
    let archive = std::fs::read(ctx.remote_file(&upload.remote_path)).unwrap();
    assert_eq!(&archive[..2], &[0x1f, 0x8b]);
}

#[tokio::test]
async fn test_dump_failure_reports_stderr() {
    let ctx = TestContext::new();
    let settings = SettingsBuilder::for_context(&ctx)
        .dump_script(&ctx, &failing_dump_body("connection refused"))
        .build();
    let token = CancellationToken::new();

    let result = Pipeline::Stream.execute(&token, &Engine::Postgres, &settings).await;

    assert!(matches!(result, Err(PipelineError::Dump(_))));
    result.assert_err_contains("connection refused");
}

#[tokio::test]
async fn test_directory_dump_failure_skips_upload() {
    let ctx = TestContext::new();
    let settings = SettingsBuilder::for_context(&ctx)
        .mode(BackupMode::Directory)
        .dump_script(&ctx, &failing_dump_body("permission denied for table"))
        .build();
    let token = CancellationToken::new();

    Pipeline::Directory
        .execute(&token, &Engine::Postgres, &settings)
        .await
        .assert_err_contains("permission denied for table");

    assert!(ctx.rclone_calls().is_empty());
    assert_eq!(ctx.staging_leftovers(&settings.temp_dir), 0);
}

#[tokio::test]
async fn test_upload_failure_reports_rclone_error() {
    let ctx = TestContext::new();
    let settings = SettingsBuilder::for_context(&ctx)
        .rclone_binary(failing_rclone(&ctx))
        .dump_script(&ctx, &stream_dump_body("data"))
        .build();
    let token = CancellationToken::new();

    let result = Pipeline::Stream.execute(&token, &Engine::Postgres, &settings).await;

    assert!(matches!(result, Err(PipelineError::Upload(_))));
    result.assert_err_contains("access denied");
}

#[tokio::test]
async fn test_partial_upload_kept_by_default() {
    let ctx = TestContext::new();
    let settings = SettingsBuilder::for_context(&ctx)
        .template("{db}")
        .dump_script(&ctx, &failing_dump_body("boom"))
        .build();
    let token = CancellationToken::new();

    assert!(Pipeline::Stream
        .execute(&token, &Engine::Postgres, &settings)
        .await
        .is_err());

    assert!(ctx.remote_file("fake:backups/app.sql").exists());
    assert!(!ctx.rclone_calls().iter().any(|c| c.starts_with("deletefile")));
}

#[tokio::test]
async fn test_partial_upload_removed_when_enabled() {
    let ctx = TestContext::new();
    let settings = SettingsBuilder::for_context(&ctx)
        .template("{db}")
        .cleanup_partial(true)
        .dump_script(&ctx, &failing_dump_body("boom"))
        .build();
    let token = CancellationToken::new();

    assert!(Pipeline::Stream
        .execute(&token, &Engine::Postgres, &settings)
        .await
        .is_err());

    assert!(!ctx.remote_file("fake:backups/app.sql").exists());
    assert!(ctx
        .rclone_calls()
        .contains(&"deletefile fake:backups/app.sql".to_string()));
}

#[tokio::test]
async fn test_cancel_stops_hanging_dump() {
    let ctx = TestContext::new();
    let settings = SettingsBuilder::for_context(&ctx)
        .dump_script(&ctx, hanging_dump_body())
        .build();
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let started = Instant::now();
    let result = tokio::time::timeout(
        Duration::from_secs(10),
        Pipeline::Stream.execute(&token, &Engine::Postgres, &settings),
    )
    .await
    .expect("pipeline did not stop after cancellation");

    assert!(matches!(result, Err(PipelineError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_cancel_during_directory_dump_removes_staging() {
    let ctx = TestContext::new();
    let settings = SettingsBuilder::for_context(&ctx)
        .mode(BackupMode::Tar)
        .dump_script(&ctx, hanging_dump_body())
        .build();
    let token = CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        Pipeline::Tar.execute(&token, &Engine::Postgres, &settings),
    )
    .await
    .expect("pipeline did not stop after cancellation");

    assert!(result.unwrap_err().is_cancelled());
    assert_eq!(ctx.staging_leftovers(&settings.temp_dir), 0);
}

#[tokio::test]
async fn test_missing_dump_tool_fails_to_start() {
    let ctx = TestContext::new();
    let settings = SettingsBuilder::for_context(&ctx)
        .dump_binary(&ctx.temp_dir().join("no-such-dump"))
        .build();
    let token = CancellationToken::new();

    Pipeline::Stream
        .execute(&token, &Engine::Postgres, &settings)
        .await
        .assert_err_contains("failed to start");
}

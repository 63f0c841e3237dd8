//! Unit tests for backup name templates

use chrono::{FixedOffset, TimeZone, Utc};
use dbstash::pipeline::naming::{expand_template, resolve_dirname, resolve_filename, with_extension};
use test_utils::{Engine, EngineKind, SettingsBuilder};

#[test]
fn test_all_tokens_utc() {
    let now = Utc.with_ymd_and_hms(2026, 2, 7, 2, 0, 0).unwrap();
    let name = expand_template("{engine}/{db}-{date}-{time}-{timestamp}-{ts}", "app", "pg", &now);
    assert_eq!(name, "pg/app-2026-02-07-020000-20260207T020000Z-1770429600");
}

#[test]
fn test_timestamp_with_offset() {
    let tz = FixedOffset::east_opt(-5 * 3600).unwrap();
    let now = tz.with_ymd_and_hms(2026, 2, 6, 21, 0, 0).unwrap();
    assert_eq!(
        expand_template("{timestamp}", "app", "pg", &now),
        "20260206T210000-0500"
    );
}

#[test]
fn test_uuid_token_is_short_hex() {
    let now = Utc::now();
    let name = expand_template("{uuid}", "app", "pg", &now);
    assert_eq!(name.len(), 8);
    assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_filename_uses_engine_default_extension() {
    let settings = SettingsBuilder::new()
        .engine(EngineKind::Mongo)
        .uri("mongodb://db/orders")
        .no_database()
        .template("{engine}-{db}")
        .compress(true)
        .build();
    let engine = Engine::from_kind(settings.engine);

    assert_eq!(resolve_dirname(&settings, &engine), "mongo-orders");
    assert_eq!(resolve_filename(&settings, &engine), "mongo-orders.archive.gz");
}

#[test]
fn test_filename_extension_override() {
    let settings = SettingsBuilder::new().template("{db}").extension("bak").build();
    assert_eq!(resolve_filename(&settings, &Engine::Postgres), "app.bak");
}

#[test]
fn test_with_extension() {
    assert_eq!(with_extension("a".to_string(), ".sql"), "a.sql");
    assert_eq!(with_extension("a".to_string(), "sql"), "a.sql");
    assert_eq!(with_extension("a".to_string(), ""), "a");
}

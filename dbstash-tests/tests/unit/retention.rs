//! Unit tests for retention selection and deletion

use chrono::{DateTime, Duration, Utc};
use dbstash::config::RetentionLimits;
use dbstash::managers::retention::{apply, select_deletions};
use std::collections::HashSet;
use test_utils::{daily_entries, remote_entry, Deletion, MockRemote, RemoteEntry};
use tokio_util::sync::CancellationToken;

fn paths(entries: &[RemoteEntry]) -> HashSet<String> {
    entries.iter().map(|e| e.path.clone()).collect()
}

#[test]
fn test_zero_constraints_select_nothing() {
    let entries = daily_entries(10);
    assert!(select_deletions(&entries, 0, 0, Utc::now()).is_empty());
}

#[test]
fn test_count_boundary() {
    let entries = daily_entries(5);
    assert!(select_deletions(&entries, 5, 0, Utc::now()).is_empty());

    let selected = select_deletions(&entries, 4, 0, Utc::now());
    assert_eq!(paths(&selected), HashSet::from(["app-05.sql".to_string()]));
}

#[test]
fn test_age_boundary_is_strict() {
    let now = Utc::now();
    let mut exactly = remote_entry("exact.sql", 0, false);
    exactly.mod_time = now - Duration::days(7);
    let mut older = remote_entry("older.sql", 0, false);
    older.mod_time = now - Duration::days(7) - Duration::seconds(1);

    let selected = select_deletions(&[exactly, older], 0, 7, now);
    assert_eq!(paths(&selected), HashSet::from(["older.sql".to_string()]));
}

#[test]
fn test_union_of_constraints() {
    // count drops ages 9 and 10, age drops 5 days and older
    let entries = daily_entries(10);
    let selected = select_deletions(&entries, 8, 5, Utc::now() + Duration::minutes(1));

    let expected: HashSet<String> = (5..=10).map(|age| format!("app-{:02}.sql", age)).collect();
    assert_eq!(paths(&selected), expected);
    assert_eq!(selected.len(), expected.len());
}

/// Entries whose ages are measured from a fixed `now`
fn aged(now: DateTime<Utc>, ages: &[(&str, Duration)]) -> Vec<RemoteEntry> {
    ages.iter()
        .map(|(name, age)| {
            let mut entry = remote_entry(name, 0, false);
            entry.mod_time = now - *age;
            entry
        })
        .collect()
}

fn names(selected: &[&str]) -> HashSet<String> {
    selected.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_count_keeps_newest() {
    let entries = daily_entries(5);
    let now = Utc::now();

    let selected = select_deletions(&entries, 3, 0, now);
    assert_eq!(paths(&selected), names(&["app-04.sql", "app-05.sql"]));

    let selected = select_deletions(&entries, 1, 0, now);
    assert_eq!(
        paths(&selected),
        names(&["app-02.sql", "app-03.sql", "app-04.sql", "app-05.sql"])
    );
}

#[test]
fn test_age_thresholds() {
    let now = Utc::now();
    let entries = aged(
        now,
        &[
            ("d10.sql", Duration::days(10)),
            ("d5.sql", Duration::days(5)),
            ("d2.sql", Duration::days(2)),
            ("h12.sql", Duration::hours(12)),
            ("fresh.sql", Duration::zero()),
        ],
    );

    assert_eq!(paths(&select_deletions(&entries, 0, 7, now)), names(&["d10.sql"]));
    assert_eq!(
        paths(&select_deletions(&entries, 0, 3, now)),
        names(&["d10.sql", "d5.sql"])
    );
}

#[test]
fn test_selection_ignores_input_order() {
    let now = Utc::now();
    let entries = daily_entries(9);
    let expected = paths(&select_deletions(&entries, 4, 6, now));

    let mut reversed = entries.clone();
    reversed.reverse();
    assert_eq!(paths(&select_deletions(&reversed, 4, 6, now)), expected);

    // 4 is coprime with 9, so stepping by it visits every entry once
    let shuffled: Vec<RemoteEntry> = (0..entries.len())
        .map(|i| entries[(i * 4) % entries.len()].clone())
        .collect();
    assert_eq!(paths(&select_deletions(&shuffled, 4, 6, now)), expected);
}

#[test]
fn test_combined_limits_equal_union_of_each() {
    let now = Utc::now() + Duration::minutes(1);
    let entries = daily_entries(12);

    for (max_files, max_days) in [(8, 5), (3, 10), (11, 2), (1, 1)] {
        let combined = paths(&select_deletions(&entries, max_files, max_days, now));
        let by_count = paths(&select_deletions(&entries, max_files, 0, now));
        let by_age = paths(&select_deletions(&entries, 0, max_days, now));
        let union: HashSet<String> = by_count.union(&by_age).cloned().collect();
        assert_eq!(combined, union, "files={} days={}", max_files, max_days);
    }
}

#[test]
fn test_selection_is_idempotent_after_deletion() {
    let entries = daily_entries(6);
    let now = Utc::now();
    let first = select_deletions(&entries, 3, 0, now);
    let deleted = paths(&first);

    let remaining: Vec<RemoteEntry> = entries.into_iter().filter(|e| !deleted.contains(&e.path)).collect();
    assert!(select_deletions(&remaining, 3, 0, now).is_empty());
}

#[tokio::test]
async fn test_apply_deletes_files_and_purges_dirs() {
    let remote = MockRemote::with_entries(vec![
        remote_entry("new.sql", 1, false),
        remote_entry("old-dir", 40, true),
        remote_entry("old.sql", 50, false),
    ]);
    let token = CancellationToken::new();

    let deleted = apply(&remote, RetentionLimits { max_files: 0, max_days: 30 }, &token)
        .await
        .unwrap();

    assert_eq!(deleted, 2);
    let deletions = remote.get_deletions();
    assert!(deletions.contains(&Deletion::Purge("remote:old-dir".to_string())));
    assert!(deletions.contains(&Deletion::File("remote:old.sql".to_string())));
}

#[tokio::test]
async fn test_apply_skips_listing_when_disabled() {
    let remote = MockRemote::with_entries(daily_entries(3));
    let token = CancellationToken::new();

    let deleted = apply(&remote, RetentionLimits::default(), &token).await.unwrap();
    assert_eq!(deleted, 0);
    assert_eq!(remote.list_calls(), 0);
}

#[tokio::test]
async fn test_apply_continues_past_failed_deletion() {
    let remote = MockRemote::with_entries(daily_entries(4)).fail_on("app-03.sql");
    let token = CancellationToken::new();

    let deleted = apply(&remote, RetentionLimits { max_files: 1, max_days: 0 }, &token)
        .await
        .unwrap();

    assert_eq!(deleted, 2);
    assert_eq!(remote.get_deletions().len(), 2);
}

#[tokio::test]
async fn test_apply_listing_failure_is_error() {
    let remote = MockRemote::new().fail_listing();
    let token = CancellationToken::new();
    assert!(apply(&remote, RetentionLimits { max_files: 1, max_days: 0 }, &token)
        .await
        .is_err());
}

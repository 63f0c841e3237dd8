//! Retention cleanup of old backups on the remote
//!
//! Selection is a pure function over a listing; [`apply`] performs the
//! listing and deletions through a [`RemoteStore`].

use crate::config::RetentionLimits;
use crate::utils::rclone::{RemoteEntry, RemoteError};
use crate::utils::remote_ops::RemoteStore;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Choose the entries violating at least one retention constraint.
///
/// `max_files` keeps the newest N entries; `max_days` removes entries last
/// modified strictly before `now - max_days`. Zero disables a constraint.
/// Both rules look at the full listing and the result is their union, each
/// entry at most once (by path), newest first.
pub fn select_deletions(
    entries: &[RemoteEntry],
    max_files: u32,
    max_days: u32,
    now: DateTime<Utc>,
) -> Vec<RemoteEntry> {
    if max_files == 0 && max_days == 0 {
        return Vec::new();
    }

    let mut sorted: Vec<&RemoteEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| b.mod_time.cmp(&a.mod_time));

    let mut marked: HashSet<&str> = HashSet::new();

    if max_files > 0 {
        for entry in sorted.iter().skip(max_files as usize) {
            marked.insert(entry.path.as_str());
        }
    }

    if max_days > 0 {
        let cutoff = now - Duration::days(i64::from(max_days));
        for entry in &sorted {
            if entry.mod_time < cutoff {
                marked.insert(entry.path.as_str());
            }
        }
    }

    let mut seen: HashSet<&str> = HashSet::new();
    sorted
        .into_iter()
        .filter(|entry| marked.contains(entry.path.as_str()) && seen.insert(entry.path.as_str()))
        .cloned()
        .collect()
}

/// List the remote and delete what the limits select.
///
/// Returns the number of deleted entries. Per-entry failures are logged and
/// skipped; only a failed listing is an error. Nothing is listed when both
/// limits are zero.
pub async fn apply(
    remote: &dyn RemoteStore,
    limits: RetentionLimits,
    token: &CancellationToken,
) -> Result<usize, RemoteError> {
    if !limits.is_enabled() {
        debug!("Retention: no constraints configured, skipping");
        return Ok(0);
    }

    let entries = remote.list(token).await?;
    if entries.is_empty() {
        debug!("Retention: no entries found on remote");
        return Ok(0);
    }

    let to_delete = select_deletions(&entries, limits.max_files, limits.max_days, Utc::now());
    if to_delete.is_empty() {
        debug!("Retention: nothing to delete among {} entries", entries.len());
        return Ok(0);
    }

    let mut deleted = 0;
    for entry in &to_delete {
        let path = remote.entry_path(&entry.path);
        let result = if entry.is_dir {
            remote.purge(&path, token).await
        } else {
            remote.delete_file(&path, token).await
        };

        match result {
            Ok(()) => {
                info!("Retention: deleted old backup {} (modified {})", entry.path, entry.mod_time);
                deleted += 1;
            }
            Err(e) if e.is_cancelled() => {
                warn!("Retention: cancelled after deleting {} entries", deleted);
                return Err(e);
            }
            Err(e) => warn!("Retention: failed to delete {}: {}", entry.path, e),
        }
    }

    Ok(deleted)
}

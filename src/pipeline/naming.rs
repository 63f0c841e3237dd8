//! Backup name templates
//!
//! Supported tokens:
//!
//! - `{db}`: database name from DB_NAME or parsed from DB_URI
//! - `{engine}`: engine key (pg, mongo, mysql, mariadb, redis)
//! - `{date}`: `YYYY-MM-DD`
//! - `{time}`: `HHMMSS`
//! - `{timestamp}`: `YYYYMMDDTHHMMSS` followed by `Z` for UTC, else `+hhmm`
//! - `{ts}`: Unix timestamp in seconds
//! - `{uuid}`: first 8 characters of a UUIDv7
//!
//! Times are taken in the configured timezone.
//!
//! The `{uuid}` prefix is the top 32 bits of the v7 millisecond timestamp,
//! so names expanded within the same ~65 s window share it. Combine it with
//! `{time}` or `{ts}` when names must stay unique across close runs.

use crate::config::Settings;
use crate::engines::Engine;
use chrono::{DateTime, Offset, TimeZone};

/// Expand all tokens of `template`
pub fn expand_template<Tz: TimeZone>(template: &str, db: &str, engine: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let timestamp = if now.offset().fix().local_minus_utc() == 0 {
        now.format("%Y%m%dT%H%M%SZ").to_string()
    } else {
        now.format("%Y%m%dT%H%M%S%z").to_string()
    };

    template
        .replace("{db}", db)
        .replace("{engine}", engine)
        .replace("{date}", &now.format("%Y-%m-%d").to_string())
        .replace("{time}", &now.format("%H%M%S").to_string())
        .replace("{timestamp}", &timestamp)
        .replace("{ts}", &now.timestamp().to_string())
        .replace("{uuid}", &short_uuid())
}

/// First 8 characters of a fresh UUIDv7; sortable by creation time
pub fn short_uuid() -> String {
    let mut id = uuid::Uuid::now_v7().simple().to_string();
    id.truncate(8);
    id
}

/// Directory name (no extension) for the current time
pub fn resolve_dirname(settings: &Settings, engine: &Engine) -> String {
    let now = chrono::Utc::now().with_timezone(&settings.timezone);
    expand_template(&settings.name_template, &settings.db_name_or_default(), engine.name(), &now)
}

/// File name with the configured or engine default extension
pub fn resolve_filename(settings: &Settings, engine: &Engine) -> String {
    let extension = settings
        .extension
        .as_deref()
        .unwrap_or_else(|| engine.default_extension(settings.compress));
    with_extension(resolve_dirname(settings, engine), extension)
}

/// Append `extension`, adding the leading dot when missing
pub fn with_extension(name: String, extension: &str) -> String {
    if extension.is_empty() || extension.starts_with('.') {
        format!("{}{}", name, extension)
    } else {
        format!("{}.{}", name, extension)
    }
}

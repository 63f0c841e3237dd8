//! Cron expression helpers for the backup scheduler

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use croner::errors::CronError;
use croner::Cron;

/// Parse a standard 5-field cron expression (minute hour dom month dow)
pub fn parse_cron(schedule: &str) -> Result<Cron, CronError> {
    Cron::new(schedule).parse()
}

/// Validate cron schedule syntax
pub fn validate_cron_schedule(schedule: &str) -> Result<(), CronError> {
    parse_cron(schedule).map(|_| ())
}

/// Next firing strictly after `after`, evaluated in the given timezone
pub fn next_occurrence(cron: &Cron, tz: Tz, after: DateTime<Utc>) -> Result<DateTime<Utc>, CronError> {
    let local = after.with_timezone(&tz);
    cron.find_next_occurrence(&local, false)
        .map(|next| next.with_timezone(&Utc))
}

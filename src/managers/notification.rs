//! Slack and Discord webhook notifications
//!
//! Sends a summary of each backup run. Delivery problems are logged and never
//! fail the backup.

use crate::config::{NotifyOn, NotifySettings};
use crate::managers::backup::{RunResult, RunStatus};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Delivers run results somewhere a human will see them
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a notification for `result`; never fails
    async fn send(&self, token: &CancellationToken, result: &RunResult);
}

/// Embed and attachment colors
#[derive(Debug, Clone, Copy)]
pub enum NotificationColor {
    /// Green - for success
    Success = 0x36a64f,
    /// Red - for failures
    Failure = 0xdc3545,
}

impl NotificationColor {
    fn for_status(status: RunStatus) -> Self {
        match status {
            RunStatus::Success => NotificationColor::Success,
            RunStatus::Failure => NotificationColor::Failure,
        }
    }

    fn as_decimal(&self) -> u32 {
        *self as u32
    }

    fn as_hex(&self) -> String {
        format!("#{:06x}", self.as_decimal())
    }
}

/// Webhook flavor, detected from the URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Slack,
    Discord,
}

impl Platform {
    pub fn detect(url: &str) -> Self {
        if url.contains("discord.com/api/webhooks") {
            Platform::Discord
        } else {
            Platform::Slack
        }
    }
}

/// Slack webhook payload
#[derive(Debug, Serialize)]
pub(crate) struct SlackPayload {
    text: String,
    attachments: Vec<SlackAttachment>,
}

#[derive(Debug, Serialize)]
struct SlackAttachment {
    color: String,
    fields: Vec<SlackField>,
    ts: i64,
}

#[derive(Debug, Serialize)]
struct SlackField {
    title: String,
    value: String,
    short: bool,
}

/// Discord webhook payload
#[derive(Debug, Serialize)]
pub(crate) struct DiscordPayload {
    embeds: Vec<DiscordEmbed>,
}

#[derive(Debug, Serialize)]
struct DiscordEmbed {
    title: String,
    color: u32,
    fields: Vec<DiscordField>,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct DiscordField {
    name: String,
    value: String,
    inline: bool,
}

/// Whether the policy asks for a notification about `status`
pub fn should_notify(on: NotifyOn, status: RunStatus) -> bool {
    match on {
        NotifyOn::Always => true,
        NotifyOn::Failure => status == RunStatus::Failure,
        NotifyOn::Success => status == RunStatus::Success,
    }
}

/// (name, value, short) rows shared by both payload formats
fn summary_fields(result: &RunResult) -> Vec<(&'static str, String, bool)> {
    let status = match result.status {
        RunStatus::Success => "\u{2705} SUCCESS",
        RunStatus::Failure => "\u{274C} FAILURE",
    };
    let mut fields = vec![
        ("Status", status.to_string(), true),
        ("Engine", result.engine.clone(), true),
        ("Database", result.database.clone(), true),
        ("Duration", format_duration(result.duration), true),
        ("File Size", format_size(result.file_size), true),
        ("Remote Path", result.remote_path.clone(), false),
    ];
    if let Some(error) = &result.error {
        fields.push(("Error", error.clone(), false));
    }
    fields
}

pub(crate) fn build_slack_payload(result: &RunResult) -> SlackPayload {
    let fields = summary_fields(result)
        .into_iter()
        .map(|(title, value, short)| SlackField {
            title: title.to_string(),
            value,
            short,
        })
        .collect();

    SlackPayload {
        text: format!(
            "dbstash backup {}: {}/{}",
            result.status.as_str(),
            result.engine,
            result.database
        ),
        attachments: vec![SlackAttachment {
            color: NotificationColor::for_status(result.status).as_hex(),
            fields,
            ts: chrono::Utc::now().timestamp(),
        }],
    }
}

pub(crate) fn build_discord_payload(result: &RunResult) -> DiscordPayload {
    let fields = summary_fields(result)
        .into_iter()
        .map(|(name, value, inline)| DiscordField {
            name: name.to_string(),
            value,
            inline,
        })
        .collect();

    DiscordPayload {
        embeds: vec![DiscordEmbed {
            title: format!("dbstash backup {}", result.status.as_str()),
            color: NotificationColor::for_status(result.status).as_decimal(),
            fields,
            timestamp: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        }],
    }
}

/// Posts run results to a Slack or Discord webhook
pub struct WebhookNotifier {
    settings: NotifySettings,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(settings: NotifySettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client, using defaults: {}", e);
                reqwest::Client::new()
            });
        Self { settings, client }
    }

    /// Check if notifications are enabled for a run status
    pub fn is_enabled(&self, status: RunStatus) -> bool {
        !self.settings.webhook_url.is_empty() && should_notify(self.settings.on, status)
    }

    async fn post(&self, result: &RunResult) -> Result<(), String> {
        let url = &self.settings.webhook_url;
        let request = match Platform::detect(url) {
            Platform::Discord => self.client.post(url).json(&build_discord_payload(result)),
            Platform::Slack => self.client.post(url).json(&build_slack_payload(result)),
        };

        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(format!("webhook returned status {}: {}", status, body))
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, token: &CancellationToken, result: &RunResult) {
        if !self.is_enabled(result.status) {
            debug!(
                "Notification for {} run not enabled (notify on {}), skipping",
                result.status.as_str(),
                self.settings.on
            );
            return;
        }

        let platform = Platform::detect(&self.settings.webhook_url);
        tokio::select! {
            outcome = self.post(result) => match outcome {
                Ok(()) => info!("Sent {:?} notification", platform),
                Err(e) => warn!("Failed to send notification: {}", e),
            },
            _ = token.cancelled() => warn!("Notification cancelled"),
        }
    }
}

/// Format a byte count with 1024-based units; 0 means unknown
pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes == 0 {
        return "unknown".to_string();
    }
    if bytes < UNIT {
        return format!("{} B", bytes);
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let prefix = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}B", bytes as f64 / div as f64, prefix)
}

/// Elapsed time to whole seconds, e.g. `2m 5s`
pub fn format_duration(elapsed: Duration) -> String {
    humantime::format_duration(Duration::from_secs(elapsed.as_secs())).to_string()
}

/// Mock implementation for testing
#[allow(dead_code)]
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    pub struct MockNotifier {
        pub sent: Arc<Mutex<Vec<RunResult>>>,
    }

    impl MockNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get_sent(&self) -> Vec<RunResult> {
            self.sent.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, _token: &CancellationToken, result: &RunResult) {
            self.sent.lock().unwrap().push(result.clone());
        }
    }
}

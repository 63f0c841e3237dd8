use chrono_tz::Tz;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Fully validated settings for one dbstash process
///
/// Built once by [`super::load_settings`] and shared read-only (behind an
/// `Arc`) by every engine, pipeline and run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub engine: EngineKind,
    pub connection: ConnectionSettings,

    /// Dump every database on the server instead of a single one
    pub all_databases: bool,

    pub mode: BackupMode,
    pub compress: bool,
    /// Explicit artifact extension, overriding the engine default
    pub extension: Option<String>,
    pub name_template: String,
    pub temp_dir: PathBuf,
    pub timezone: Tz,

    pub dump_extra_args: String,
    /// Replacement for the engine's dump tool (pg_dump, mongodump, ...)
    pub dump_binary: Option<PathBuf>,

    pub schedule: Schedule,
    pub on_start: bool,
    pub timeout: Option<Duration>,
    pub lock: bool,
    pub dry_run: bool,
    pub cleanup_partial: bool,

    pub rclone: RcloneSettings,
    pub retention: RetentionLimits,
    pub hooks: HookSettings,
    pub notify: NotifySettings,
    pub logging: LogSettings,
    pub health_addr: String,
}

/// The same defaults the CLI applies, for a local Postgres database
impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: EngineKind::Pg,
            connection: ConnectionSettings {
                host: Some("localhost".to_string()),
                name: Some("app".to_string()),
                auth_source: "admin".to_string(),
                ..Default::default()
            },
            all_databases: false,
            mode: BackupMode::Stream,
            compress: false,
            extension: None,
            name_template: "{db}-{date}-{time}".to_string(),
            temp_dir: std::env::temp_dir().join("dbstash-work"),
            timezone: Tz::UTC,
            dump_extra_args: String::new(),
            dump_binary: None,
            schedule: Schedule::Cron("0 2 * * *".to_string()),
            on_start: false,
            timeout: None,
            lock: true,
            dry_run: false,
            cleanup_partial: false,
            rclone: RcloneSettings {
                binary: "rclone".to_string(),
                remote: "remote:backups".to_string(),
                config_file: None,
                extra_args: String::new(),
            },
            retention: RetentionLimits::default(),
            hooks: HookSettings::default(),
            notify: NotifySettings::default(),
            logging: LogSettings::default(),
            health_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

impl Settings {
    /// Database name used in file names, logs and notifications.
    ///
    /// Falls back to the path component of the URI, then to `unknown`.
    pub fn db_name_or_default(&self) -> String {
        if let Some(name) = self.connection.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        self.connection
            .uri
            .as_deref()
            .and_then(super::db_name_from_uri)
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Connection parameters. A URI takes precedence over the discrete fields.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSettings {
    pub uri: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// MongoDB authentication database
    pub auth_source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Pg,
    Mongo,
    Mysql,
    Mariadb,
    Redis,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Pg => "pg",
            EngineKind::Mongo => "mongo",
            EngineKind::Mysql => "mysql",
            EngineKind::Mariadb => "mariadb",
            EngineKind::Redis => "redis",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pg" => Ok(EngineKind::Pg),
            "mongo" => Ok(EngineKind::Mongo),
            "mysql" => Ok(EngineKind::Mysql),
            "mariadb" => Ok(EngineKind::Mariadb),
            "redis" => Ok(EngineKind::Redis),
            other => Err(format!(
                "unsupported engine {:?} (valid: pg, mongo, mysql, mariadb, redis)",
                other
            )),
        }
    }
}

/// How dump output travels to the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupMode {
    Stream,
    Directory,
    Tar,
}

impl BackupMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupMode::Stream => "stream",
            BackupMode::Directory => "directory",
            BackupMode::Tar => "tar",
        }
    }
}

impl fmt::Display for BackupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stream" => Ok(BackupMode::Stream),
            "directory" => Ok(BackupMode::Directory),
            "tar" => Ok(BackupMode::Tar),
            other => Err(format!(
                "invalid backup mode {:?} (valid: stream, directory, tar)",
                other
            )),
        }
    }
}

/// Trigger for backup runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// Run a single backup and exit
    Once,
    /// Standard 5-field cron expression
    Cron(String),
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Once => f.write_str("once"),
            Schedule::Cron(expr) => f.write_str(expr),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RcloneSettings {
    pub binary: String,
    /// Remote target, e.g. `s3:my-bucket/backups`
    pub remote: String,
    pub config_file: Option<PathBuf>,
    pub extra_args: String,
}

/// Retention constraints. Zero disables a constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionLimits {
    pub max_files: u32,
    pub max_days: u32,
}

impl RetentionLimits {
    pub fn is_enabled(&self) -> bool {
        self.max_files > 0 || self.max_days > 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct HookSettings {
    pub pre_backup: String,
    pub post_backup: String,
}

#[derive(Debug, Clone, Default)]
pub struct NotifySettings {
    pub webhook_url: String,
    pub on: NotifyOn,
}

/// Which run outcomes produce a notification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotifyOn {
    Always,
    #[default]
    Failure,
    Success,
}

impl FromStr for NotifyOn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "always" => Ok(NotifyOn::Always),
            "failure" => Ok(NotifyOn::Failure),
            "success" => Ok(NotifyOn::Success),
            other => Err(format!(
                "invalid notify policy {:?} (valid: always, failure, success)",
                other
            )),
        }
    }
}

impl fmt::Display for NotifyOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NotifyOn::Always => "always",
            NotifyOn::Failure => "failure",
            NotifyOn::Success => "success",
        })
    }
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
    pub directory: Option<PathBuf>,
    pub max_files: u32,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            directory: None,
            max_files: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" => Ok(LogFormat::Text),
            other => Err(format!("invalid log format {:?} (valid: json, text)", other)),
        }
    }
}

//! Command-line flags with environment variable fallbacks
//!
//! Every option can be given as `--flag` or through the environment, which
//! is how container deployments usually configure dbstash.

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args};
use std::path::PathBuf;

#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Database engine (pg, mongo, mysql, mariadb, redis)
    #[arg(long, env = "ENGINE")]
    pub engine: Option<String>,

    /// Full connection URI
    #[arg(long, env = "DB_URI", hide_env_values = true)]
    pub db_uri: Option<String>,

    /// Path to a file containing the connection URI
    #[arg(long, env = "DB_URI_FILE")]
    pub db_uri_file: Option<PathBuf>,

    /// Database host
    #[arg(long, env = "DB_HOST")]
    pub db_host: Option<String>,

    /// Database port
    #[arg(long, env = "DB_PORT")]
    pub db_port: Option<String>,

    /// Database name
    #[arg(long, env = "DB_NAME")]
    pub db_name: Option<String>,

    /// Database user
    #[arg(long, env = "DB_USER")]
    pub db_user: Option<String>,

    /// Database password
    #[arg(long, env = "DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// Path to a file containing the database password
    #[arg(long, env = "DB_PASSWORD_FILE")]
    pub db_password_file: Option<PathBuf>,

    /// MongoDB authentication database
    #[arg(long, env = "DB_AUTH_SOURCE", default_value = "admin")]
    pub db_auth_source: String,

    /// Dump every database on the server
    #[arg(
        long,
        env = "BACKUP_ALL_DATABASES",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true"
    )]
    pub all_databases: bool,

    /// Rclone remote path (e.g. s3:my-bucket/backups)
    #[arg(long, env = "RCLONE_REMOTE")]
    pub rclone_remote: Option<String>,

    /// Base64-encoded rclone.conf content
    #[arg(long, env = "RCLONE_CONFIG", hide_env_values = true)]
    pub rclone_config: Option<String>,

    /// Path to the rclone config file
    #[arg(long, env = "RCLONE_CONFIG_FILE")]
    pub rclone_config_file: Option<PathBuf>,

    /// Additional rclone flags
    #[arg(long, env = "RCLONE_EXTRA_ARGS", default_value = "")]
    pub rclone_extra_args: String,

    /// rclone executable
    #[arg(long, env = "RCLONE_BINARY", default_value = "rclone")]
    pub rclone_binary: String,

    /// Cron expression or 'once'
    #[arg(long, env = "BACKUP_SCHEDULE", default_value = "0 2 * * *")]
    pub backup_schedule: String,

    /// Backup mode: stream, directory, or tar
    #[arg(long, env = "BACKUP_MODE", default_value = "stream")]
    pub backup_mode: String,

    /// Name template with tokens: {db}, {engine}, {date}, {time}, {timestamp}, {ts}, {uuid}
    #[arg(long, env = "BACKUP_NAME_TEMPLATE", default_value = "{db}-{date}-{time}")]
    pub backup_name_template: String,

    /// Enable native compression
    #[arg(
        long,
        env = "BACKUP_COMPRESS",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true"
    )]
    pub backup_compress: bool,

    /// Override the file extension
    #[arg(long, env = "BACKUP_EXTENSION")]
    pub backup_extension: Option<String>,

    /// Run a backup immediately on start
    #[arg(
        long,
        env = "BACKUP_ON_START",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true"
    )]
    pub backup_on_start: bool,

    /// Max duration of one backup run (e.g. 1h, 30m); 0 disables
    #[arg(long, env = "BACKUP_TIMEOUT", default_value = "0")]
    pub backup_timeout: String,

    /// Prevent overlapping backup runs
    #[arg(
        long,
        env = "BACKUP_LOCK",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_value = "true",
        default_missing_value = "true"
    )]
    pub backup_lock: bool,

    /// Temp directory for directory/tar modes
    #[arg(long, env = "BACKUP_TEMP_DIR", default_value = "/tmp/dbstash-work")]
    pub backup_temp_dir: PathBuf,

    /// Delete the remote object after a failed stream/tar upload
    #[arg(
        long,
        env = "BACKUP_CLEANUP_PARTIAL",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true"
    )]
    pub backup_cleanup_partial: bool,

    /// Additional flags for the dump tool
    #[arg(long, env = "DUMP_EXTRA_ARGS", default_value = "")]
    pub dump_extra_args: String,

    /// Path to the dump tool, replacing the engine default
    #[arg(long, env = "DUMP_BINARY")]
    pub dump_binary: Option<PathBuf>,

    /// Log the configuration and dump command without executing
    #[arg(
        long,
        env = "DRY_RUN",
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new(),
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true"
    )]
    pub dry_run: bool,

    /// Timezone for schedule and file names
    #[arg(long, env = "TZ", default_value = "UTC")]
    pub tz: String,

    /// Keep at most N backups (0 = unlimited)
    #[arg(long, env = "RETENTION_MAX_FILES", default_value_t = 0)]
    pub retention_max_files: u32,

    /// Delete backups older than N days (0 = unlimited)
    #[arg(long, env = "RETENTION_MAX_DAYS", default_value_t = 0)]
    pub retention_max_days: u32,

    /// Slack or Discord webhook URL
    #[arg(long, env = "NOTIFY_WEBHOOK_URL", default_value = "", hide_env_values = true)]
    pub notify_webhook_url: String,

    /// When to notify: always, failure, success
    #[arg(long, env = "NOTIFY_ON", default_value = "failure")]
    pub notify_on: String,

    /// Shell command to run before each backup
    #[arg(long, env = "HOOK_PRE_BACKUP", default_value = "")]
    pub hook_pre_backup: String,

    /// Shell command to run after each backup
    #[arg(long, env = "HOOK_POST_BACKUP", default_value = "")]
    pub hook_post_backup: String,

    /// Log verbosity: trace, debug, info, warn, error
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log format: json or text
    #[arg(long, env = "LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Also write logs to daily rotated files in this directory
    #[arg(long, env = "LOG_DIRECTORY")]
    pub log_directory: Option<PathBuf>,

    /// Rotated log files to keep
    #[arg(long, env = "LOG_MAX_FILES", default_value_t = 10)]
    pub log_max_files: u32,

    /// Listen address of the health endpoint
    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8080")]
    pub health_addr: String,
}

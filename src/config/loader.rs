use super::args::SettingsArgs;
use super::types::*;
use base64::Engine as _;
use chrono_tz::Tz;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file used when neither RCLONE_CONFIG nor RCLONE_CONFIG_FILE is given
pub const DEFAULT_RCLONE_CONFIG: &str = "/config/rclone.conf";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read secret file {path:?}: {source}")]
    SecretFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write decoded rclone config: {0}")]
    RcloneConfigWrite(#[source] std::io::Error),

    #[error("RCLONE_CONFIG is not valid base64: {0}")]
    RcloneConfigDecode(#[from] base64::DecodeError),

    #[error("rclone config file not found at {0:?}. Please set RCLONE_CONFIG_FILE to a valid path")]
    RcloneConfigMissing(PathBuf),

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        message: message.into(),
    }
}

/// Build validated settings from parsed CLI/env arguments.
///
/// `engine` comes from the subcommand when one was given; otherwise the
/// `ENGINE` value in `args` is used.
pub fn load_settings(args: SettingsArgs, engine: Option<EngineKind>) -> Result<Settings> {
    let engine = match engine {
        Some(kind) => kind,
        None => args
            .engine
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or(ConfigError::Missing("ENGINE"))?
            .parse::<EngineKind>()
            .map_err(|e| invalid("ENGINE", e))?,
    };

    let uri = resolve_secret(args.db_uri, args.db_uri_file.as_deref())?;
    let password = resolve_secret(args.db_password, args.db_password_file.as_deref())?;

    let connection = ConnectionSettings {
        uri,
        host: non_empty(args.db_host),
        port: non_empty(args.db_port),
        name: non_empty(args.db_name),
        user: non_empty(args.db_user),
        password,
        auth_source: args.db_auth_source,
    };
    validate_connection(&connection, args.all_databases)?;

    let remote = non_empty(args.rclone_remote).ok_or(ConfigError::Missing("RCLONE_REMOTE"))?;
    let config_file = resolve_rclone_config(
        args.rclone_config_file.as_deref(),
        args.rclone_config.as_deref(),
    )?;

    let schedule = parse_schedule(&args.backup_schedule)?;
    let mode = args
        .backup_mode
        .parse::<BackupMode>()
        .map_err(|e| invalid("BACKUP_MODE", e))?;
    let notify_on = args
        .notify_on
        .parse::<NotifyOn>()
        .map_err(|e| invalid("NOTIFY_ON", e))?;
    let log_format = args
        .log_format
        .parse::<LogFormat>()
        .map_err(|e| invalid("LOG_FORMAT", e))?;
    let timezone = args
        .tz
        .trim()
        .parse::<Tz>()
        .map_err(|e| invalid("TZ", format!("{:?}: {}", args.tz, e)))?;
    let timeout = parse_timeout(&args.backup_timeout)?;

    if args.backup_name_template.trim().is_empty() {
        return Err(invalid("BACKUP_NAME_TEMPLATE", "template must not be empty"));
    }

    Ok(Settings {
        engine,
        connection,
        all_databases: args.all_databases,
        mode,
        compress: args.backup_compress,
        extension: non_empty(args.backup_extension),
        name_template: args.backup_name_template,
        temp_dir: args.backup_temp_dir,
        timezone,
        dump_extra_args: args.dump_extra_args,
        dump_binary: args.dump_binary,
        schedule,
        on_start: args.backup_on_start,
        timeout,
        lock: args.backup_lock,
        dry_run: args.dry_run,
        cleanup_partial: args.backup_cleanup_partial,
        rclone: RcloneSettings {
            binary: args.rclone_binary,
            remote,
            config_file: Some(config_file),
            extra_args: args.rclone_extra_args,
        },
        retention: RetentionLimits {
            max_files: args.retention_max_files,
            max_days: args.retention_max_days,
        },
        hooks: HookSettings {
            pre_backup: args.hook_pre_backup,
            post_backup: args.hook_post_backup,
        },
        notify: NotifySettings {
            webhook_url: args.notify_webhook_url,
            on: notify_on,
        },
        logging: LogSettings {
            level: args.log_level,
            format: log_format,
            directory: args.log_directory,
            max_files: args.log_max_files,
        },
        health_addr: args.health_addr,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Resolve a secret from its `_FILE` variant first, then the plain value
fn resolve_secret(value: Option<String>, file: Option<&Path>) -> Result<Option<String>> {
    if let Some(path) = file.filter(|p| !p.as_os_str().is_empty()) {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::SecretFile {
            path: path.to_path_buf(),
            source,
        })?;
        return Ok(non_empty(Some(contents.trim().to_string())));
    }
    Ok(non_empty(value))
}

fn validate_connection(conn: &ConnectionSettings, all_databases: bool) -> Result<()> {
    if conn.uri.is_some() {
        return Ok(());
    }
    if conn.host.is_none() {
        return Err(ConfigError::Missing("DB_URI (or DB_URI_FILE) or DB_HOST"));
    }
    if conn.name.is_none() && !all_databases {
        return Err(ConfigError::Missing("DB_NAME (required with DB_HOST)"));
    }
    Ok(())
}

/// Resolve the rclone config path.
///
/// Base64 content in RCLONE_CONFIG wins: it is decoded into a temp file that
/// lives for the rest of the process. Otherwise the given path (or the
/// default) must exist.
pub fn resolve_rclone_config(path: Option<&Path>, base64_config: Option<&str>) -> Result<PathBuf> {
    if let Some(encoded) = base64_config.map(str::trim).filter(|c| !c.is_empty()) {
        let decoded = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        let mut file = tempfile::Builder::new()
            .prefix("rclone-")
            .suffix(".conf")
            .tempfile()
            .map_err(ConfigError::RcloneConfigWrite)?;
        file.write_all(&decoded)
            .map_err(ConfigError::RcloneConfigWrite)?;
        let (_, kept) = file.keep().map_err(|e| ConfigError::RcloneConfigWrite(e.error))?;
        return Ok(kept);
    }

    let path = path
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_RCLONE_CONFIG));
    if !path.exists() {
        return Err(ConfigError::RcloneConfigMissing(path));
    }
    Ok(path)
}

/// Parse `once` or a 5-field cron expression
pub fn parse_schedule(value: &str) -> Result<Schedule> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("once") {
        return Ok(Schedule::Once);
    }
    crate::utils::cron::validate_cron_schedule(value)
        .map_err(|e| invalid("BACKUP_SCHEDULE", format!("{:?}: {}", value, e)))?;
    Ok(Schedule::Cron(value.to_string()))
}

/// Parse BACKUP_TIMEOUT; `0` or empty disables the timeout
pub fn parse_timeout(value: &str) -> Result<Option<Duration>> {
    let value = value.trim();
    if value.is_empty() || value == "0" {
        return Ok(None);
    }
    let duration = humantime::parse_duration(value)
        .map_err(|e| invalid("BACKUP_TIMEOUT", format!("{:?}: {}", value, e)))?;
    Ok((!duration.is_zero()).then_some(duration))
}

/// Extract the database name from the path of a connection URI.
///
/// Credentials and query parameters are skipped. Returns `None` when the URI
/// has no scheme or no path.
pub fn db_name_from_uri(uri: &str) -> Option<String> {
    let (_, rest) = uri.split_once("://")?;
    let rest = match rest.rfind('@') {
        Some(at) => &rest[at + 1..],
        None => rest,
    };
    let (_, path) = rest.split_once('/')?;
    let name = path.split('?').next().unwrap_or_default();
    (!name.is_empty()).then(|| name.to_string())
}

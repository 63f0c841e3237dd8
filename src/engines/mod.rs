//! Database engine adapters
//!
//! Each adapter turns [`Settings`] into the command line of its dump tool.
//! Building a command never executes anything; pipelines spawn it.

pub mod mongo;
pub mod mysql;
pub mod postgres;
pub mod redis;

use crate::config::{mask_uri, EngineKind, Settings};
use percent_encoding::percent_decode_str;
use std::fmt;
use std::path::Path;
use tokio::process::Command;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{engine} does not support {mode} mode")]
    UnsupportedMode {
        engine: &'static str,
        mode: DumpMode,
    },

    #[error("{engine} connection has no database name; set DB_NAME, add a database to the URI, or enable BACKUP_ALL_DATABASES")]
    MissingDatabase { engine: &'static str },

    #[error("no connection configured for {engine}; set DB_URI or DB_HOST")]
    MissingConnection { engine: &'static str },

    #[error("invalid connection URI: {0}")]
    InvalidUri(#[from] url::ParseError),
}

/// Where the dump tool writes its output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpMode {
    /// Write the dump to stdout
    Stream,
    /// Write the dump into a directory
    Directory,
}

impl fmt::Display for DumpMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DumpMode::Stream => "stream",
            DumpMode::Directory => "directory",
        })
    }
}

/// How an engine honors BACKUP_COMPRESS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// Picks one of two output formats (pg_dump custom vs plain)
    FormatToggle {
        on: &'static str,
        off: &'static str,
    },
    /// Appends a flag to the dump command
    Flag(&'static str),
    /// No native compression; the setting is a no-op
    Unsupported,
}

/// A fully resolved dump tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Variables set on the child only
    pub env: Vec<(String, String)>,
}

impl DumpCommand {
    /// Start a command for `default_program`, honoring DUMP_BINARY
    fn for_settings(settings: &Settings, default_program: &str) -> Self {
        let program = settings
            .dump_binary
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| default_program.to_string());
        Self {
            program,
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    fn arg(&mut self, arg: impl Into<String>) -> &mut Self {
        self.args.push(arg.into());
        self
    }

    fn extend_extra_args(&mut self, extra: &str) {
        self.args.extend(shell_split(extra));
    }

    /// Add the arguments `policy` prescribes for BACKUP_COMPRESS
    fn apply_compression(&mut self, policy: Compression, compress: bool) {
        match policy {
            Compression::FormatToggle { on, off } => {
                self.arg(if compress { on } else { off });
            }
            Compression::Flag(flag) => {
                if compress {
                    self.arg(flag);
                }
            }
            Compression::Unsupported => {
                if compress {
                    warn!(
                        "{} has no native compression; BACKUP_COMPRESS=true is a no-op",
                        self.display_name()
                    );
                }
            }
        }
    }

    fn env(&mut self, key: &str, value: Option<&str>) {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.env.push((key.to_string(), value.to_string()));
        }
    }

    /// Short program name for logs and errors
    pub fn display_name(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.program)
    }

    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }

    /// Command line with passwords and URI credentials masked
    pub fn masked(&self) -> String {
        let mut parts = vec![self.program.clone()];
        let mut mask_next = false;
        for arg in &self.args {
            if mask_next {
                parts.push("****".to_string());
                mask_next = false;
                continue;
            }
            parts.push(mask_arg(arg));
            mask_next = arg == "-a";
        }
        parts.join(" ")
    }
}

fn mask_arg(arg: &str) -> String {
    if let Some(rest) = arg.strip_prefix("--password=") {
        if !rest.is_empty() {
            return "--password=****".to_string();
        }
    }
    if arg.len() > 2 && arg.starts_with("-p") && !arg.starts_with("--") {
        return "-p****".to_string();
    }
    if let Some(uri) = arg.strip_prefix("--uri=") {
        return format!("--uri={}", mask_uri(uri));
    }
    if arg.contains("://") {
        return mask_uri(arg);
    }
    arg.to_string()
}

/// The configured database engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Postgres,
    Mongo,
    MySql { mariadb: bool },
    Redis,
}

impl Engine {
    pub fn from_kind(kind: EngineKind) -> Self {
        match kind {
            EngineKind::Pg => Engine::Postgres,
            EngineKind::Mongo => Engine::Mongo,
            EngineKind::Mysql => Engine::MySql { mariadb: false },
            EngineKind::Mariadb => Engine::MySql { mariadb: true },
            EngineKind::Redis => Engine::Redis,
        }
    }

    /// Stable engine key
    pub fn name(&self) -> &'static str {
        match self {
            Engine::Postgres => "pg",
            Engine::Mongo => "mongo",
            Engine::MySql { mariadb: false } => "mysql",
            Engine::MySql { mariadb: true } => "mariadb",
            Engine::Redis => "redis",
        }
    }

    /// Default dump tool for the given settings
    pub fn tool(&self, settings: &Settings) -> &'static str {
        match self {
            Engine::Postgres if settings.all_databases => "pg_dumpall",
            Engine::Postgres => "pg_dump",
            Engine::Mongo => "mongodump",
            Engine::MySql { .. } => "mysqldump",
            Engine::Redis => "redis-cli",
        }
    }

    /// Build the dump command. `output_dir` is only used in directory mode.
    pub fn dump_command(
        &self,
        settings: &Settings,
        mode: DumpMode,
        output_dir: &Path,
    ) -> Result<DumpCommand, EngineError> {
        match self {
            Engine::Postgres => postgres::dump_command(settings, mode, output_dir),
            Engine::Mongo => mongo::dump_command(settings, mode, output_dir),
            Engine::MySql { .. } => mysql::dump_command(self.name(), settings, mode, output_dir),
            Engine::Redis => redis::dump_command(settings, mode),
        }
    }

    pub fn default_extension(&self, compressed: bool) -> &'static str {
        match self {
            Engine::Postgres if compressed => ".dump",
            Engine::Postgres => ".sql",
            Engine::Mongo if compressed => ".archive.gz",
            Engine::Mongo => ".archive",
            Engine::MySql { .. } => ".sql",
            Engine::Redis => ".rdb",
        }
    }

    pub fn compression(&self) -> Compression {
        match self {
            Engine::Postgres => Compression::FormatToggle {
                on: "--format=custom",
                off: "--format=plain",
            },
            Engine::Mongo => Compression::Flag("--gzip"),
            Engine::MySql { .. } | Engine::Redis => Compression::Unsupported,
        }
    }

    /// Compression policy for the tool the settings select; pg_dumpall has none
    pub fn compression_for(&self, settings: &Settings) -> Compression {
        match self {
            Engine::Postgres if settings.all_databases => Compression::Unsupported,
            _ => self.compression(),
        }
    }

    /// Whether BACKUP_COMPRESS is meaningful for the given settings
    pub fn supports_compression(&self, settings: &Settings) -> bool {
        self.compression_for(settings) != Compression::Unsupported
    }

    /// Flag prefixes in DUMP_EXTRA_ARGS that break the given mode
    pub fn conflicting_flags(&self, mode: DumpMode) -> &'static [&'static str] {
        if mode != DumpMode::Stream {
            return &[];
        }
        match self {
            Engine::Postgres => &["--Fd", "--format=directory", "-Fd", "--file=", "-f"],
            Engine::Mongo => &["--out=", "-o"],
            Engine::MySql { .. } => &["--tab=", "--tab "],
            Engine::Redis => &[],
        }
    }

    /// Conflicting flags present in `extra_args`.
    ///
    /// A flag matches any argument it prefixes, so attached values such as
    /// `-f/tmp/out.sql` count. A trailing space means the flag must stand
    /// alone with its value in the next argument.
    pub fn find_conflicts(&self, mode: DumpMode, extra_args: &str) -> Vec<&'static str> {
        let args = shell_split(extra_args);
        self.conflicting_flags(mode)
            .iter()
            .copied()
            .filter(|flag| {
                args.iter().any(|arg| match flag.strip_suffix(' ') {
                    Some(standalone) => arg == standalone,
                    None => arg.starts_with(flag),
                })
            })
            .collect()
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Split a string into arguments, respecting single and double quotes
pub fn shell_split(s: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;

    for c in s.chars() {
        match c {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            c if c.is_whitespace() && !in_single && !in_double => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

/// Drop the database path from a URI, keeping credentials, host and query
pub fn strip_db_from_uri(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };
    let authority_start = rest.rfind('@').map(|at| at + 1).unwrap_or(0);
    let (authority, path) = match rest[authority_start..].find('/') {
        Some(slash) => rest.split_at(authority_start + slash),
        None => return uri.to_string(),
    };
    match path.split_once('?') {
        Some((_, query)) => format!("{}://{}/?{}", scheme, authority, query),
        None => format!("{}://{}/", scheme, authority),
    }
}

/// Host, port, user, password and database resolved from a URI or fields
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct Endpoint {
    pub host: Option<String>,
    pub port: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl Endpoint {
    /// Parse the URI when present, otherwise take the discrete fields
    pub fn resolve(settings: &Settings, engine: &'static str) -> Result<Self, EngineError> {
        let conn = &settings.connection;
        if let Some(uri) = conn.uri.as_deref() {
            let parsed = url::Url::parse(uri)?;
            let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
            return Ok(Self {
                host: parsed.host_str().and_then(non_empty),
                port: parsed.port().map(|p| p.to_string()),
                user: non_empty(&decode(parsed.username())),
                password: parsed.password().map(decode).and_then(|p| non_empty(&p)),
                database: non_empty(&decode(parsed.path().trim_start_matches('/'))),
            });
        }
        if conn.host.is_none() {
            return Err(EngineError::MissingConnection { engine });
        }
        Ok(Self {
            host: conn.host.clone(),
            port: conn.port.clone(),
            user: conn.user.clone(),
            password: conn.password.clone(),
            database: conn.name.clone(),
        })
    }
}

/// URL components come percent-encoded; dump tools want the raw text
fn decode(component: &str) -> String {
    percent_decode_str(component).decode_utf8_lossy().into_owned()
}

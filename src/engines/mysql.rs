//! MySQL and MariaDB via mysqldump
//!
//! mysqldump does not accept URIs, so a DB_URI is parsed into its parts.

use super::{DumpCommand, DumpMode, Endpoint, Engine, EngineError};
use crate::config::Settings;
use std::path::Path;

pub fn dump_command(
    engine: &'static str,
    settings: &Settings,
    mode: DumpMode,
    output_dir: &Path,
) -> Result<DumpCommand, EngineError> {
    let endpoint = Endpoint::resolve(settings, engine)?;
    let mut cmd = DumpCommand::for_settings(settings, "mysqldump");

    if let Some(host) = &endpoint.host {
        cmd.arg(format!("--host={}", host));
    }
    if let Some(port) = &endpoint.port {
        cmd.arg(format!("--port={}", port));
    }
    if let Some(user) = &endpoint.user {
        cmd.arg(format!("--user={}", user));
    }
    if let Some(password) = &endpoint.password {
        cmd.arg(format!("-p{}", password));
    }

    if mode == DumpMode::Directory {
        cmd.arg(format!("--tab={}", output_dir.display()));
    }

    cmd.apply_compression(Engine::MySql { mariadb: false }.compression(), settings.compress);

    cmd.extend_extra_args(&settings.dump_extra_args);

    if settings.all_databases {
        cmd.arg("--all-databases");
    } else {
        let name = endpoint
            .database
            .ok_or(EngineError::MissingDatabase { engine })?;
        cmd.arg(name);
    }
    Ok(cmd)
}

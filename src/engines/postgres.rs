//! PostgreSQL via pg_dump, or pg_dumpall when dumping every database

use super::{strip_db_from_uri, DumpCommand, DumpMode, Engine, EngineError};
use crate::config::{db_name_from_uri, Settings};
use std::path::Path;

const ENGINE: &str = "pg";

pub fn dump_command(
    settings: &Settings,
    mode: DumpMode,
    output_dir: &Path,
) -> Result<DumpCommand, EngineError> {
    if settings.all_databases {
        return dump_all_command(settings, mode);
    }

    let conn = &settings.connection;
    let mut cmd = DumpCommand::for_settings(settings, "pg_dump");

    match mode {
        DumpMode::Stream => {
            cmd.apply_compression(Engine::Postgres.compression_for(settings), settings.compress)
        }
        DumpMode::Directory => {
            cmd.arg("--format=directory")
                .arg(format!("--file={}", output_dir.display()));
        }
    }

    cmd.extend_extra_args(&settings.dump_extra_args);

    if let Some(uri) = conn.uri.as_deref() {
        if db_name_from_uri(uri).is_none() {
            return Err(EngineError::MissingDatabase { engine: ENGINE });
        }
        cmd.arg(uri);
        return Ok(cmd);
    }

    if conn.host.is_none() {
        return Err(EngineError::MissingConnection { engine: ENGINE });
    }
    let name = conn
        .name
        .as_deref()
        .ok_or(EngineError::MissingDatabase { engine: ENGINE })?;

    set_pg_env(&mut cmd, settings);
    cmd.env("PGDATABASE", Some(name));
    cmd.arg(name);
    Ok(cmd)
}

/// pg_dumpall only writes plain SQL to stdout
fn dump_all_command(settings: &Settings, mode: DumpMode) -> Result<DumpCommand, EngineError> {
    if mode != DumpMode::Stream {
        return Err(EngineError::UnsupportedMode {
            engine: "pg_dumpall",
            mode,
        });
    }
    let conn = &settings.connection;
    let mut cmd = DumpCommand::for_settings(settings, "pg_dumpall");
    cmd.apply_compression(Engine::Postgres.compression_for(settings), settings.compress);
    cmd.extend_extra_args(&settings.dump_extra_args);

    if let Some(uri) = conn.uri.as_deref() {
        cmd.arg("-d").arg(strip_db_from_uri(uri));
        return Ok(cmd);
    }
    if conn.host.is_none() {
        return Err(EngineError::MissingConnection { engine: ENGINE });
    }
    set_pg_env(&mut cmd, settings);
    Ok(cmd)
}

/// Connection for libpq, scoped to the child process
fn set_pg_env(cmd: &mut DumpCommand, settings: &Settings) {
    let conn = &settings.connection;
    cmd.env("PGHOST", conn.host.as_deref());
    cmd.env("PGPORT", conn.port.as_deref());
    cmd.env("PGUSER", conn.user.as_deref());
    cmd.env("PGPASSWORD", conn.password.as_deref());
}

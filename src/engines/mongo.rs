//! MongoDB via mongodump

use super::{strip_db_from_uri, DumpCommand, DumpMode, Engine, EngineError};
use crate::config::{db_name_from_uri, Settings};
use std::path::Path;

const ENGINE: &str = "mongo";

pub fn dump_command(
    settings: &Settings,
    mode: DumpMode,
    output_dir: &Path,
) -> Result<DumpCommand, EngineError> {
    let conn = &settings.connection;
    let mut cmd = DumpCommand::for_settings(settings, "mongodump");

    match mode {
        DumpMode::Stream => cmd.arg("--archive"),
        DumpMode::Directory => cmd.arg(format!("--out={}", output_dir.display())),
    };
    cmd.apply_compression(Engine::Mongo.compression(), settings.compress);

    if let Some(uri) = conn.uri.as_deref() {
        if settings.all_databases {
            cmd.arg(format!("--uri={}", strip_db_from_uri(uri)));
        } else {
            let name = db_name_from_uri(uri).ok_or(EngineError::MissingDatabase { engine: ENGINE })?;
            cmd.arg(format!("--uri={}", uri));
            cmd.arg(format!("--db={}", name));
        }
    } else {
        let host = conn
            .host
            .as_deref()
            .ok_or(EngineError::MissingConnection { engine: ENGINE })?;
        cmd.arg(format!("--host={}", host));
        if let Some(port) = &conn.port {
            cmd.arg(format!("--port={}", port));
        }
        if !settings.all_databases {
            let name = conn
                .name
                .as_deref()
                .ok_or(EngineError::MissingDatabase { engine: ENGINE })?;
            cmd.arg(format!("--db={}", name));
        }
        if let Some(user) = &conn.user {
            cmd.arg(format!("--username={}", user));
        }
        if let Some(password) = &conn.password {
            cmd.arg(format!("--password={}", password));
        }
        if !conn.auth_source.is_empty() {
            cmd.arg(format!("--authenticationDatabase={}", conn.auth_source));
        }
    }

    cmd.extend_extra_args(&settings.dump_extra_args);
    Ok(cmd)
}

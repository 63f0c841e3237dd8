//! Redis via `redis-cli --rdb -`. Only stream mode is supported.

use super::{DumpCommand, DumpMode, Endpoint, Engine, EngineError};
use crate::config::Settings;

const ENGINE: &str = "redis";

pub fn dump_command(settings: &Settings, mode: DumpMode) -> Result<DumpCommand, EngineError> {
    if mode != DumpMode::Stream {
        return Err(EngineError::UnsupportedMode { engine: ENGINE, mode });
    }

    let endpoint = Endpoint::resolve(settings, ENGINE)?;
    // redis://secret@host puts the password where the user would be
    let password = if settings.connection.uri.is_some() {
        endpoint.password.or(endpoint.user)
    } else {
        endpoint.password
    };

    let mut cmd = DumpCommand::for_settings(settings, "redis-cli");
    if let Some(host) = &endpoint.host {
        cmd.arg("-h").arg(host.as_str());
    }
    if let Some(port) = &endpoint.port {
        cmd.arg("-p").arg(port.as_str());
    }
    if let Some(password) = password {
        cmd.arg("-a").arg(password).arg("--no-auth-warning");
    }
    cmd.arg("--rdb").arg("-");
    cmd.apply_compression(Engine::Redis.compression(), settings.compress);

    cmd.extend_extra_args(&settings.dump_extra_args);
    Ok(cmd)
}

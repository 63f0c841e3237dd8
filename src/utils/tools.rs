//! Startup checks on external tools and dump flags
//!
//! Nothing here stops the process; each finding becomes a warning.

use crate::config::{BackupMode, Settings};
use crate::engines::{DumpMode, Engine};
use std::path::Path;

/// True when `program` is an existing path or resolves on `PATH`
pub fn tool_available(program: &str) -> bool {
    if program.contains(std::path::MAIN_SEPARATOR) {
        return Path::new(program).exists();
    }
    which::which(program).is_ok()
}

/// Dump mode the engine runs in for a backup mode
pub fn dump_mode_for(mode: BackupMode) -> DumpMode {
    match mode {
        BackupMode::Stream => DumpMode::Stream,
        BackupMode::Directory | BackupMode::Tar => DumpMode::Directory,
    }
}

/// Warnings about the configuration that do not prevent a run
pub fn advisories(settings: &Settings, engine: &Engine) -> Vec<String> {
    let mut warnings = Vec::new();

    let mode = dump_mode_for(settings.mode);
    for flag in engine.find_conflicts(mode, &settings.dump_extra_args) {
        warnings.push(format!(
            "DUMP_EXTRA_ARGS contains {:?}, which conflicts with {} mode for {}",
            flag.trim(),
            settings.mode,
            engine
        ));
    }

    if settings.compress && settings.mode != BackupMode::Tar && !engine.supports_compression(settings) {
        warnings.push(format!(
            "BACKUP_COMPRESS has no effect for {}: {} has no native compression",
            engine,
            engine.tool(settings)
        ));
    }

    warnings
}

/// Programs a run needs that cannot be found
pub fn missing_tools(settings: &Settings, engine: &Engine) -> Vec<String> {
    let dump = settings
        .dump_binary
        .as_ref()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| engine.tool(settings).to_string());

    [dump, settings.rclone.binary.clone()]
        .into_iter()
        .filter(|program| !tool_available(program))
        .collect()
}

//! Directory pipeline: dump → temp dir → rclone copy

use super::{naming, staging_dir, PipelineError, Upload};
use crate::config::Settings;
use crate::engines::{DumpMode, Engine};
use crate::utils::command::CapturedChild;
use crate::utils::rclone::Rclone;
use std::path::Path;
use std::process::Stdio;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub async fn execute(
    token: &CancellationToken,
    engine: &Engine,
    settings: &Settings,
) -> Result<Upload, PipelineError> {
    let rclone = Rclone::from_settings(&settings.rclone);
    let dirname = naming::resolve_dirname(settings, engine);
    let remote_path = format!("{}/", rclone.remote_path(&dirname));

    debug!("Starting directory pipeline to {}", remote_path);

    let staging = staging_dir(&settings.temp_dir, "dbstash-dir-")?;
    dump_to_dir(token, engine, settings, staging.path()).await?;

    debug!("Uploading {} with rclone copy", staging.path().display());
    rclone
        .copy(staging.path(), &remote_path, token)
        .await
        .map_err(PipelineError::remote)?;

    debug!("Directory pipeline completed");
    Ok(Upload {
        remote_path,
        size: 0,
    })
}

/// Run the engine's directory-mode dump into `dir`
pub(crate) async fn dump_to_dir(
    token: &CancellationToken,
    engine: &Engine,
    settings: &Settings,
    dir: &Path,
) -> Result<(), PipelineError> {
    let dump = engine.dump_command(settings, DumpMode::Directory, dir)?;
    debug!("Running dump: {}", dump.masked());

    let mut cmd = dump.to_command();
    cmd.stdin(Stdio::null()).stdout(Stdio::null());
    let child = CapturedChild::spawn(&mut cmd, dump.display_name()).map_err(PipelineError::dump)?;
    child.wait(token).await.map_err(PipelineError::dump)
}

//! Stream pipeline: dump stdout → rclone rcat

use super::{cleanup_partial, join_producer, killed_by_signal, naming, spawn_rcat, PipelineError, Upload};
use crate::config::Settings;
use crate::engines::{DumpCommand, DumpMode, Engine};
use crate::utils::command::CapturedChild;
use crate::utils::rclone::Rclone;
use std::io;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub async fn execute(
    token: &CancellationToken,
    engine: &Engine,
    settings: &Settings,
) -> Result<Upload, PipelineError> {
    let rclone = Rclone::from_settings(&settings.rclone);
    let filename = naming::resolve_filename(settings, engine);
    let remote_path = rclone.remote_path(&filename);

    debug!("Starting stream pipeline to {}", remote_path);

    let dump = engine.dump_command(settings, DumpMode::Stream, Path::new(""))?;
    debug!("Dump command: {}", dump.masked());

    if let Err(e) = transfer(token, &rclone, &dump, &remote_path).await {
        cleanup_partial(settings, &rclone, &remote_path).await;
        return Err(e);
    }

    let size = rclone.size_or_zero(&remote_path, token).await;
    debug!("Stream pipeline completed ({} bytes)", size);
    Ok(Upload { remote_path, size })
}

/// Run the dump with its stdout relayed into `rclone rcat`.
///
/// rclone starts first. The dump is waited first, then the relay drains and
/// closes rclone's stdin, then rclone is waited.
async fn transfer(
    token: &CancellationToken,
    rclone: &Rclone,
    dump: &DumpCommand,
    remote_path: &str,
) -> Result<(), PipelineError> {
    let (rcat, mut stdin) = spawn_rcat(rclone, remote_path)?;

    let mut dump_cmd = dump.to_command();
    dump_cmd.stdin(Stdio::null()).stdout(Stdio::piped());
    let mut dumper = match CapturedChild::spawn(&mut dump_cmd, dump.display_name()) {
        Ok(child) => child,
        Err(e) => {
            drop(stdin);
            let _ = rcat.wait(token).await;
            return Err(PipelineError::dump(e));
        }
    };
    let mut stdout = dumper.child_mut().stdout.take().ok_or_else(|| {
        PipelineError::Relay(io::Error::new(io::ErrorKind::BrokenPipe, "dump stdout unavailable"))
    })?;

    let relay = tokio::spawn(async move {
        let copied = tokio::io::copy(&mut stdout, &mut stdin).await?;
        stdin.shutdown().await?;
        Ok::<_, io::Error>(copied)
    });

    let dump_result = dumper.wait(token).await;
    debug!("Dump process finished: {:?}", dump_result.as_ref().err());
    let relay_result = join_producer(relay, token).await;
    let rcat_result = rcat.wait(token).await;
    debug!("rclone process finished: {:?}", rcat_result.as_ref().err());

    if token.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    match (dump_result, rcat_result) {
        (Err(dump_err), Err(rcat_err)) if killed_by_signal(&dump_err) => {
            Err(PipelineError::upload("rcat", rcat_err))
        }
        (Err(dump_err), _) => Err(PipelineError::dump(dump_err)),
        (Ok(()), Err(rcat_err)) => Err(PipelineError::upload("rcat", rcat_err)),
        (Ok(()), Ok(())) => relay_result.map(|copied| {
            debug!("Relayed {} bytes to rclone", copied);
        }).map_err(PipelineError::Relay),
    }
}

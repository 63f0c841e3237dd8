//! Tar pipeline: dump → temp dir → tar stream → rclone rcat

use super::directory::dump_to_dir;
use super::{cleanup_partial, join_producer, naming, spawn_rcat, staging_dir, PipelineError, Upload};
use crate::config::Settings;
use crate::engines::Engine;
use crate::utils::rclone::Rclone;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tokio_util::io::SyncIoBridge;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub async fn execute(
    token: &CancellationToken,
    engine: &Engine,
    settings: &Settings,
) -> Result<Upload, PipelineError> {
    let rclone = Rclone::from_settings(&settings.rclone);
    let extension = if settings.compress { ".tar.gz" } else { ".tar" };
    let filename = naming::with_extension(naming::resolve_dirname(settings, engine), extension);
    let remote_path = rclone.remote_path(&filename);

    debug!("Starting tar pipeline to {}", remote_path);

    let staging = staging_dir(&settings.temp_dir, "dbstash-tar-")?;
    dump_to_dir(token, engine, settings, staging.path()).await?;

    if let Err(e) = upload_archive(token, &rclone, staging.path(), settings.compress, &remote_path).await {
        cleanup_partial(settings, &rclone, &remote_path).await;
        return Err(e);
    }

    let size = rclone.size_or_zero(&remote_path, token).await;
    debug!("Tar pipeline completed ({} bytes)", size);
    Ok(Upload { remote_path, size })
}

/// Stream a tar archive of `dir` into `rclone rcat`
async fn upload_archive(
    token: &CancellationToken,
    rclone: &Rclone,
    dir: &Path,
    compress: bool,
    remote_path: &str,
) -> Result<(), PipelineError> {
    let (rcat, stdin) = spawn_rcat(rclone, remote_path)?;

    let bridge = SyncIoBridge::new(stdin);
    let source = dir.to_path_buf();
    let archiver = tokio::task::spawn_blocking(move || write_archive(source, compress, bridge));

    let archive_result = join_producer(archiver, token).await;
    let rcat_result = rcat.wait(token).await;

    if token.is_cancelled() {
        return Err(PipelineError::Cancelled);
    }

    match (archive_result, rcat_result) {
        (_, Err(rcat_err)) => Err(PipelineError::upload("rcat", rcat_err)),
        (Err(archive_err), Ok(())) => Err(PipelineError::Archive(archive_err)),
        (Ok(()), Ok(())) => Ok(()),
    }
}

/// Write the archive and close the writer so rclone sees EOF
fn write_archive<W>(dir: PathBuf, compress: bool, mut bridge: SyncIoBridge<W>) -> io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    if compress {
        let encoder = GzEncoder::new(&mut bridge, Compression::default());
        append_dir(&dir, encoder)?.finish()?;
    } else {
        append_dir(&dir, &mut bridge)?;
    }
    bridge.flush()?;
    bridge.shutdown()
}

/// Archive the contents of `dir` with paths relative to it
pub fn append_dir<W: Write>(dir: &Path, writer: W) -> io::Result<W> {
    let mut builder = ::tar::Builder::new(writer);
    builder.follow_symlinks(false);
    builder.append_dir_all(".", dir)?;
    builder.into_inner()
}

//! Test fixtures and sample data
//!
//! Fake external tools are small `sh` scripts. The fake rclone maps any
//! `name:path` remote onto `<context>/remote/path` and records every call in
//! `<context>/remote/.calls`.

use crate::test_context::TestContext;
use chrono::{Duration, Utc};
use clap::Parser;
use dbstash::config::SettingsArgs;
use dbstash::utils::rclone::RemoteEntry;
use std::fs;
use std::path::{Path, PathBuf};

/// Write an executable `sh` script named `name` into `dir`
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write script");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to make script executable");
    }
    path
}

/// Fake rclone supporting rcat, copy, size, lsjson, deletefile and purge
pub fn fake_rclone(ctx: &TestContext) -> PathBuf {
    let root = ctx.remote_root();
    let body = format!(
        r#"ROOT='{root}'
echo "$*" >> "$ROOT/.calls"
sub="$1"; shift
target() {{ printf '%s/%s' "$ROOT" "${{1#*:}}"; }}
case "$sub" in
  rcat)
    t="$(target "$1")"
    mkdir -p "$(dirname "$t")"
    cat > "$t" ;;
  copy)
    t="$(target "$2")"
    mkdir -p "$t"
    cp -R "$1"/. "$t" ;;
  size)
    t="$(target "$1")"
    [ -f "$t" ] || {{ echo "object not found" >&2; exit 3; }}
    printf '{{"count":1,"bytes":%s}}\n' "$(wc -c < "$t" | tr -d ' ')" ;;
  lsjson)
    printf '[]\n' ;;
  deletefile)
    rm -f "$(target "$1")" ;;
  purge)
    rm -rf "$(target "$1")" ;;
  *)
    echo "unsupported subcommand $sub" >&2
    exit 1 ;;
esac"#,
        root = root.display()
    );
    write_script(ctx.temp_dir(), "fake-rclone", &body)
}

/// Fake rclone whose uploads always fail after draining stdin
pub fn failing_rclone(ctx: &TestContext) -> PathBuf {
    let root = ctx.remote_root();
    let body = format!(
        r#"echo "$*" >> '{root}/.calls'
case "$1" in
  rcat) cat > /dev/null; echo "Failed to rcat: access denied" >&2; exit 1 ;;
  copy) echo "Failed to copy: access denied" >&2; exit 1 ;;
  *) exit 0 ;;
esac"#,
        root = root.display()
    );
    write_script(ctx.temp_dir(), "failing-rclone", &body)
}

/// Dump script writing `content` to stdout
pub fn stream_dump_body(content: &str) -> String {
    format!("printf '%s' '{}'", content)
}

/// Dump script writing `toc.dat` into whatever output directory it is given
/// (`--file=`, `--out=` or `--tab=`)
pub fn directory_dump_body() -> &'static str {
    r#"for arg in "$@"; do
  case "$arg" in
    --file=*|--out=*|--tab=*)
      dir="${arg#*=}"
      mkdir -p "$dir"
      printf 'table data' > "$dir/toc.dat"
      mkdir -p "$dir/blobs"
      printf 'blob' > "$dir/blobs/1.dat" ;;
  esac
done"#
}

/// Dump script failing with a message on stderr
pub fn failing_dump_body(message: &str) -> String {
    format!("echo '{}' >&2\nexit 1", message)
}

/// Dump script that never finishes on its own
pub fn hanging_dump_body() -> &'static str {
    "exec sleep 30"
}

/// A remote listing entry last modified `age_days` ago
pub fn remote_entry(name: &str, age_days: i64, is_dir: bool) -> RemoteEntry {
    RemoteEntry {
        path: name.to_string(),
        name: name.to_string(),
        size: if is_dir { -1 } else { 1024 },
        mod_time: Utc::now() - Duration::days(age_days),
        is_dir,
    }
}

/// `count` daily backups, the newest one day old
pub fn daily_entries(count: i64) -> Vec<RemoteEntry> {
    (1..=count)
        .map(|age| remote_entry(&format!("app-{:02}.sql", age), age, false))
        .collect()
}

#[derive(Parser)]
struct ArgsHarness {
    #[command(flatten)]
    args: SettingsArgs,
}

/// Parse settings flags the way the binary does
pub fn parse_args(flags: &[&str]) -> Result<SettingsArgs, clap::Error> {
    let argv = std::iter::once("dbstash").chain(flags.iter().copied());
    ArgsHarness::try_parse_from(argv).map(|h| h.args)
}

/// An empty rclone.conf inside the context
pub fn rclone_conf(ctx: &TestContext) -> PathBuf {
    ctx.write_file("rclone.conf", "[fake]\ntype = local\n")
}

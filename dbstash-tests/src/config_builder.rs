//! Fluent API for building test settings
//!
//! Starts from the CLI defaults and lets tests override only what they
//! exercise.

use crate::fixtures::{fake_rclone, write_script};
use crate::test_context::TestContext;
use dbstash::config::{BackupMode, EngineKind, RetentionLimits, Schedule, Settings};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating test settings
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    /// Defaults: Postgres on localhost, database `app`, stream mode
    pub fn new() -> Self {
        Self {
            settings: Settings::default(),
        }
    }

    /// Defaults with staging and a fake rclone inside the context's temp dir.
    ///
    /// Uploads land under `ctx.remote_root()`; the remote is `fake:backups`.
    pub fn for_context(ctx: &TestContext) -> Self {
        Self::new()
            .temp_dir(ctx.work_dir())
            .rclone_binary(fake_rclone(ctx))
            .remote("fake:backups")
    }

    pub fn engine(mut self, engine: EngineKind) -> Self {
        self.settings.engine = engine;
        self
    }

    pub fn uri(mut self, uri: &str) -> Self {
        self.settings.connection.uri = Some(uri.to_string());
        self
    }

    pub fn host(mut self, host: &str) -> Self {
        self.settings.connection.host = Some(host.to_string());
        self
    }

    pub fn no_host(mut self) -> Self {
        self.settings.connection.host = None;
        self
    }

    pub fn port(mut self, port: &str) -> Self {
        self.settings.connection.port = Some(port.to_string());
        self
    }

    pub fn database(mut self, name: &str) -> Self {
        self.settings.connection.name = Some(name.to_string());
        self
    }

    pub fn no_database(mut self) -> Self {
        self.settings.connection.name = None;
        self
    }

    pub fn credentials(mut self, user: &str, password: &str) -> Self {
        self.settings.connection.user = Some(user.to_string());
        self.settings.connection.password = Some(password.to_string());
        self
    }

    /// Username without a password
    pub fn user(mut self, user: &str) -> Self {
        self.settings.connection.user = Some(user.to_string());
        self
    }

    pub fn all_databases(mut self, all: bool) -> Self {
        self.settings.all_databases = all;
        self
    }

    pub fn mode(mut self, mode: BackupMode) -> Self {
        self.settings.mode = mode;
        self
    }

    pub fn compress(mut self, compress: bool) -> Self {
        self.settings.compress = compress;
        self
    }

    pub fn extension(mut self, extension: &str) -> Self {
        self.settings.extension = Some(extension.to_string());
        self
    }

    pub fn template(mut self, template: &str) -> Self {
        self.settings.name_template = template.to_string();
        self
    }

    pub fn extra_args(mut self, args: &str) -> Self {
        self.settings.dump_extra_args = args.to_string();
        self
    }

    pub fn temp_dir(mut self, dir: PathBuf) -> Self {
        self.settings.temp_dir = dir;
        self
    }

    pub fn dump_binary(mut self, path: &Path) -> Self {
        self.settings.dump_binary = Some(path.to_path_buf());
        self
    }

    /// Use a shell script with the given body as the dump tool
    pub fn dump_script(self, ctx: &TestContext, body: &str) -> Self {
        let script = write_script(ctx.temp_dir(), "fake-dump", body);
        self.dump_binary(&script)
    }

    pub fn rclone_binary(mut self, path: PathBuf) -> Self {
        self.settings.rclone.binary = path.to_string_lossy().into_owned();
        self
    }

    pub fn remote(mut self, remote: &str) -> Self {
        self.settings.rclone.remote = remote.to_string();
        self
    }

    pub fn retention(mut self, max_files: u32, max_days: u32) -> Self {
        self.settings.retention = RetentionLimits { max_files, max_days };
        self
    }

    pub fn hooks(mut self, pre: &str, post: &str) -> Self {
        self.settings.hooks.pre_backup = pre.to_string();
        self.settings.hooks.post_backup = post.to_string();
        self
    }

    pub fn lock(mut self, lock: bool) -> Self {
        self.settings.lock = lock;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = Some(timeout);
        self
    }

    pub fn cleanup_partial(mut self, cleanup: bool) -> Self {
        self.settings.cleanup_partial = cleanup;
        self
    }

    pub fn schedule(mut self, schedule: Schedule) -> Self {
        self.settings.schedule = schedule;
        self
    }

    pub fn build(self) -> Settings {
        self.settings
    }

    pub fn build_arc(self) -> Arc<Settings> {
        Arc::new(self.settings)
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

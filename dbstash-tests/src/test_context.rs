//! Per-test scratch space
//!
//! Holds the fake tools, the staging root and the directory the fake rclone
//! uploads into. Everything is removed when the context is dropped.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestContext {
    root: TempDir,
}

impl TestContext {
    pub fn new() -> Self {
        let root = TempDir::new().expect("temp dir");
        std::fs::create_dir_all(root.path().join("remote")).expect("remote root");
        Self { root }
    }

    pub fn temp_dir(&self) -> &Path {
        self.root.path()
    }

    /// Where the fake rclone stores uploads
    pub fn remote_root(&self) -> PathBuf {
        self.root.path().join("remote")
    }

    /// Local path of an object on the fake remote (`fake:backups/x` → `remote/backups/x`)
    pub fn remote_file(&self, remote_path: &str) -> PathBuf {
        let relative = remote_path.split_once(':').map(|(_, p)| p).unwrap_or(remote_path);
        self.remote_root().join(relative.trim_start_matches('/'))
    }

    /// Arguments of every fake rclone invocation, in order
    pub fn rclone_calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.remote_root().join(".calls"))
            .map(|calls| calls.lines().map(String::from).collect())
            .unwrap_or_default()
    }

    /// Staging root for pipelines; created on first use
    pub fn work_dir(&self) -> PathBuf {
        let dir = self.root.path().join("work");
        std::fs::create_dir_all(&dir).expect("work dir");
        dir
    }

    /// Write `content` to `name` below the context root
    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.root.path().join(name);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).expect("parent dir");
        }
        std::fs::write(&path, content).expect("write file");
        path
    }

    /// Entries left behind in a staging root
    pub fn staging_leftovers(&self, root: &Path) -> usize {
        std::fs::read_dir(root).map(|entries| entries.count()).unwrap_or(0)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Assertions on fallible results, with the error's message in the panic
pub trait ResultAssertions<T> {
    fn assert_ok(self) -> T;

    /// Panics unless this is an error whose message contains `needle`
    fn assert_err_contains(self, needle: &str);
}

impl<T: std::fmt::Debug, E: std::fmt::Display> ResultAssertions<T> for Result<T, E> {
    fn assert_ok(self) -> T {
        self.unwrap_or_else(|e| panic!("unexpected error: {}", e))
    }

    fn assert_err_contains(self, needle: &str) {
        match self {
            Ok(value) => panic!("expected an error mentioning {:?}, got {:?}", needle, value),
            Err(e) => {
                let message = e.to_string();
                assert!(message.contains(needle), "{:?} not found in {:?}", needle, message);
            }
        }
    }
}

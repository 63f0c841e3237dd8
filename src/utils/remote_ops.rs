//! Remote storage abstraction for testability
//!
//! Retention talks to the remote through [`RemoteStore`] so tests can run
//! against an in-memory listing.

use super::rclone::{Rclone, RemoteEntry, RemoteError};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Listing and deletion on the backup remote
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// List entries at the top level of the remote
    async fn list(&self, token: &CancellationToken) -> Result<Vec<RemoteEntry>, RemoteError>;

    /// Delete a single object
    async fn delete_file(&self, path: &str, token: &CancellationToken) -> Result<(), RemoteError>;

    /// Delete a directory and everything under it
    async fn purge(&self, path: &str, token: &CancellationToken) -> Result<(), RemoteError>;

    /// Full remote path of an entry path relative to the remote root
    fn entry_path(&self, entry_path: &str) -> String;
}

#[async_trait]
impl RemoteStore for Rclone {
    async fn list(&self, token: &CancellationToken) -> Result<Vec<RemoteEntry>, RemoteError> {
        self.lsjson(token).await
    }

    async fn delete_file(&self, path: &str, token: &CancellationToken) -> Result<(), RemoteError> {
        Rclone::delete_file(self, path, token).await
    }

    async fn purge(&self, path: &str, token: &CancellationToken) -> Result<(), RemoteError> {
        Rclone::purge(self, path, token).await
    }

    fn entry_path(&self, entry_path: &str) -> String {
        self.remote_path(entry_path)
    }
}

/// Mock implementation for testing
#[allow(dead_code)]
pub mod mock {
    use super::*;
    use crate::utils::command::ProcessError;
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    /// Recorded deletion
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum Deletion {
        File(String),
        Purge(String),
    }

    #[derive(Clone, Default)]
    pub struct MockRemote {
        entries: Arc<Mutex<Vec<RemoteEntry>>>,
        failing_paths: Arc<Mutex<HashSet<String>>>,
        fail_list: Arc<Mutex<bool>>,
        list_calls: Arc<Mutex<usize>>,
        pub deletions: Arc<Mutex<Vec<Deletion>>>,
    }

    impl MockRemote {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_entries(entries: Vec<RemoteEntry>) -> Self {
            let remote = Self::default();
            *remote.entries.lock().unwrap() = entries;
            remote
        }

        /// Make deleting the given entry path fail
        pub fn fail_on(self, entry_path: &str) -> Self {
            self.failing_paths
                .lock()
                .unwrap()
                .insert(format!("remote:{}", entry_path));
            self
        }

        /// Make listing fail
        pub fn fail_listing(self) -> Self {
            *self.fail_list.lock().unwrap() = true;
            self
        }

        pub fn list_calls(&self) -> usize {
            *self.list_calls.lock().unwrap()
        }

        pub fn get_deletions(&self) -> Vec<Deletion> {
            self.deletions.lock().unwrap().clone()
        }

        fn failure(operation: &'static str, path: &str) -> RemoteError {
            RemoteError::Command {
                operation,
                source: ProcessError::Io {
                    program: "rclone".to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::Other, format!("mock failure for {}", path)),
                },
            }
        }

        fn record(&self, deletion: Deletion, path: &str, operation: &'static str) -> Result<(), RemoteError> {
            if self.failing_paths.lock().unwrap().contains(path) {
                return Err(Self::failure(operation, path));
            }
            self.deletions.lock().unwrap().push(deletion);
            Ok(())
        }
    }

    #[async_trait]
    impl RemoteStore for MockRemote {
        async fn list(&self, _token: &CancellationToken) -> Result<Vec<RemoteEntry>, RemoteError> {
            *self.list_calls.lock().unwrap() += 1;
            if *self.fail_list.lock().unwrap() {
                return Err(Self::failure("lsjson", "remote:"));
            }
            Ok(self.entries.lock().unwrap().clone())
        }

        async fn delete_file(&self, path: &str, _token: &CancellationToken) -> Result<(), RemoteError> {
            self.record(Deletion::File(path.to_string()), path, "deletefile")
        }

        async fn purge(&self, path: &str, _token: &CancellationToken) -> Result<(), RemoteError> {
            self.record(Deletion::Purge(path.to_string()), path, "purge")
        }

        fn entry_path(&self, entry_path: &str) -> String {
            format!("remote:{}", entry_path)
        }
    }
}

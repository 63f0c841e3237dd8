//! Test utilities for dbstash
//!
//! Shared helpers for the `unit` and `commands` test targets: a settings
//! builder, fake dump tools and a fake rclone backed by a local directory,
//! and a temp-dir test context.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{SettingsBuilder, TestContext};
//!
//! #[tokio::test]
//! async fn my_test() {
//!     let ctx = TestContext::new();
//!     let settings = SettingsBuilder::for_context(&ctx)
//!         .dump_script(&ctx, "printf data")
//!         .build();
//!     // ... test code
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::SettingsBuilder;
pub use fixtures::*;
pub use test_context::{ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use dbstash::config::{BackupMode, EngineKind, Settings, SettingsArgs};
pub use dbstash::engines::Engine;
pub use dbstash::utils::rclone::RemoteEntry;

// Re-export mock implementations from the main crate
pub use dbstash::managers::hooks::mock::{HookCall, MockHooks};
pub use dbstash::managers::notification::mock::MockNotifier;
pub use dbstash::pipeline::mock::MockPipeline;
pub use dbstash::utils::remote_ops::mock::{Deletion, MockRemote};

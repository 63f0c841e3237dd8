//! dbstash library
//!
//! Scheduled database dumps uploaded to any rclone remote, with retention,
//! hooks, webhook notifications and a health endpoint.

pub mod config;
pub mod engines;
pub mod managers;
pub mod pipeline;
pub mod utils;

// Re-export commonly used types
pub use config::{load_settings, Settings, SettingsArgs};
pub use engines::Engine;
pub use managers::backup::{BackupManager, Collaborators, RunError, RunResult, RunStatus};
pub use managers::health::{HealthSink, HealthTracker};
pub use managers::logging::{init_logging, LogGuard};
pub use managers::scheduler::Scheduler;
pub use pipeline::{BackupPipeline, Pipeline, PipelineError, Upload};

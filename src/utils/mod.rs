pub mod command;
pub mod cron;
pub mod locker;
pub mod rclone;
pub mod tools;

// Trait-based abstraction for testability
pub mod remote_ops;

// Re-export commonly used types and traits (used by test crate)
pub use rclone::{Rclone, RemoteEntry, RemoteError};
pub use remote_ops::RemoteStore;

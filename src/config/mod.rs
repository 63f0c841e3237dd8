//! Configuration module for dbstash
//!
//! Settings come from command-line flags with environment variable
//! fallbacks. Secrets may be supplied through `_FILE` variants (Docker
//! secrets), which take precedence over the plain value.
//!
//! ## Example Usage
//!
//! ```no_run
//! use clap::Parser;
//! use dbstash::config::{self, SettingsArgs};
//!
//! #[derive(Parser)]
//! struct Cli {
//!     #[command(flatten)]
//!     args: SettingsArgs,
//! }
//!
//! let cli = Cli::parse();
//! let settings = config::load_settings(cli.args, None)?;
//! println!("Backing up {} to {}", settings.db_name_or_default(), settings.rclone.remote);
//! # Ok::<(), config::ConfigError>(())
//! ```

pub mod args;
mod loader;
mod types;

pub use args::SettingsArgs;
pub use loader::{
    db_name_from_uri, load_settings, parse_schedule, parse_timeout, resolve_rclone_config,
    ConfigError, Result, DEFAULT_RCLONE_CONFIG,
};
pub use types::*;

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

/// Mask the password portion of a connection URI for logging
pub fn mask_uri(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };
    let Some(at) = rest.rfind('@') else {
        return uri.to_string();
    };
    let (userinfo, host) = rest.split_at(at);
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{}://{}:****{}", scheme, user, host),
        None => uri.to_string(),
    }
}

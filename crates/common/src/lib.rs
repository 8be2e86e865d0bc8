//! Juju Common Library
//!
//! Domain types, the controller client interface and a local controller
//! shared by the Juju Terraform provider.

pub mod client;
pub mod constraints;
pub mod error;
pub mod local;
pub mod names;
pub mod ssh;
pub mod types;

// Re-export commonly used types
pub use client::JujuClient;
pub use constraints::{Constraints, ConstraintsError};
pub use error::{Error, Result};
pub use local::{LocalController, Login};
pub use types::*;

/// Provider version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default directory for local controller state
pub fn default_state_dir() -> std::path::PathBuf {
    if let Some(dir) = std::env::var_os("JUJU_PROVIDER_STATE_DIR") {
        return std::path::PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".local/share/terraform-provider-juju")
}

/// Juju CLI data directory (`$JUJU_DATA`, else `~/.local/share/juju`)
pub fn juju_data_dir() -> std::path::PathBuf {
    if let Some(dir) = std::env::var_os("JUJU_DATA") {
        return std::path::PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".local/share/juju")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}

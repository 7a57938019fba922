// src/config.rs

//! Run configuration and shared constants

use crate::error::{Error, Result};
use std::time::Duration;

/// Export envelope version tag
pub const EXPORT_VERSION: u64 = 1;

/// Export envelope sentinel ("NIXE" little-endian)
pub const EXPORT_MAGIC: u64 = 0x4558_494e;

/// Default editor when $EDITOR is unset
pub const DEFAULT_EDITOR: &str = "vim";

/// Default wall-clock deadline for one run
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Archive buffers larger than this are never retained by the cache
pub const MAX_CACHED_ARCHIVE_BYTES: usize = 10 * 1024 * 1024;

/// Prefix for the editing workspace temp directory
pub const TEMP_DIR_PREFIX: &str = "nix-patch-";

/// Prefix for per-node extraction temp directories during rewrite
pub const REWRITE_TEMP_PREFIX: &str = "nix-patch-rewrite-";

/// Configuration for one nix-patch run
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to edit (store path, or a file inside one)
    pub path: String,

    /// Editor command; may contain arguments ("vim -n")
    pub editor: String,

    /// Wall-clock deadline for the rewrite run
    pub timeout: Duration,

    /// Plan the rewrite without importing anything
    pub dry_run: bool,

    /// Verbose logging
    pub verbose: bool,

    /// Permit risky edits (binary targets)
    pub force: bool,

    /// System type override ("nixos", "home-manager", "profile")
    pub system_type: String,

    /// Custom profile path (used with system_type = "profile")
    pub profile_path: String,

    /// Custom activation command; empty uses the system default
    pub activation_command: String,

    /// Root directory for the store; empty means the system /nix
    pub store_root: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: String::new(),
            editor: DEFAULT_EDITOR.to_string(),
            timeout: DEFAULT_TIMEOUT,
            dry_run: false,
            verbose: false,
            force: false,
            system_type: String::new(),
            profile_path: String::new(),
            activation_command: String::new(),
            store_root: String::new(),
        }
    }
}

impl Config {
    /// Check that the required inputs are present.
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(Error::Config("path is required".to_string()));
        }
        if self.editor.is_empty() {
            return Err(Error::Config("editor is required".to_string()));
        }
        Ok(())
    }
}

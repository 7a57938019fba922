// src/system/profile.rs

//! Plain Nix profile support
//!
//! Used for user profiles (~/.nix-profile) and for any profile path the
//! user names explicitly with --profile. Activation points the profile at
//! the new closure with `nix-env --set`.

use crate::error::{Error, Result};
use crate::system::{run_activation, System, SystemKind};
use std::fs;
use std::path::PathBuf;

/// A profile symlink pointing at the current closure
#[derive(Debug)]
pub struct Profile {
    profile_path: PathBuf,
}

impl Profile {
    pub fn new(profile_path: PathBuf) -> Self {
        Self { profile_path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.profile_path
    }
}

impl System for Profile {
    fn kind(&self) -> SystemKind {
        SystemKind::Profile
    }

    fn closure_path(&self) -> Result<String> {
        let resolved = fs::canonicalize(&self.profile_path).map_err(|e| {
            Error::System(format!(
                "resolving profile {}: {}",
                self.profile_path.display(),
                e
            ))
        })?;
        Ok(resolved.display().to_string())
    }

    fn default_command(&self, closure: &str) -> Vec<String> {
        vec![
            "nix-env".to_string(),
            "--profile".to_string(),
            self.profile_path.display().to_string(),
            "--set".to_string(),
            closure.to_string(),
        ]
    }

    fn apply(&self, closure: &str, custom: &str) -> Result<()> {
        run_activation(
            custom,
            &self.default_command(closure),
            closure,
            Some(&self.profile_path.display().to_string()),
        )
    }

    fn available(&self) -> bool {
        self.profile_path.symlink_metadata().is_ok()
    }
}

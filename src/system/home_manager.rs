// src/system/home_manager.rs

//! home-manager support

use crate::error::{Error, Result};
use crate::system::{run_activation, System, SystemKind};
use std::fs;
use std::path::PathBuf;

/// A home-manager managed user environment
#[derive(Debug, Default)]
pub struct HomeManager;

impl HomeManager {
    /// Profile symlinks home-manager generations may live behind.
    fn profile_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Some(home) = std::env::var_os("HOME") {
            candidates.push(PathBuf::from(&home).join(".nix-profile"));
        }
        if let Ok(user) = std::env::var("USER") {
            if !user.is_empty() {
                candidates.push(PathBuf::from(format!(
                    "/nix/var/nix/profiles/per-user/{}/home-manager",
                    user
                )));
            }
        }
        candidates
    }
}

impl System for HomeManager {
    fn kind(&self) -> SystemKind {
        SystemKind::HomeManager
    }

    fn closure_path(&self) -> Result<String> {
        for candidate in Self::profile_candidates() {
            if candidate.symlink_metadata().is_ok() {
                if let Ok(resolved) = fs::canonicalize(&candidate) {
                    return Ok(resolved.display().to_string());
                }
            }
        }
        Err(Error::System(
            "failed to find a home-manager profile".to_string(),
        ))
    }

    fn default_command(&self, closure: &str) -> Vec<String> {
        vec![
            "home-manager".to_string(),
            "switch".to_string(),
            "-I".to_string(),
            format!("home-manager-config={}", closure),
        ]
    }

    fn apply(&self, closure: &str, custom: &str) -> Result<()> {
        run_activation(custom, &self.default_command(closure), closure, None)
    }

    fn available(&self) -> bool {
        which("home-manager")
    }
}

/// Minimal PATH lookup for a command name.
fn which(name: &str) -> bool {
    let Some(path_var) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path_var).any(|dir| dir.join(name).is_file())
}

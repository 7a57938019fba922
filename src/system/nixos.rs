// src/system/nixos.rs

//! NixOS system support

use crate::error::{Error, Result};
use crate::system::{run_activation, System, SystemKind};
use std::fs;

/// A NixOS machine; the current closure lives at /run/current-system
#[derive(Debug, Default)]
pub struct NixOs;

impl System for NixOs {
    fn kind(&self) -> SystemKind {
        SystemKind::NixOs
    }

    fn closure_path(&self) -> Result<String> {
        let resolved = fs::canonicalize("/run/current-system")
            .map_err(|e| Error::System(format!("resolving /run/current-system: {}", e)))?;
        Ok(resolved.display().to_string())
    }

    fn default_command(&self, _closure: &str) -> Vec<String> {
        // Safe test activation; a switch is left to the user
        ["nixos-rebuild", "test", "--use-remote-sudo"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn apply(&self, closure: &str, custom: &str) -> Result<()> {
        run_activation(custom, &self.default_command(closure), closure, None)
    }

    fn available(&self) -> bool {
        cfg!(target_os = "linux") && is_nixos_from_release()
    }
}

/// NixOS identifies itself in /etc/lsb-release.
fn is_nixos_from_release() -> bool {
    match fs::read_to_string("/etc/lsb-release") {
        Ok(content) => {
            content.contains("DISTRIB_ID=NixOS") || content.contains("DISTRIB_ID=\"NixOS\"")
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_test_mode() {
        let cmd = NixOs.default_command("/nix/store/abc-system");
        assert_eq!(cmd[0], "nixos-rebuild");
        assert_eq!(cmd[1], "test");
    }
}

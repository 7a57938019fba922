// src/system/mod.rs

//! System-type abstraction for post-rewrite activation
//!
//! After the closure has been rewritten the new root has to be activated
//! somewhere: a NixOS generation, a home-manager profile, or a plain user
//! profile. Each implementation knows its current closure path, its default
//! activation command, and how to run a custom one with `{path}` and
//! `{profile}` substituted.

pub mod home_manager;
pub mod nixos;
pub mod profile;

pub use home_manager::HomeManager;
pub use nixos::NixOs;
pub use profile::Profile;

use crate::error::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// Known system types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemKind {
    NixOs,
    HomeManager,
    Profile,
}

impl fmt::Display for SystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NixOs => write!(f, "nixos"),
            Self::HomeManager => write!(f, "home-manager"),
            Self::Profile => write!(f, "profile"),
        }
    }
}

/// A Nix-based system that owns a closure and can activate a new one
pub trait System {
    /// Which kind of system this is.
    fn kind(&self) -> SystemKind;

    /// The current closure root (profile symlinks resolved).
    fn closure_path(&self) -> Result<String>;

    /// The default activation command for a new closure.
    fn default_command(&self, closure: &str) -> Vec<String>;

    /// Activate `closure`; an empty `custom` uses the default command.
    fn apply(&self, closure: &str, custom: &str) -> Result<()>;

    /// Whether this system type is present on the current machine.
    fn available(&self) -> bool;
}

/// Detect the system type, falling back to the user profile.
pub fn detect() -> Result<Box<dyn System>> {
    let nixos = NixOs;
    if nixos.available() {
        return Ok(Box::new(nixos));
    }
    let hm = HomeManager;
    if hm.available() {
        return Ok(Box::new(hm));
    }

    let user_profile = user_profile_path();
    if let Some(path) = user_profile {
        return Ok(Box::new(Profile::new(path)));
    }

    Err(Error::System(
        "no supported Nix system detected and no user profile found".to_string(),
    ))
}

/// Resolve a system type override from the CLI.
pub fn by_type(system_type: &str, profile_path: &str) -> Result<Box<dyn System>> {
    match system_type {
        "nixos" => Ok(Box::new(NixOs)),
        "home-manager" => Ok(Box::new(HomeManager)),
        "profile" => {
            let path = if profile_path.is_empty() {
                user_profile_path().ok_or_else(|| {
                    Error::Config("could not determine user profile path".to_string())
                })?
            } else {
                PathBuf::from(profile_path)
            };
            Ok(Box::new(Profile::new(path)))
        }
        other => Err(Error::Config(format!(
            "unknown system type {:?} (expected nixos, home-manager, or profile)",
            other
        ))),
    }
}

/// The user's Nix profile symlink, if one can be located.
pub(crate) fn user_profile_path() -> Option<PathBuf> {
    if let Some(home) = std::env::var_os("HOME") {
        let link = Path::new(&home).join(".nix-profile");
        if link.symlink_metadata().is_ok() {
            return Some(link);
        }
    }

    if let Ok(user) = std::env::var("USER") {
        if !user.is_empty() {
            return Some(PathBuf::from(format!(
                "/nix/var/nix/profiles/per-user/{}/profile",
                user
            )));
        }
    }

    std::env::var_os("HOME").map(|home| Path::new(&home).join(".nix-profile"))
}

/// Run an activation command with `{path}` / `{profile}` placeholders.
pub(crate) fn run_activation(
    custom: &str,
    default: &[String],
    closure: &str,
    profile: Option<&str>,
) -> Result<()> {
    let args: Vec<String> = if custom.is_empty() {
        default.to_vec()
    } else {
        custom
            .split_whitespace()
            .map(|arg| {
                let arg = arg.replace("{path}", closure);
                match profile {
                    Some(p) => arg.replace("{profile}", p),
                    None => arg,
                }
            })
            .collect()
    };

    let (program, rest) = args
        .split_first()
        .ok_or_else(|| Error::Config("empty activation command".to_string()))?;
    info!("activating with: {}", args.join(" "));

    let status = Command::new(program)
        .args(rest)
        .status()
        .map_err(|e| Error::System(format!("failed to run {}: {}", program, e)))?;

    if !status.success() {
        return Err(Error::System(format!(
            "{} exited with {}",
            args.join(" "),
            status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_display() {
        assert_eq!(SystemKind::NixOs.to_string(), "nixos");
        assert_eq!(SystemKind::HomeManager.to_string(), "home-manager");
        assert_eq!(SystemKind::Profile.to_string(), "profile");
    }

    #[test]
    fn test_by_type_rejects_unknown() {
        assert!(matches!(by_type("solaris", ""), Err(Error::Config(_))));
    }

    #[test]
    fn test_by_type_profile_with_explicit_path() {
        let sys = by_type("profile", "/tmp/some-profile").unwrap();
        assert_eq!(sys.kind(), SystemKind::Profile);
    }

    #[test]
    fn test_run_activation_placeholders() {
        // "true" ignores its arguments; placeholders must still substitute
        run_activation(
            "true {path} {profile}",
            &[],
            "/nix/store/abc-closure",
            Some("/nix/var/nix/profiles/default"),
        )
        .unwrap();
    }

    #[test]
    fn test_run_activation_failure() {
        let result = run_activation("false", &[], "/nix/store/abc-closure", None);
        assert!(matches!(result, Err(Error::System(_))));
    }
}

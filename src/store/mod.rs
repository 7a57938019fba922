// src/store/mod.rs

//! Store adapter
//!
//! Talks to the store daemon through the `nix` / `nix-store` command-line
//! tools: dump a path to archive bytes, import an export envelope, query
//! direct references, and ask `why-depends` for the dependency tree. The
//! `Store` trait is the seam the rewrite engine works against; `NixStore`
//! is the real implementation, and the test suite substitutes an in-memory
//! one.
//!
//! When a custom store root is configured the daemon still thinks in terms
//! of `/nix/store` paths, so the adapter translates: arguments and envelope
//! contents go out in daemon form, results come back translated into the
//! local namespace.

pub mod deps;
pub mod path;

use crate::error::{Error, Result};
use deps::DependencyReport;
use serde::Deserialize;
use std::io::Write;
use std::process::{Command, Stdio};
use tracing::debug;

/// The store directory used by the daemon itself
pub const DAEMON_STORE_DIR: &str = "/nix/store";

/// Output of `nix store info --json`
#[derive(Debug, Clone, Deserialize)]
pub struct StoreInfo {
    #[serde(default)]
    pub trusted: i64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub version: String,
}

/// Narrow interface to the store daemon
///
/// All operations are synchronous and blocking; the engine serializes its
/// calls. Paths in arguments and results live in the local namespace
/// (`store_dir()`-prefixed); `to_daemon_path` / `from_daemon_path` expose
/// the translation needed when embedding paths into export envelopes.
pub trait Store: Send + Sync {
    /// The store directory paths in this namespace start with.
    fn store_dir(&self) -> &str;

    /// Canonical archive of the entry at `path`.
    fn dump(&self, path: &str) -> Result<Vec<u8>>;

    /// Submit one export-envelope record; returns the registered path.
    fn import(&self, envelope: &[u8]) -> Result<String>;

    /// Direct out-edges of `path`. No duplicates; order is arbitrary.
    fn references(&self, path: &str) -> Result<Vec<String>>;

    /// Full dependency tree from `from` down to `to`.
    fn why_depends(&self, from: &str, to: &str) -> Result<DependencyReport>;

    /// Daemon metadata; used for the trusted-user probe.
    fn store_info(&self) -> Result<StoreInfo>;

    /// Translate a local-namespace path into the form the daemon expects.
    fn to_daemon_path(&self, path: &str) -> String {
        path.to_string()
    }

    /// Translate a daemon-namespace path back into the local namespace.
    fn from_daemon_path(&self, path: &str) -> String {
        path.to_string()
    }
}

/// Store adapter backed by the system `nix` and `nix-store` binaries
#[derive(Debug, Clone)]
pub struct NixStore {
    /// Custom root directory; empty for the system /nix
    root_dir: String,
    /// Local store directory (root_dir + /nix/store)
    store_dir: String,
}

impl NixStore {
    /// Create an adapter; an empty `root_dir` uses the default /nix paths.
    pub fn new(root_dir: &str) -> Self {
        if root_dir.is_empty() {
            Self {
                root_dir: String::new(),
                store_dir: DAEMON_STORE_DIR.to_string(),
            }
        } else {
            let root = root_dir.trim_end_matches('/').to_string();
            Self {
                store_dir: format!("{}/nix/store", root),
                root_dir: root,
            }
        }
    }

    /// True iff the current user may modify the store.
    pub fn is_trusted_user(&self) -> Result<bool> {
        Ok(self.store_info()?.trusted == 1)
    }

    fn base_args(&self) -> Vec<String> {
        if self.root_dir.is_empty() {
            Vec::new()
        } else {
            vec!["--store".to_string(), self.root_dir.clone()]
        }
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<Vec<u8>> {
        let mut all_args = self.base_args();
        all_args.extend(args.iter().map(|s| s.to_string()));
        debug!("running {} {}", program, all_args.join(" "));

        let output = Command::new(program)
            .args(&all_args)
            .output()
            .map_err(|e| Error::StoreUnavailable(format!("failed to run {}: {}", program, e)))?;

        if !output.status.success() {
            return Err(Error::StoreQuery(format!(
                "{} {} failed: {}",
                program,
                all_args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(output.stdout)
    }
}

impl Store for NixStore {
    fn store_dir(&self) -> &str {
        &self.store_dir
    }

    fn dump(&self, path: &str) -> Result<Vec<u8>> {
        // --dump serializes a filesystem path, so the local (physical)
        // path is the right argument here.
        self.run("nix-store", &["--dump", path]).map_err(|e| match e {
            Error::StoreUnavailable(_) => e,
            other => {
                let detail = other.to_string();
                if detail.contains("No such file") || detail.contains("does not exist") {
                    Error::PathMissing(path.to_string())
                } else {
                    Error::DumpFailed {
                        path: path.to_string(),
                        detail,
                    }
                }
            }
        })
    }

    fn import(&self, envelope: &[u8]) -> Result<String> {
        let mut all_args = self.base_args();
        all_args.push("--import".to_string());

        let mut child = Command::new("nix-store")
            .args(&all_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::StoreUnavailable(format!("failed to run nix-store: {}", e)))?;

        child
            .stdin
            .take()
            .expect("stdin was piped")
            .write_all(envelope)
            .map_err(|e| Error::ImportFailed(format!("writing envelope: {}", e)))?;

        let output = child
            .wait_with_output()
            .map_err(|e| Error::ImportFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(Error::ImportFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let registered = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if registered.is_empty() {
            return Err(Error::ImportFailed(
                "daemon returned no path".to_string(),
            ));
        }
        Ok(self.from_daemon_path(&registered))
    }

    fn references(&self, path: &str) -> Result<Vec<String>> {
        let daemon_path = self.to_daemon_path(path);
        let output = self.run(
            "nix-store",
            &["--query", "--references", &daemon_path],
        )?;

        let refs = String::from_utf8_lossy(&output)
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(|l| self.from_daemon_path(l))
            .collect();
        Ok(refs)
    }

    fn why_depends(&self, from: &str, to: &str) -> Result<DependencyReport> {
        let from_daemon = self.to_daemon_path(from);
        let to_daemon = self.to_daemon_path(to);
        let output = self
            .run(
                "nix",
                &["why-depends", "--all", &from_daemon, &to_daemon],
            )
            .map_err(|e| {
                let detail = e.to_string();
                if detail.contains("does not depend") {
                    Error::NotInClosure {
                        root: from.to_string(),
                        target: to.to_string(),
                    }
                } else {
                    e
                }
            })?;

        let text = String::from_utf8_lossy(&output);
        let mut report = deps::parse_report(&text, DAEMON_STORE_DIR);
        for node in &mut report.nodes {
            node.path = self.from_daemon_path(&node.path);
        }
        Ok(report)
    }

    fn store_info(&self) -> Result<StoreInfo> {
        let output = self.run("nix", &["store", "info", "--json"])?;
        Ok(serde_json::from_slice(&output)?)
    }

    fn to_daemon_path(&self, path: &str) -> String {
        if self.root_dir.is_empty() || path.starts_with(DAEMON_STORE_DIR) {
            return path.to_string();
        }
        match path.strip_prefix(&self.store_dir) {
            Some(rest) => format!("{}{}", DAEMON_STORE_DIR, rest),
            None => path.to_string(),
        }
    }

    fn from_daemon_path(&self, path: &str) -> String {
        if self.root_dir.is_empty() {
            return path.to_string();
        }
        match path.strip_prefix(DAEMON_STORE_DIR) {
            Some(rest) => format!("{}{}", self.store_dir, rest),
            None => path.to_string(),
        }
    }
}

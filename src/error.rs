// src/error.rs

//! Crate-wide error type
//!
//! One enum covers every failure kind the tool can hit: configuration,
//! validation, store daemon calls, archive codecs, closure rewriting, and
//! the post-rewrite system activation. The CLI maps variants to exit codes
//! (2 for configuration/validation, 1 for everything else).

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by nix-patch
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or malformed configuration input
    #[error("configuration error: {0}")]
    Config(String),

    /// A path that should be inside the store is not
    #[error("{path} is not inside the store at {store_dir}")]
    NotStorePath { path: String, store_dir: String },

    /// Store path does not have the <hash>-<name> shape
    #[error("malformed store path: {0}")]
    MalformedStorePath(String),

    /// Target is unreachable from the closure root
    #[error("{target} is not in the closure of {root}")]
    NotInClosure { root: String, target: String },

    /// The store daemon could not be spawned at all
    #[error("store daemon unavailable: {0}")]
    StoreUnavailable(String),

    /// Path is not registered in the store
    #[error("path not registered in store: {0}")]
    PathMissing(String),

    /// `nix-store --dump` failed
    #[error("dump of {path} failed: {detail}")]
    DumpFailed { path: String, detail: String },

    /// `nix-store --import` failed
    #[error("import failed: {0}")]
    ImportFailed(String),

    /// Any other store query failed
    #[error("store query failed: {0}")]
    StoreQuery(String),

    /// Archive bytes do not parse as a NAR or export envelope
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    /// Filesystem entry that the archive format cannot represent
    #[error("unsupported entry kind at {path}: {kind}")]
    UnsupportedEntryKind { path: String, kind: String },

    /// Kahn's algorithm could not order the affected set
    #[error("dependency cycle detected: {0} paths could not be ordered")]
    DependencyCycle(usize),

    /// The closure root never made it into the rewrite map
    #[error("closure root {0} was not rewritten")]
    ClosureRootNotRewritten(String),

    /// A node rewrite failed; carries the offending path
    #[error("rewrite of {path} failed: {source}")]
    Rewrite {
        path: String,
        #[source]
        source: Box<Error>,
    },

    /// Run cancelled between node rewrites
    #[error("run cancelled after {completed} of {total} rewrites")]
    Cancelled { completed: usize, total: usize },

    /// Per-run wall-clock deadline exceeded
    #[error("deadline exceeded after {completed} of {total} rewrites")]
    DeadlineExceeded { completed: usize, total: usize },

    /// External editor invocation failed
    #[error("editor failed: {0}")]
    Editor(String),

    /// Post-rewrite activation or system detection failed
    #[error("system operation failed: {0}")]
    System(String),

    /// I/O while walking or writing extracted trees
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON from the store daemon did not parse
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Exit code for the CLI: 2 for configuration/validation errors, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_)
            | Error::NotStorePath { .. }
            | Error::MalformedStorePath(_)
            | Error::NotInClosure { .. } => 2,
            _ => 1,
        }
    }

    /// Attach an offending store path to an error from a node rewrite.
    pub fn at_path(self, path: impl Into<String>) -> Self {
        Error::Rewrite {
            path: path.into(),
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::Config("x".into()).exit_code(), 2);
        assert_eq!(
            Error::NotStorePath {
                path: "/tmp/x".into(),
                store_dir: "/nix/store".into()
            }
            .exit_code(),
            2
        );
        assert_eq!(Error::ImportFailed("x".into()).exit_code(), 1);
        assert_eq!(Error::DependencyCycle(3).exit_code(), 1);
    }

    #[test]
    fn test_at_path_wraps() {
        let err = Error::PathMissing("/nix/store/abc-x".into()).at_path("/nix/store/def-y");
        let msg = err.to_string();
        assert!(msg.contains("/nix/store/def-y"));
        assert!(msg.contains("not registered"));
    }
}

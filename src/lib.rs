// src/lib.rs

//! nix-patch
//!
//! Edit a file inside the content-addressed Nix store and propagate the
//! edit through everything that depends on it. Store entries are immutable
//! and identified by a hash of their contents, so a single edit invalidates
//! every path that transitively references the edited one; this crate
//! rebuilds that whole subgraph, leaves first.
//!
//! # Architecture
//!
//! - `store`: adapter over the `nix`/`nix-store` CLIs (dump, import,
//!   references, why-depends), store path codec, dependency analysis
//! - `nar`: the canonical archive format that content-addresses entries
//! - `export`: the envelope framing used to import archives into the store
//! - `rewrite`: the engine that orders the affected set topologically and
//!   rewrites each node, plus the byte-level reference rewriter and the
//!   run-scoped cache
//! - `system`: NixOS / home-manager / profile detection and activation
//! - `commands`: the CLI-facing edit flow (workspace, editor, diff)

pub mod commands;
pub mod config;
pub mod editor;
mod error;
pub mod export;
pub mod nar;
pub mod progress;
pub mod rewrite;
pub mod store;
pub mod system;

pub use config::Config;
pub use error::{Error, Result};
pub use export::ExportRecord;
pub use nar::{Entry, EntryKind, ExtractOptions};
pub use progress::{CliProgress, LogProgress, ProgressTracker, SilentProgress};
pub use rewrite::{Engine, Rewrite, RewriteMap, StoreCache};
pub use store::deps::{DependencyAnalysis, DependencyReport, ReportNode};
pub use store::{NixStore, Store, StoreInfo};
pub use system::{System, SystemKind};

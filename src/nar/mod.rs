// src/nar/mod.rs

//! Canonical archive (tree) format
//!
//! The streamed serialization of a filesystem subtree that the store
//! content-addresses. Three entry kinds exist: directories (children sorted
//! by raw name bytes), regular files (payload plus an executable flag), and
//! symbolic links (verbatim target). `reader` parses archive bytes,
//! `writer` produces them from a filesystem subtree, `extract` goes back to
//! the filesystem, and `wire` holds the integer/string primitives shared
//! with the export envelope.

pub mod extract;
pub mod reader;
pub mod wire;
pub mod writer;

pub use extract::{extract, ExtractOptions};
pub use reader::{parse, parse_prefix};
pub use writer::pack_path;

/// Magic string opening every archive
pub const NAR_MAGIC: &str = "nix-archive-1";

/// Entry kinds representable in an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    Regular,
    Symlink,
}

/// One parsed archive entry
///
/// `path` is relative to the archive root, `/` being the root itself.
/// Regular-file payloads are inline in `contents`.
#[derive(Debug, Clone)]
pub struct Entry {
    pub path: String,
    pub kind: EntryKind,
    pub executable: bool,
    pub target: Option<String>,
    pub contents: Option<Vec<u8>>,
}

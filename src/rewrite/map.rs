// src/rewrite/map.rs

//! The rewrite map: old store path -> new store path
//!
//! Insertion-ordered and write-once: an old path, once recorded, is never
//! remapped. Hash pairs are precomputed at insert time since the rewriter
//! substitutes at the hash level.

use crate::error::Result;
use crate::store::path as store_path;
use std::collections::HashMap;
use tracing::warn;

/// One recorded rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub old_path: String,
    pub new_path: String,
    /// 32-char hash prefix of the old path, empty if not extractable
    pub old_hash: String,
    /// 32-char hash prefix of the new path, empty if not extractable
    pub new_hash: String,
}

/// Insertion-ordered mapping of old to new store paths
#[derive(Debug, Default)]
pub struct RewriteMap {
    entries: Vec<Rewrite>,
    index: HashMap<String, usize>,
}

impl RewriteMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `old -> new`. A second insert for the same old path is
    /// ignored: entries are monotonic within a run.
    pub fn insert(&mut self, old: &str, new: &str, store_dir: &str) -> Result<()> {
        if let Some(&at) = self.index.get(old) {
            if self.entries[at].new_path != new {
                warn!(
                    "ignoring remap of {}: already rewritten to {}",
                    old, self.entries[at].new_path
                );
            }
            return Ok(());
        }

        let old_hash = store_path::extract_hash(old, store_dir)
            .unwrap_or_default()
            .to_string();
        let new_hash = store_path::extract_hash(new, store_dir)
            .unwrap_or_default()
            .to_string();
        if !old_hash.is_empty() && old_hash == new_hash {
            warn!("rewrite of {} keeps the same hash", old);
        }

        self.index.insert(old.to_string(), self.entries.len());
        self.entries.push(Rewrite {
            old_path: old.to_string(),
            new_path: new.to_string(),
            old_hash,
            new_hash,
        });
        Ok(())
    }

    /// New path recorded for `old`, if any.
    pub fn get(&self, old: &str) -> Option<&str> {
        self.index
            .get(old)
            .map(|&at| self.entries[at].new_path.as_str())
    }

    pub fn contains(&self, old: &str) -> bool {
        self.index.contains_key(old)
    }

    /// Map a reference through the rewrites; unaffected paths pass through.
    pub fn translate(&self, path: &str) -> String {
        self.get(path).unwrap_or(path).to_string()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Rewrite> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

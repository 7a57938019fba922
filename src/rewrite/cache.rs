// src/rewrite/cache.rs

//! Run-scoped memoization of store reads
//!
//! Reference lists are always cached once computed. Archive buffers are
//! cached only below a size ceiling (10 MiB by default); larger dumps are
//! returned through without being retained. No eviction within a run; the
//! whole cache is dropped when the run ends. In-flight requests are not
//! deduplicated; callers serialize.

use crate::config::MAX_CACHED_ARCHIVE_BYTES;
use crate::error::Result;
use crate::store::Store;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Memoizing front for `references` and `dump`
pub struct StoreCache {
    store: Arc<dyn Store>,
    references: RwLock<HashMap<String, Vec<String>>>,
    archives: RwLock<HashMap<String, Vec<u8>>>,
    max_archive_bytes: usize,
}

impl StoreCache {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_archive_ceiling(store, MAX_CACHED_ARCHIVE_BYTES)
    }

    pub fn with_archive_ceiling(store: Arc<dyn Store>, max_archive_bytes: usize) -> Self {
        Self {
            store,
            references: RwLock::new(HashMap::new()),
            archives: RwLock::new(HashMap::new()),
            max_archive_bytes,
        }
    }

    /// Direct references of `path`, memoized.
    pub fn references(&self, path: &str) -> Result<Vec<String>> {
        if let Some(refs) = self
            .references
            .read()
            .expect("reference cache poisoned")
            .get(path)
        {
            return Ok(refs.clone());
        }

        let refs = self.store.references(path)?;
        self.references
            .write()
            .expect("reference cache poisoned")
            .insert(path.to_string(), refs.clone());
        Ok(refs)
    }

    /// Archive bytes of `path`, memoized below the size ceiling.
    pub fn dump(&self, path: &str) -> Result<Vec<u8>> {
        if let Some(archive) = self
            .archives
            .read()
            .expect("archive cache poisoned")
            .get(path)
        {
            return Ok(archive.clone());
        }

        let archive = self.store.dump(path)?;
        if archive.len() < self.max_archive_bytes {
            self.archives
                .write()
                .expect("archive cache poisoned")
                .insert(path.to_string(), archive.clone());
        } else {
            debug!(
                "not caching {} byte archive for {} (ceiling {})",
                archive.len(),
                path,
                self.max_archive_bytes
            );
        }
        Ok(archive)
    }

    /// Number of archive buffers currently retained.
    pub fn cached_archives(&self) -> usize {
        self.archives.read().expect("archive cache poisoned").len()
    }

    /// Number of reference lists currently retained.
    pub fn cached_references(&self) -> usize {
        self.references
            .read()
            .expect("reference cache poisoned")
            .len()
    }
}

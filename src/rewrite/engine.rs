// src/rewrite/engine.rs

//! The closure rewrite engine
//!
//! Drives one run: seed the rewrite map with the user's edit, obtain the
//! affected set from the dependency analyzer, order it leaves-first, and
//! for each node extract its archive to a scratch directory, substitute the
//! rewritten hashes, repack, and import the result. Each import produces a
//! new content-addressed path that is recorded in the map so later nodes
//! (and finally the closure root) pick it up.
//!
//! Rewrites are strictly sequential; the inner loop is bounded by daemon
//! I/O. Cancellation and the wall-clock deadline are honored between node
//! rewrites, never in the middle of one. Imported paths are content-
//! addressed and harmless, so an aborted run leaves no state worth rolling
//! back.

use crate::config::REWRITE_TEMP_PREFIX;
use crate::error::{Error, Result};
use crate::export;
use crate::nar::{self, ExtractOptions};
use crate::rewrite::cache::StoreCache;
use crate::rewrite::map::RewriteMap;
use crate::rewrite::rewriter;
use crate::store::{deps, path as store_path, Store};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Progress callback: (nodes done, nodes total, current path)
pub type ProgressFn = Box<dyn Fn(usize, usize, &str) + Send + Sync>;

/// Per-run closure rewrite driver
pub struct Engine {
    store: Arc<dyn Store>,
    cache: StoreCache,
    rewrites: RewriteMap,
    dry_run: bool,
    progress: Option<ProgressFn>,
    cancel: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let cache = StoreCache::new(store.clone());
        Self {
            store,
            cache,
            rewrites: RewriteMap::new(),
            dry_run: false,
            progress: None,
            cancel: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    /// Plan without importing; the map fills with predicted paths.
    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    pub fn set_progress(&mut self, progress: ProgressFn) {
        self.progress = Some(progress);
    }

    /// Wall-clock deadline checked between node rewrites.
    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// Flag that cancels the run at the next node boundary.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// The rewrite map accumulated so far (also the dry-run plan).
    pub fn rewrites(&self) -> &RewriteMap {
        &self.rewrites
    }

    /// Record an externally produced rewrite, e.g. in tests.
    pub fn seed(&mut self, old: &str, new: &str) -> Result<()> {
        self.rewrites.insert(old, new, self.store.store_dir())
    }

    /// Import the user's edited tree as the replacement for `original`.
    ///
    /// Packs the tree, declares a content-addressed path carrying the
    /// original name suffix, imports it (unless dry-run), and seeds the
    /// rewrite map with the result.
    pub fn import_edit(&mut self, original: &str, edited_tree: &Path) -> Result<String> {
        let new_path = self
            .pack_and_import(original, edited_tree)
            .map_err(|e| e.at_path(original.to_string()))?;
        info!("edited path imported as {}", new_path);
        self.rewrites
            .insert(original, &new_path, self.store.store_dir())?;
        Ok(new_path)
    }

    /// Rewrite every path that transitively references `target`, starting
    /// from the closure root `root`. Returns the new closure root.
    ///
    /// The map must already hold the rewrite for `target` (see
    /// `import_edit` / `seed`).
    pub fn rewrite_closure(&mut self, root: &str, target: &str) -> Result<String> {
        let analysis = deps::analyze(self.store.as_ref(), root, target)?;
        if !analysis.affected.contains(target) || !analysis.affected.contains(root) {
            return Err(Error::NotInClosure {
                root: root.to_string(),
                target: target.to_string(),
            });
        }
        if !self.rewrites.contains(target) {
            return Err(Error::Config(format!(
                "no rewrite recorded for {} (import the edit first)",
                target
            )));
        }
        debug!("dependency chain: {}", analysis.chain.join(" -> "));
        info!("{} paths affected by the edit", analysis.affected.len());

        // The analyzer's parent map holds one parent per node, which is
        // not enough for ordering. Build the real reference graph
        // restricted to the affected set.
        let mut graph: HashMap<String, Vec<String>> = HashMap::new();
        for path in &analysis.affected {
            let refs = self
                .cache
                .references(path)?
                .into_iter()
                .filter(|r| r != path && analysis.affected.contains(r))
                .collect();
            graph.insert(path.clone(), refs);
        }

        let order = topological_order(&analysis.affected, &graph)?;
        let pending: Vec<&String> = order
            .iter()
            .filter(|p| !self.rewrites.contains(p))
            .collect();
        let total = pending.len();

        for (done, path) in pending.into_iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                return Err(Error::Cancelled {
                    completed: done,
                    total,
                });
            }
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    return Err(Error::DeadlineExceeded {
                        completed: done,
                        total,
                    });
                }
            }

            if let Some(progress) = &self.progress {
                progress(done + 1, total, path);
            }

            let new_path = self
                .rewrite_node(path)
                .map_err(|e| e.at_path(path.clone()))?;
            debug!("{} -> {}", path, new_path);
            self.rewrites
                .insert(path, &new_path, self.store.store_dir())?;
        }

        self.rewrites
            .get(root)
            .map(|p| p.to_string())
            .ok_or_else(|| Error::ClosureRootNotRewritten(root.to_string()))
    }

    /// Rewrite a single node: extract, substitute, repack, import.
    fn rewrite_node(&self, path: &str) -> Result<String> {
        let info = store_path::parse(path, self.store.store_dir())?;
        let archive = self.cache.dump(path)?;

        let scratch = tempfile::Builder::new()
            .prefix(REWRITE_TEMP_PREFIX)
            .tempdir()?;
        let tree = scratch.path().join(&info.name);

        nar::extract(
            &archive,
            &tree,
            ExtractOptions {
                make_writable: true,
            },
        )?;
        rewriter::rewrite_tree(&tree, &self.rewrites)?;

        self.pack_and_import(path, &tree)
        // scratch is removed on drop, success or not
    }

    /// Pack `tree`, declare a path named after `original`, and import.
    ///
    /// In dry-run mode the archive is still built so the declared path is a
    /// real content address, but nothing reaches the daemon.
    fn pack_and_import(&self, original: &str, tree: &Path) -> Result<String> {
        let store_dir = self.store.store_dir();
        let info = store_path::parse(original, store_dir)?;

        let references: Vec<String> = self
            .cache
            .references(original)?
            .iter()
            .map(|r| self.store.to_daemon_path(&self.rewrites.translate(r)))
            .collect();

        let daemon_dir = self.store.to_daemon_path(store_dir);
        let (envelope, declared) = export::create(tree, &info.name, &references, &daemon_dir)?;
        let declared_local = self.store.from_daemon_path(&declared);

        if self.dry_run {
            debug!("dry-run: would import {}", declared_local);
            return Ok(declared_local);
        }

        let registered = self.store.import(&envelope)?;
        if registered != declared_local {
            warn!(
                "daemon registered {} but {} was declared; trusting the daemon",
                registered, declared_local
            );
        }
        Ok(registered)
    }
}

/// Leaves-first topological order over the restricted reference graph.
///
/// `graph` maps each affected path to its references within the affected
/// set. A path is ready once all of those references are ordered; ties are
/// broken lexicographically. Fewer ordered nodes than affected paths means
/// a reference cycle, which a content-addressed store cannot legitimately
/// contain, so it is fatal.
fn topological_order(
    affected: &BTreeSet<String>,
    graph: &HashMap<String, Vec<String>>,
) -> Result<Vec<String>> {
    let mut pending: HashMap<&str, usize> = HashMap::new();
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for path in affected {
        let refs = graph.get(path).map(Vec::as_slice).unwrap_or_default();
        pending.insert(path, refs.len());
        for reference in refs {
            dependents
                .entry(reference.as_str())
                .or_default()
                .push(path.as_str());
        }
    }

    let mut ready: BTreeSet<&str> = pending
        .iter()
        .filter(|(_, &count)| count == 0)
        .map(|(&path, _)| path)
        .collect();

    let mut order = Vec::with_capacity(affected.len());
    while let Some(path) = ready.pop_first() {
        order.push(path.to_string());
        for &dependent in dependents.get(path).map(Vec::as_slice).unwrap_or_default() {
            let count = pending
                .get_mut(dependent)
                .expect("dependent missing from pending");
            *count -= 1;
            if *count == 0 {
                ready.insert(dependent);
            }
        }
    }

    if order.len() != affected.len() {
        return Err(Error::DependencyCycle(affected.len() - order.len()));
    }
    Ok(order)
}

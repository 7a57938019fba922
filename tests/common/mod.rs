// tests/common/mod.rs

//! Shared test utilities: an in-memory store implementation and fixture
//! builders for dependency graphs.

#![allow(dead_code)]

use nix_patch::store::deps::{DependencyReport, ReportNode};
use nix_patch::store::path as store_path;
use nix_patch::store::{Store, StoreInfo};
use nix_patch::{nar, Error, ExportRecord, Result};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const STORE_DIR: &str = "/nix/store";

/// Hermetic `Store` implementation backed by in-memory maps.
///
/// `import` behaves like the daemon: it decodes the envelope, recomputes
/// the content address of the archive, and registers the result under the
/// recomputed path with the references declared in the envelope.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    refs: Mutex<HashMap<String, Vec<String>>>,
    imports: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            refs: Mutex::new(HashMap::new()),
            imports: AtomicUsize::new(0),
        }
    }

    /// Register an entry without going through an import.
    pub fn add_entry(&self, path: &str, archive: Vec<u8>, references: Vec<String>) {
        self.entries
            .lock()
            .unwrap()
            .insert(path.to_string(), archive);
        self.refs
            .lock()
            .unwrap()
            .insert(path.to_string(), references);
    }

    /// Number of successful imports so far.
    pub fn import_count(&self) -> usize {
        self.imports.load(Ordering::SeqCst)
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.entries.lock().unwrap().contains_key(path)
    }

    /// Archive bytes of a registered path.
    pub fn archive_of(&self, path: &str) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(path).cloned()
    }

    /// True iff `to` is reachable from `from` along references.
    fn reaches(&self, from: &str, to: &str) -> bool {
        let refs = self.refs.lock().unwrap();
        let mut stack = vec![from.to_string()];
        let mut seen = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(out) = refs.get(&current) {
                stack.extend(out.iter().cloned());
            }
        }
        false
    }

    fn visit(
        &self,
        path: &str,
        to: &str,
        depth: usize,
        on_path: &mut Vec<String>,
        nodes: &mut Vec<ReportNode>,
    ) {
        nodes.push(ReportNode {
            path: path.to_string(),
            depth,
        });
        if path == to {
            return;
        }

        on_path.push(path.to_string());
        let children: Vec<String> = self
            .refs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default();
        for child in children {
            if on_path.contains(&child) {
                continue;
            }
            if self.reaches(&child, to) {
                self.visit(&child, to, depth + 1, on_path, nodes);
            }
        }
        on_path.pop();
    }
}

impl Store for MemoryStore {
    fn store_dir(&self) -> &str {
        STORE_DIR
    }

    fn dump(&self, path: &str) -> Result<Vec<u8>> {
        self.entries
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::PathMissing(path.to_string()))
    }

    fn import(&self, envelope: &[u8]) -> Result<String> {
        let records = nix_patch::export::decode(envelope)?;
        let record: &ExportRecord = records
            .first()
            .ok_or_else(|| Error::ImportFailed("empty envelope".to_string()))?;

        // The daemon recomputes the content address from the archive bytes
        let declared = store_path::parse(&record.path, STORE_DIR)?;
        let digest = store_path::content_hash(&record.archive);
        let registered = store_path::synthesize(&digest, &declared.name, STORE_DIR);

        self.add_entry(
            &registered,
            record.archive.clone(),
            record.references.clone(),
        );
        self.imports.fetch_add(1, Ordering::SeqCst);
        Ok(registered)
    }

    fn references(&self, path: &str) -> Result<Vec<String>> {
        self.refs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::PathMissing(path.to_string()))
    }

    fn why_depends(&self, from: &str, to: &str) -> Result<DependencyReport> {
        if !self.has_path(from) {
            return Err(Error::PathMissing(from.to_string()));
        }
        if !self.reaches(from, to) {
            return Err(Error::NotInClosure {
                root: from.to_string(),
                target: to.to_string(),
            });
        }
        let mut nodes = Vec::new();
        self.visit(from, to, 0, &mut Vec::new(), &mut nodes);
        Ok(DependencyReport { nodes })
    }

    fn store_info(&self) -> Result<StoreInfo> {
        Ok(StoreInfo {
            trusted: 1,
            url: "memory".to_string(),
            version: "0".to_string(),
        })
    }
}

/// Build an archive whose single file embeds `marker` and the full path of
/// every reference, register it, and return the new entry's path.
///
/// The embedded paths are what the reference rewriter later finds and
/// substitutes, just like real store entries embed their dependencies.
pub fn make_entry(store: &MemoryStore, name: &str, references: &[&str], marker: &str) -> String {
    let archive = build_archive(name, references, marker);
    let digest = store_path::content_hash(&archive);
    let path = store_path::synthesize(&digest, name, STORE_DIR);
    store.add_entry(
        &path,
        archive,
        references.iter().map(|r| r.to_string()).collect(),
    );
    path
}

/// Pack a small tree: one `data` file with the marker and reference paths.
pub fn build_archive(name: &str, references: &[&str], marker: &str) -> Vec<u8> {
    let dir = tempfile::tempdir().unwrap();
    let tree = dir.path().join(name);
    fs::create_dir(&tree).unwrap();

    let mut contents = format!("entry {}\nmarker {}\n", name, marker);
    for reference in references {
        contents.push_str(&format!("depends {}\n", reference));
    }
    fs::write(tree.join("data"), contents).unwrap();

    nar::pack_path(&tree).unwrap()
}

/// Materialize an edited copy of `path`'s tree with `marker` replaced.
///
/// Returns the temp dir (keep it alive) and the tree path inside it.
pub fn edited_tree_of(
    store: &MemoryStore,
    path: &str,
    old_marker: &str,
    new_marker: &str,
) -> (tempfile::TempDir, std::path::PathBuf) {
    let archive = store.archive_of(path).expect("path registered");
    let info = store_path::parse(path, STORE_DIR).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let tree = dir.path().join(&info.name);
    nar::extract(
        &archive,
        &tree,
        nix_patch::ExtractOptions {
            make_writable: true,
        },
    )
    .unwrap();

    let data = tree.join("data");
    let contents = fs::read_to_string(&data).unwrap();
    fs::write(&data, contents.replace(old_marker, new_marker)).unwrap();

    (dir, tree)
}

// src/commands.rs

//! The edit command
//!
//! End-to-end flow: validate the target path, detect the system and its
//! closure root, extract the target into a writable workspace, hand it to
//! the editor, and if anything changed import the edit and drive the
//! rewrite engine over everything that depends on it. Afterwards either
//! print the dry-run plan or activate the new closure.

use crate::config::{Config, TEMP_DIR_PREFIX};
use crate::editor;
use crate::error::{Error, Result};
use crate::nar::{self, ExtractOptions};
use crate::progress::{CliProgress, LogProgress, ProgressTracker};
use crate::rewrite::Engine;
use crate::store::{path as store_path, NixStore, Store};
use crate::system::{self, System};
use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Run the edit operation described by `cfg`.
pub fn cmd_edit(cfg: &Config) -> Result<()> {
    let store = Arc::new(NixStore::new(&cfg.store_root));

    let target = resolve_target(&cfg.path, store.store_dir())?;
    let entry = store_path::entry_path(&target, store.store_dir())
        .ok_or_else(|| Error::NotStorePath {
            path: target.clone(),
            store_dir: store.store_dir().to_string(),
        })?
        .to_string();
    let subpath = target[entry.len()..].trim_start_matches('/').to_string();
    let entry_info = store_path::parse(&entry, store.store_dir())?;
    debug!("store_path={} subpath={:?}", entry, subpath);

    let sys = detect_or_override(cfg)?;
    let closure = sys.closure_path()?;
    info!("system: {}, closure root: {}", sys.kind(), closure);

    // Workspace: extract the entry writable and let the editor at it
    let workdir = tempfile::Builder::new().prefix(TEMP_DIR_PREFIX).tempdir()?;
    let dest = workdir.path().join(&entry_info.name);
    let archive = store.dump(&entry)?;
    nar::extract(
        &archive,
        &dest,
        ExtractOptions {
            make_writable: true,
        },
    )?;

    let edit_path = if subpath.is_empty() {
        dest.clone()
    } else {
        dest.join(&subpath)
    };
    if fs::symlink_metadata(&edit_path).is_err() {
        return Err(Error::Config(format!(
            "{} does not exist inside {}",
            subpath, entry
        )));
    }
    if !cfg.force && edit_path.is_file() && is_binary(&edit_path)? {
        return Err(Error::Config(format!(
            "refusing to open binary file {} in an editor (use --force)",
            target
        )));
    }

    editor::open(&cfg.editor, &edit_path)?;

    if !trees_differ(Path::new(&entry), &dest)? {
        info!("no changes detected, nothing to do");
        return Ok(());
    }
    show_diff(Path::new(&entry), &dest);

    // Rewrite the closure
    let mut engine = Engine::new(store.clone());
    engine.set_dry_run(cfg.dry_run);
    engine.set_deadline(Some(Instant::now() + cfg.timeout));

    let tracker: Arc<dyn ProgressTracker> = if cfg.verbose {
        Arc::new(LogProgress::new())
    } else {
        Arc::new(CliProgress::new("Rewriting closure"))
    };
    {
        let tracker = tracker.clone();
        engine.set_progress(Box::new(move |done, total, path| {
            tracker.update(done, total, path);
        }));
    }

    let new_target = engine.import_edit(&entry, &dest)?;
    debug!("edited entry rewritten to {}", new_target);

    info!("rewriting dependent closure...");
    let new_root = engine.rewrite_closure(&closure, &entry)?;
    tracker.finish("closure rewritten");
    info!("new closure root: {}", new_root);

    if cfg.dry_run {
        print_dry_run_summary(&engine, sys.as_ref(), &entry, &closure, &new_root, cfg);
        return Ok(());
    }

    if let Err(e) = sys.apply(&new_root, &cfg.activation_command) {
        // The imported paths are content-addressed and stay valid even
        // when activation fails.
        warn!("activation failed; the new closure {} remains in the store", new_root);
        return Err(e);
    }
    info!("activation complete");
    Ok(())
}

/// Validate the target path, resolving symlinks that point into the store.
fn resolve_target(path: &str, store_dir: &str) -> Result<String> {
    if store_path::is_store_path(path, store_dir) {
        return Ok(path.to_string());
    }

    if let Ok(resolved) = fs::canonicalize(path) {
        let resolved = resolved.display().to_string();
        if store_path::is_store_path(&resolved, store_dir) {
            return Ok(resolved);
        }
    }

    Err(Error::NotStorePath {
        path: path.to_string(),
        store_dir: store_dir.to_string(),
    })
}

/// Use the system type override when given, otherwise auto-detect.
fn detect_or_override(cfg: &Config) -> Result<Box<dyn System>> {
    if !cfg.system_type.is_empty() {
        let sys = system::by_type(&cfg.system_type, &cfg.profile_path)?;
        info!("using system type override: {}", sys.kind());
        return Ok(sys);
    }

    let sys = system::detect()?;
    if sys.kind() == system::SystemKind::Profile {
        info!("no specific system detected, using user profile");
    } else {
        info!("detected system type: {}", sys.kind());
    }
    Ok(sys)
}

/// Crude binary sniff: a NUL byte in the first 8 KiB.
fn is_binary(path: &Path) -> Result<bool> {
    use std::io::Read;
    let mut file = fs::File::open(path)?;
    let mut probe = [0u8; 8192];
    let n = file.read(&mut probe)?;
    Ok(probe[..n].contains(&0))
}

#[derive(Debug, PartialEq, Eq)]
enum TreeEntry {
    Directory,
    File { executable: bool, contents: Vec<u8> },
    Symlink { target: PathBuf },
}

/// Collect a comparable signature of the subtree at `root`.
fn tree_signature(root: &Path) -> Result<BTreeMap<String, TreeEntry>> {
    let mut signature = BTreeMap::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry =
            entry.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(root)
            .expect("walkdir stays under root")
            .to_string_lossy()
            .into_owned();
        let file_type = entry.file_type();

        let item = if file_type.is_dir() {
            TreeEntry::Directory
        } else if file_type.is_symlink() {
            TreeEntry::Symlink {
                target: fs::read_link(entry.path())?,
            }
        } else {
            let meta = entry.metadata().map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
            })?;
            TreeEntry::File {
                executable: meta.permissions().mode() & 0o111 != 0,
                contents: fs::read(entry.path())?,
            }
        };
        signature.insert(rel, item);
    }

    Ok(signature)
}

/// Whether the edited workspace differs from the original entry.
///
/// Only content, entry kind, symlink targets, and the executable bit count:
/// extraction deliberately loosens the store's read-only modes.
fn trees_differ(original: &Path, edited: &Path) -> Result<bool> {
    Ok(tree_signature(original)? != tree_signature(edited)?)
}

/// Show a unified diff of the edit; failures here are cosmetic.
fn show_diff(original: &Path, edited: &Path) {
    info!("changes to be applied:");
    let status = Command::new("diff")
        .args(["--recursive", "--unified"])
        .arg(original)
        .arg(edited)
        .status();
    // diff exits nonzero when files differ, which is the expected case
    if let Err(e) = status {
        debug!("diff unavailable: {}", e);
    }
}

/// Print the plan accumulated by a dry run.
fn print_dry_run_summary(
    engine: &Engine,
    sys: &dyn System,
    target: &str,
    old_root: &str,
    new_root: &str,
    cfg: &Config,
) {
    println!("\nDRY-RUN MODE: preview of changes");
    println!("=================================");

    let mut planned: Vec<(&str, &str)> = engine
        .rewrites()
        .iter()
        .map(|r| (r.old_path.as_str(), r.new_path.as_str()))
        .collect();
    planned.sort();

    println!("\nPaths that would be rewritten ({} total):", planned.len());
    for (i, (old, new)) in planned.iter().enumerate() {
        if i < 10 || *old == target || *old == old_root {
            println!("  {}", old);
            println!("    -> {}", new);
        } else if i == 10 {
            println!("  ... and {} more paths ...", planned.len() - 10);
            break;
        }
    }

    println!("\nCommand that would be executed:");
    if cfg.activation_command.is_empty() {
        println!("  {}", sys.default_command(new_root).join(" "));
    } else {
        println!("  {}", cfg.activation_command);
    }

    println!("\nSystem information:");
    println!("  System type: {}", sys.kind());
    println!("  New closure: {}", new_root);
    println!("\nDRY-RUN: no changes were applied.");
}

// src/nar/extract.rs

//! Archive extraction to the local filesystem
//!
//! A single-file archive (top entry is a regular file) extracts to the
//! destination path itself; a directory archive materializes the whole
//! subtree beneath it. With `make_writable` set the extracted entries get
//! user-writable modes so the rewriter and the editor can touch them;
//! otherwise the store's read-only modes are reproduced.

use crate::error::{Error, Result};
use crate::nar::{parse, Entry, EntryKind};
use std::fs;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::Path;

/// Extraction behavior
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Give extracted files and directories user-writable permissions
    pub make_writable: bool,
}

/// Extract archive bytes to `dest`.
pub fn extract(archive: &[u8], dest: &Path, opts: ExtractOptions) -> Result<()> {
    let entries = parse(archive)?;

    let root = entries
        .first()
        .ok_or_else(|| Error::MalformedArchive("empty archive".to_string()))?;

    // Single-file and single-symlink archives extract to dest directly.
    if root.path == "/" && root.kind != EntryKind::Directory {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        return materialize(root, dest, opts);
    }

    // Directories are created writable so children can land in them; the
    // read-only modes are applied afterwards, deepest first.
    let mut dirs = Vec::new();
    for entry in &entries {
        let rel = entry.path.trim_start_matches('/');
        let item = if rel.is_empty() {
            dest.to_path_buf()
        } else {
            dest.join(rel)
        };
        if entry.kind == EntryKind::Directory {
            dirs.push(item.clone());
        }
        materialize(entry, &item, opts)?;
    }

    if !opts.make_writable {
        for dir in dirs.iter().rev() {
            fs::set_permissions(dir, fs::Permissions::from_mode(0o555))?;
        }
    }

    Ok(())
}

fn materialize(entry: &Entry, item: &Path, opts: ExtractOptions) -> Result<()> {
    match entry.kind {
        EntryKind::Directory => {
            fs::create_dir_all(item)?;
        }

        EntryKind::Regular => {
            let contents = entry.contents.as_deref().unwrap_or_default();
            fs::write(item, contents)?;
            let mode = file_mode(entry.executable, opts);
            fs::set_permissions(item, fs::Permissions::from_mode(mode))?;
        }

        EntryKind::Symlink => {
            let target = entry
                .target
                .as_deref()
                .ok_or_else(|| Error::MalformedArchive("symlink without target".to_string()))?;
            // Replace any stale link from a previous extraction
            if fs::symlink_metadata(item).is_ok() {
                fs::remove_file(item)?;
            }
            symlink(target, item)?;
        }
    }
    Ok(())
}

fn file_mode(executable: bool, opts: ExtractOptions) -> u32 {
    match (executable, opts.make_writable) {
        (true, true) => 0o755,
        (false, true) => 0o644,
        (true, false) => 0o555,
        (false, false) => 0o444,
    }
}

// src/rewrite/rewriter.rs

//! Reference rewriting inside an extracted tree
//!
//! Regular files get hash-level substitution only: binaries embed store
//! paths through many syntactic conventions (length-prefixed strings,
//! null-terminated literals, shell fragments), but the 32-character hash is
//! what identifies the entry, and replacing just the hash keeps file length
//! and therefore embedded offset tables intact. Symlink targets get
//! full-path substitution first, falling back to hash-level when no whole
//! old path occurs. Directories are untouched. Applying the same map twice
//! is a no-op: new hashes never contain old hashes.

use crate::error::Result;
use crate::rewrite::map::RewriteMap;
use std::fs;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

/// Apply the rewrite map to every file and symlink under `root`.
///
/// Returns the number of entries that were modified.
pub fn rewrite_tree(root: &Path, rewrites: &RewriteMap) -> Result<usize> {
    let mut modified = 0;

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
        })?;
        let file_type = entry.file_type();

        if file_type.is_file() {
            if rewrite_file(entry.path(), rewrites)? {
                modified += 1;
            }
        } else if file_type.is_symlink() {
            if rewrite_symlink(entry.path(), rewrites)? {
                modified += 1;
            }
        }
    }

    debug!("rewrote {} entries under {}", modified, root.display());
    Ok(modified)
}

/// Substitute old hashes in a regular file's contents.
fn rewrite_file(path: &Path, rewrites: &RewriteMap) -> Result<bool> {
    let mut contents = fs::read(path)?;
    let mut changed = false;

    for rewrite in rewrites.iter() {
        if rewrite.old_hash.is_empty() || rewrite.new_hash.is_empty() {
            continue;
        }
        changed |= replace_in_place(
            &mut contents,
            rewrite.old_hash.as_bytes(),
            rewrite.new_hash.as_bytes(),
        ) > 0;
    }

    if changed {
        // Write through the existing file so the executable bit survives
        fs::write(path, &contents)?;
    }
    Ok(changed)
}

/// Substitute in a symlink target, preferring whole-path replacement.
fn rewrite_symlink(path: &Path, rewrites: &RewriteMap) -> Result<bool> {
    let target = fs::read_link(path)?;
    let mut bytes = target.as_os_str().as_bytes().to_vec();
    let mut changed = false;

    for rewrite in rewrites.iter() {
        if replace_in_place(
            &mut bytes,
            rewrite.old_path.as_bytes(),
            rewrite.new_path.as_bytes(),
        ) > 0
        {
            changed = true;
        } else if !rewrite.old_hash.is_empty()
            && replace_in_place(
                &mut bytes,
                rewrite.old_hash.as_bytes(),
                rewrite.new_hash.as_bytes(),
            ) > 0
        {
            changed = true;
        }
    }

    if changed {
        let new_target = std::ffi::OsString::from_vec(bytes);
        fs::remove_file(path)?;
        std::os::unix::fs::symlink(&new_target, path)?;
    }
    Ok(changed)
}

/// Replace every occurrence of `needle` with `replacement` (equal length)
/// and return the number of replacements.
///
/// Hashes and full store paths in a rewrite pair always have matching
/// lengths, so substitution never shifts bytes.
fn replace_in_place(haystack: &mut [u8], needle: &[u8], replacement: &[u8]) -> usize {
    debug_assert_eq!(needle.len(), replacement.len());
    if needle.is_empty() || haystack.len() < needle.len() {
        return 0;
    }

    let mut count = 0;
    let mut at = 0;
    while at + needle.len() <= haystack.len() {
        if &haystack[at..at + needle.len()] == needle {
            haystack[at..at + needle.len()].copy_from_slice(replacement);
            at += needle.len();
            count += 1;
        } else {
            at += 1;
        }
    }
    count
}

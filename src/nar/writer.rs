// src/nar/writer.rs

//! Canonical archive serialization of a filesystem subtree
//!
//! Depth-first, directory children sorted by raw name bytes, the executable
//! bit folded to a single flag, symlink targets recorded verbatim. File
//! modes beyond the executable bit and timestamps are not representable.
//! Sockets, fifos, and devices are rejected. The daemon assigns identity
//! from these bytes, so the serialization must be bit-exact.

use crate::error::{Error, Result};
use crate::nar::wire::{write_bytes, write_str};
use crate::nar::NAR_MAGIC;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Serialize the subtree rooted at `path` into canonical archive bytes.
pub fn pack_path(path: &Path) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    write_str(&mut out, NAR_MAGIC);
    pack_node(&mut out, path)?;
    Ok(out)
}

fn pack_node(out: &mut Vec<u8>, path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path)?;
    let file_type = meta.file_type();

    write_str(out, "(");
    write_str(out, "type");

    if file_type.is_symlink() {
        let target = fs::read_link(path)?;
        write_str(out, "symlink");
        write_str(out, "target");
        write_bytes(out, target.as_os_str().as_bytes());
    } else if file_type.is_file() {
        write_str(out, "regular");
        if meta.permissions().mode() & 0o111 != 0 {
            write_str(out, "executable");
            write_str(out, "");
        }
        write_str(out, "contents");
        write_bytes(out, &fs::read(path)?);
    } else if file_type.is_dir() {
        write_str(out, "directory");

        let mut children: Vec<_> = fs::read_dir(path)?
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .map(|e| e.file_name())
            .collect();
        children.sort_by(|a, b| a.as_bytes().cmp(b.as_bytes()));

        for name in children {
            write_str(out, "entry");
            write_str(out, "(");
            write_str(out, "name");
            write_bytes(out, name.as_bytes());
            write_str(out, "node");
            pack_node(out, &path.join(&name))?;
            write_str(out, ")");
        }
    } else {
        return Err(Error::UnsupportedEntryKind {
            path: path.display().to_string(),
            kind: kind_name(&file_type).to_string(),
        });
    }

    write_str(out, ")");
    Ok(())
}

fn kind_name(file_type: &fs::FileType) -> &'static str {
    use std::os::unix::fs::FileTypeExt;
    if file_type.is_fifo() {
        "fifo"
    } else if file_type.is_socket() {
        "socket"
    } else if file_type.is_block_device() {
        "block device"
    } else if file_type.is_char_device() {
        "character device"
    } else {
        "unknown"
    }
}

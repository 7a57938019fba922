// src/nar/reader.rs

//! Archive parser
//!
//! Parses canonical archive bytes into a flat, preorder list of entries.
//! Payloads for regular files are delivered inline in the entry (the
//! archives this tool handles are store entries that already fit in memory
//! for import/export, so no follow-on reader indirection is needed).
//! Entry paths are relative to the archive root; `/` denotes the root
//! itself.

use crate::error::{Error, Result};
use crate::nar::wire::Reader;
use crate::nar::{Entry, EntryKind, NAR_MAGIC};

/// Parse a complete archive; trailing bytes are an error.
pub fn parse(bytes: &[u8]) -> Result<Vec<Entry>> {
    let (entries, consumed) = parse_prefix(bytes)?;
    if consumed != bytes.len() {
        return Err(Error::MalformedArchive(format!(
            "{} trailing bytes after archive",
            bytes.len() - consumed
        )));
    }
    Ok(entries)
}

/// Parse one archive from the front of `bytes`, returning the entries and
/// the number of bytes consumed. Used by the export envelope decoder, where
/// the archive is self-delimiting inside a larger frame.
pub fn parse_prefix(bytes: &[u8]) -> Result<(Vec<Entry>, usize)> {
    let mut r = Reader::new(bytes);
    r.expect_str(NAR_MAGIC)?;

    let mut entries = Vec::new();
    parse_node(&mut r, "/", &mut entries)?;
    Ok((entries, r.position()))
}

fn parse_node(r: &mut Reader<'_>, path: &str, entries: &mut Vec<Entry>) -> Result<()> {
    r.expect_str("(")?;
    r.expect_str("type")?;
    let kind = r.read_str()?;

    match kind.as_str() {
        "regular" => {
            let mut executable = false;
            loop {
                let tag = r.read_str()?;
                match tag.as_str() {
                    "executable" => {
                        r.expect_str("")?;
                        executable = true;
                    }
                    "contents" => {
                        let contents = r.read_bytes()?.to_vec();
                        r.expect_str(")")?;
                        entries.push(Entry {
                            path: path.to_string(),
                            kind: EntryKind::Regular,
                            executable,
                            target: None,
                            contents: Some(contents),
                        });
                        return Ok(());
                    }
                    other => {
                        return Err(Error::MalformedArchive(format!(
                            "unexpected tag {:?} in regular entry",
                            other
                        )));
                    }
                }
            }
        }

        "symlink" => {
            r.expect_str("target")?;
            let target = r.read_str()?;
            r.expect_str(")")?;
            entries.push(Entry {
                path: path.to_string(),
                kind: EntryKind::Symlink,
                executable: false,
                target: Some(target),
                contents: None,
            });
            Ok(())
        }

        "directory" => {
            entries.push(Entry {
                path: path.to_string(),
                kind: EntryKind::Directory,
                executable: false,
                target: None,
                contents: None,
            });

            let mut prev_name: Option<Vec<u8>> = None;
            loop {
                let tag = r.read_str()?;
                match tag.as_str() {
                    ")" => return Ok(()),
                    "entry" => {
                        r.expect_str("(")?;
                        r.expect_str("name")?;
                        let name = r.read_str()?;
                        validate_name(&name)?;

                        // Children must be strictly sorted by raw bytes,
                        // the invariant that makes the form canonical.
                        if let Some(prev) = &prev_name {
                            if name.as_bytes() <= prev.as_slice() {
                                return Err(Error::MalformedArchive(format!(
                                    "directory entries out of order at {:?}",
                                    name
                                )));
                            }
                        }
                        prev_name = Some(name.as_bytes().to_vec());

                        r.expect_str("node")?;
                        let child = if path == "/" {
                            format!("/{}", name)
                        } else {
                            format!("{}/{}", path, name)
                        };
                        parse_node(r, &child, entries)?;
                        r.expect_str(")")?;
                    }
                    other => {
                        return Err(Error::MalformedArchive(format!(
                            "unexpected tag {:?} in directory entry",
                            other
                        )));
                    }
                }
            }
        }

        other => Err(Error::MalformedArchive(format!(
            "unknown entry type {:?}",
            other
        ))),
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\0') {
        return Err(Error::MalformedArchive(format!(
            "invalid entry name {:?}",
            name
        )));
    }
    Ok(())
}

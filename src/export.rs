// src/export.rs

//! Export envelope codec
//!
//! The framed container used to move archives in and out of the store.
//! Each record wraps one archive together with its subject path, direct
//! references, and an (always empty) deriver slot:
//!
//! ```text
//! for each record:
//!     u64  version tag = 1
//!     raw archive bytes (self-delimiting)
//!     u64  sentinel = 0x4558494E
//!     len-prefixed string: subject path
//!     u64  n_refs
//!     n_refs x len-prefixed string
//!     len-prefixed string: deriver (empty)
//! u64  0
//! u64  0
//! ```
//!
//! Integers are 8 bytes little-endian and strings are zero-padded to 8-byte
//! boundaries, exactly as inside the archive format itself.

use crate::config::{EXPORT_MAGIC, EXPORT_VERSION};
use crate::error::{Error, Result};
use crate::nar;
use crate::nar::wire::{write_str, write_u64, Reader};
use crate::store::path as store_path;
use std::path::Path;

/// One (archive, metadata) record of an export envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRecord {
    /// Subject store path the archive belongs to
    pub path: String,
    /// Direct references of the subject
    pub references: Vec<String>,
    /// Deriver slot; always empty for this tool
    pub deriver: String,
    /// Canonical archive bytes
    pub archive: Vec<u8>,
}

/// Encode records into envelope bytes.
pub fn encode(records: &[ExportRecord]) -> Vec<u8> {
    let mut out = Vec::new();
    for record in records {
        write_u64(&mut out, EXPORT_VERSION);
        out.extend_from_slice(&record.archive);
        write_u64(&mut out, EXPORT_MAGIC);
        write_str(&mut out, &record.path);
        write_u64(&mut out, record.references.len() as u64);
        for reference in &record.references {
            write_str(&mut out, reference);
        }
        write_str(&mut out, &record.deriver);
    }
    write_u64(&mut out, 0);
    write_u64(&mut out, 0);
    out
}

/// Decode envelope bytes back into records.
pub fn decode(bytes: &[u8]) -> Result<Vec<ExportRecord>> {
    let mut records = Vec::new();
    let mut pos = 0usize;

    loop {
        let mut r = Reader::new(&bytes[pos..]);
        let tag = r.read_u64()?;
        pos += r.position();

        if tag == 0 {
            let mut r = Reader::new(&bytes[pos..]);
            let terminator = r.read_u64()?;
            pos += r.position();
            if terminator != 0 {
                return Err(Error::MalformedArchive(format!(
                    "bad envelope terminator: {:#x}",
                    terminator
                )));
            }
            if pos != bytes.len() {
                return Err(Error::MalformedArchive(
                    "trailing bytes after envelope".to_string(),
                ));
            }
            return Ok(records);
        }

        if tag != EXPORT_VERSION {
            return Err(Error::MalformedArchive(format!(
                "unsupported export version: {}",
                tag
            )));
        }

        // The archive is self-delimiting; parse it to find where the
        // metadata frame starts.
        let (_, archive_len) = nar::parse_prefix(&bytes[pos..])?;
        let archive = bytes[pos..pos + archive_len].to_vec();
        pos += archive_len;

        let mut r = Reader::new(&bytes[pos..]);
        let sentinel = r.read_u64()?;
        if sentinel != EXPORT_MAGIC {
            return Err(Error::MalformedArchive(format!(
                "bad export sentinel: {:#x}",
                sentinel
            )));
        }

        let path = r.read_str()?;
        let n_refs = r.read_u64()? as usize;
        let mut references = Vec::with_capacity(n_refs);
        for _ in 0..n_refs {
            references.push(r.read_str()?);
        }
        let deriver = r.read_str()?;
        pos += r.position();

        records.push(ExportRecord {
            path,
            references,
            deriver,
            archive,
        });
    }
}

/// Pack a filesystem subtree and wrap it in a single-record envelope.
///
/// The declared subject path is synthesized from the content hash of the
/// archive bytes and returned alongside the envelope so callers never
/// recompute it. References are canonicalized to lexicographic order.
pub fn create(
    tree: &Path,
    name: &str,
    references: &[String],
    store_dir: &str,
) -> Result<(Vec<u8>, String)> {
    let archive = nar::pack_path(tree)?;
    let digest = store_path::content_hash(&archive);
    let declared = store_path::synthesize(&digest, name, store_dir);

    let mut references = references.to_vec();
    references.sort();
    references.dedup();

    let record = ExportRecord {
        path: declared.clone(),
        references,
        deriver: String::new(),
        archive,
    };
    Ok((encode(&[record]), declared))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample_archive() -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("data"), b"payload").unwrap();
        nar::pack_path(dir.path()).unwrap()
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let record = ExportRecord {
            path: "/nix/store/abc123dfg456hij789klm012npq345rs-test".to_string(),
            references: vec![
                "/nix/store/aaa123dfg456hij789klm012npq345rs-dep-a".to_string(),
                "/nix/store/bbb123dfg456hij789klm012npq345rs-dep-b".to_string(),
            ],
            deriver: String::new(),
            archive: sample_archive(),
        };

        let bytes = encode(std::slice::from_ref(&record));
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0], record);
    }

    #[test]
    fn test_encode_structure() {
        let archive = sample_archive();
        let record = ExportRecord {
            path: "/nix/store/abc-test".to_string(),
            references: vec![],
            deriver: String::new(),
            archive: archive.clone(),
        };
        let bytes = encode(&[record]);

        // Leading version tag
        assert_eq!(bytes[..8], 1u64.to_le_bytes());
        // Archive follows immediately
        assert_eq!(&bytes[8..8 + archive.len()], &archive[..]);
        // Sentinel spells NIXE little-endian
        let sentinel = &bytes[8 + archive.len()..8 + archive.len() + 8];
        assert_eq!(sentinel, [0x4e, 0x49, 0x58, 0x45, 0, 0, 0, 0]);
        // Trailing double zero
        assert_eq!(bytes[bytes.len() - 16..], [0u8; 16]);
    }

    #[test]
    fn test_decode_empty_envelope() {
        let mut bytes = Vec::new();
        write_u64(&mut bytes, 0);
        write_u64(&mut bytes, 0);
        assert_eq!(decode(&bytes).unwrap(), vec![]);
    }

    #[test]
    fn test_decode_rejects_bad_sentinel() {
        let record = ExportRecord {
            path: "/nix/store/abc-test".to_string(),
            references: vec![],
            deriver: String::new(),
            archive: sample_archive(),
        };
        let mut bytes = encode(&[record.clone()]);
        // Corrupt the sentinel
        let at = 8 + record.archive.len();
        bytes[at] ^= 0xff;
        assert!(matches!(decode(&bytes), Err(Error::MalformedArchive(_))));
    }

    #[test]
    fn test_decode_rejects_bad_version() {
        let mut bytes = Vec::new();
        write_u64(&mut bytes, 7);
        assert!(matches!(decode(&bytes), Err(Error::MalformedArchive(_))));
    }

    #[test]
    fn test_create_declares_content_address() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("pkg");
        fs::create_dir(&tree).unwrap();
        fs::write(tree.join("file"), b"contents").unwrap();

        let refs = vec!["/nix/store/bbb123dfg456hij789klm012npq345rs-b".to_string()];
        let (bytes, declared) = create(&tree, "pkg-1.0", &refs, "/nix/store").unwrap();

        let records = decode(&bytes).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, declared);
        assert_eq!(records[0].references, refs);
        assert!(records[0].deriver.is_empty());

        let expected_hash = crate::store::path::content_hash(&records[0].archive);
        assert_eq!(declared, format!("/nix/store/{}-pkg-1.0", expected_hash));
    }

    #[test]
    fn test_create_sorts_references() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("f"), b"x").unwrap();

        let refs = vec![
            "/nix/store/zzz123dfg456hij789klm012npq345rs-z".to_string(),
            "/nix/store/aaa123dfg456hij789klm012npq345rs-a".to_string(),
        ];
        let (bytes, _) = create(dir.path(), "x", &refs, "/nix/store").unwrap();
        let records = decode(&bytes).unwrap();
        assert_eq!(
            records[0].references,
            vec![
                "/nix/store/aaa123dfg456hij789klm012npq345rs-a".to_string(),
                "/nix/store/zzz123dfg456hij789klm012npq345rs-z".to_string(),
            ]
        );
    }
}

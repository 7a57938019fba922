// src/store/path.rs

//! Store path recognition, parsing, and synthesis
//!
//! A store path is `<store-dir>/<hash>-<name>` where the hash is 32
//! characters over the restricted base-32 alphabet (no e, o, t, u) and the
//! name is a free-form suffix. The content hash of an entry is the SHA-256
//! digest of its canonical archive bytes truncated to 20 bytes and encoded
//! with that alphabet, which is what makes paths content-addressed.

use crate::error::{Error, Result};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Length of the base-32 hash prefix in a store path
pub const HASH_LEN: usize = 32;

/// Restricted base-32 alphabet used by store path hashes
pub const BASE32_ALPHABET: &[u8] = b"0123456789abcdfghijklmnpqrsvwxyz";

/// Parsed components of a store path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePathInfo {
    pub hash: String,
    pub name: String,
}

/// True iff `path` lies under `store_dir`.
pub fn is_store_path(path: &str, store_dir: &str) -> bool {
    path.strip_prefix(store_dir)
        .is_some_and(|rest| rest.starts_with('/') && rest.len() > 1)
}

/// Reduce a path inside a store entry to the entry-level store path.
///
/// `/nix/store/<hash>-<name>/bin/sh` becomes `/nix/store/<hash>-<name>`;
/// returns `None` when `path` is not under `store_dir`.
pub fn entry_path<'a>(path: &'a str, store_dir: &str) -> Option<&'a str> {
    if !is_store_path(path, store_dir) {
        return None;
    }
    let rest = &path[store_dir.len() + 1..];
    match rest.find('/') {
        Some(idx) => Some(&path[..store_dir.len() + 1 + idx]),
        None => Some(path),
    }
}

/// True iff `s` is exactly 32 characters of the restricted alphabet.
pub fn is_valid_hash(s: &str) -> bool {
    s.len() == HASH_LEN && s.bytes().all(|b| BASE32_ALPHABET.contains(&b))
}

/// Split a store path into hash and name.
pub fn parse(path: &str, store_dir: &str) -> Result<StorePathInfo> {
    let entry = entry_path(path, store_dir)
        .ok_or_else(|| Error::MalformedStorePath(path.to_string()))?;
    let base = &entry[store_dir.len() + 1..];

    let (hash, name) = base
        .split_once('-')
        .ok_or_else(|| Error::MalformedStorePath(path.to_string()))?;

    if hash.len() != HASH_LEN || name.is_empty() {
        return Err(Error::MalformedStorePath(path.to_string()));
    }

    Ok(StorePathInfo {
        hash: hash.to_string(),
        name: name.to_string(),
    })
}

/// Extract the 32-character hash prefix, or `None` if not a store path.
pub fn extract_hash<'a>(path: &'a str, store_dir: &str) -> Option<&'a str> {
    let entry = entry_path(path, store_dir)?;
    let base = &entry[store_dir.len() + 1..];
    let hash = base.split('-').next()?;
    (hash.len() == HASH_LEN).then_some(hash)
}

/// Build a store path from components.
pub fn synthesize(hash: &str, name: &str, store_dir: &str) -> String {
    format!("{}/{}-{}", store_dir, hash, name)
}

/// Content-address archive bytes: SHA-256 truncated to 20 bytes, encoded
/// with the restricted base-32 alphabet. Always 32 characters.
pub fn content_hash(archive: &[u8]) -> String {
    let digest = Sha256::digest(archive);
    nix_base32::to_nix_base32(&digest[..20])
}

/// Random placeholder hash for dry-run paths that are never imported.
pub fn random_hash() -> String {
    let mut bytes = [0u8; 20];
    rand::thread_rng().fill(&mut bytes[..]);
    nix_base32::to_nix_base32(&bytes)
}

// tests/export_roundtrip.rs

//! Archive and export envelope round-trips at the crate boundary.

mod common;

use common::{MemoryStore, STORE_DIR};
use nix_patch::store::path as store_path;
use nix_patch::store::Store;
use nix_patch::{export, nar, ExportRecord, ExtractOptions};
use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::sync::Arc;

#[test]
fn test_directory_archive_roundtrip() {
    let src = tempfile::tempdir().unwrap();
    let root = src.path().join("pkg");
    fs::create_dir(&root).unwrap();
    fs::create_dir(root.join("bin")).unwrap();
    fs::write(root.join("bin/app"), b"#!/bin/sh\nexec true\n").unwrap();
    fs::set_permissions(root.join("bin/app"), fs::Permissions::from_mode(0o755)).unwrap();
    fs::write(root.join("share"), b"data file").unwrap();
    symlink("bin/app", root.join("run")).unwrap();

    let archive = nar::pack_path(&root).unwrap();

    let dest = tempfile::tempdir().unwrap();
    let out = dest.path().join("pkg");
    nar::extract(
        &archive,
        &out,
        ExtractOptions {
            make_writable: true,
        },
    )
    .unwrap();

    assert_eq!(nar::pack_path(&out).unwrap(), archive);
}

#[test]
fn test_single_file_archive_roundtrip() {
    let src = tempfile::tempdir().unwrap();
    let file = src.path().join("alone");
    fs::write(&file, b"just one file").unwrap();

    let archive = nar::pack_path(&file).unwrap();
    let entries = nar::parse(&archive).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "/");

    let dest = tempfile::tempdir().unwrap();
    let out = dest.path().join("alone");
    nar::extract(
        &archive,
        &out,
        ExtractOptions {
            make_writable: true,
        },
    )
    .unwrap();

    assert_eq!(nar::pack_path(&out).unwrap(), archive);
}

#[test]
fn test_envelope_roundtrip_preserves_record() {
    let src = tempfile::tempdir().unwrap();
    fs::write(src.path().join("data"), b"envelope payload").unwrap();
    let archive = nar::pack_path(src.path()).unwrap();

    let record = ExportRecord {
        path: store_path::synthesize(&"d".repeat(32), "wrapped", STORE_DIR),
        references: vec![
            store_path::synthesize(&"b".repeat(32), "dep-two", STORE_DIR),
            store_path::synthesize(&"a".repeat(32), "dep-one", STORE_DIR),
        ],
        deriver: String::new(),
        archive,
    };

    let decoded = export::decode(&export::encode(std::slice::from_ref(&record))).unwrap();
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].path, record.path);
    assert_eq!(decoded[0].archive, record.archive);
    assert_eq!(decoded[0].deriver, record.deriver);

    // Reference order is not significant
    let got: BTreeSet<&String> = decoded[0].references.iter().collect();
    let want: BTreeSet<&String> = record.references.iter().collect();
    assert_eq!(got, want);
}

#[test]
fn test_import_registers_content_address() {
    let store = Arc::new(MemoryStore::new());

    let src = tempfile::tempdir().unwrap();
    let tree = src.path().join("imported");
    fs::create_dir(&tree).unwrap();
    fs::write(tree.join("data"), b"fresh content").unwrap();

    let (envelope, declared) = export::create(&tree, "imported", &[], STORE_DIR).unwrap();
    let registered = store.import(&envelope).unwrap();

    assert_eq!(registered, declared);
    assert!(store.has_path(&registered));

    let info = store_path::parse(&registered, STORE_DIR).unwrap();
    assert_eq!(info.name, "imported");
    assert!(store_path::is_valid_hash(&info.hash));

    // The registered archive round-trips byte-for-byte
    let archive = store.dump(&registered).unwrap();
    assert_eq!(store_path::content_hash(&archive), info.hash);
}

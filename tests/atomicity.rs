//! Atomicity and Isolation Tests
//!
//! A failed commit must leave no namespace-prefixed file behind, and a
//! failed update must leave every pre-existing file byte-identical.

use holo_store::Store;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn open_initialized(temp: &TempDir) -> Store {
    let store = Store::open(temp.path().join("store")).expect("store opens");
    store.init().expect("init succeeds");
    store
}

fn submit(store: &Store, type_name: &str, content: Value) -> String {
    store
        .submit_artifact(type_name, &content)
        .expect("artifact submission succeeds")
        .cid
        .to_string()
}

fn files_with_prefix(root: &Path, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(prefix))
        .collect();
    names.sort();
    names
}

/// Full snapshot of the store directory: filename -> raw bytes.
fn snapshot(root: &Path) -> BTreeMap<String, Vec<u8>> {
    fs::read_dir(root)
        .unwrap()
        .map(|e| {
            let e = e.unwrap();
            (
                e.file_name().to_string_lossy().into_owned(),
                fs::read(e.path()).unwrap(),
            )
        })
        .collect()
}

// =============================================================================
// Commit atomicity
// =============================================================================

#[test]
fn test_incomplete_manifest_leaves_no_namespace_files() {
    let temp = TempDir::new().unwrap();
    let store = open_initialized(&temp);

    // Spec only; the requirement model marks interface required.
    let mut manifest = BTreeMap::new();
    manifest.insert(
        "spec".to_string(),
        submit(
            &store,
            "spec",
            json!({"namespace": "hologram.widget", "conformance": false, "type": "object"}),
        ),
    );

    let err = store.submit_manifest("hologram.widget", &manifest).unwrap_err();
    let issues = err.issues().expect("rejection carries issues");
    assert!(issues.iter().any(|i| i.message.contains("interface")));
    assert!(
        files_with_prefix(store.cas().dir().root(), "hologram.widget").is_empty(),
        "failed commit must leave nothing behind"
    );
}

#[test]
fn test_unresolved_cids_leave_no_namespace_files() {
    let temp = TempDir::new().unwrap();
    let store = open_initialized(&temp);

    let mut manifest = BTreeMap::new();
    manifest.insert("spec".to_string(), format!("cid:{}", "1".repeat(64)));
    manifest.insert("interface".to_string(), format!("cid:{}", "2".repeat(64)));

    let err = store.submit_manifest("hologram.widget", &manifest).unwrap_err();
    let issues = err.issues().expect("rejection carries issues");
    assert_eq!(
        issues.iter().filter(|i| i.message.contains("no stored artifact")).count(),
        2,
        "every dangling CID reported: {issues:?}"
    );
    assert!(files_with_prefix(store.cas().dir().root(), "hologram.widget").is_empty());
}

#[test]
fn test_invalid_conformance_artifact_blocks_all_writes() {
    let temp = TempDir::new().unwrap();
    let store = open_initialized(&temp);

    let spec_cid = submit(
        &store,
        "spec",
        json!({"namespace": "hologram.widget", "conformance": false, "type": "object"}),
    );
    // Stored directly so phase-1 validation cannot catch it: wrong parent.
    let bad_interface = json!({
        "namespace": "hologram.widget.interface",
        "parent": "hologram.other",
        "conformance": true
    });
    let iface_cid = store.cas().store(&bad_interface).unwrap().cid.to_string();

    let mut manifest = BTreeMap::new();
    manifest.insert("spec".to_string(), spec_cid);
    manifest.insert("interface".to_string(), iface_cid);

    let err = store.submit_manifest("hologram.widget", &manifest).unwrap_err();
    assert!(err.issues().is_some());
    assert!(files_with_prefix(store.cas().dir().root(), "hologram.widget").is_empty());
}

// =============================================================================
// Update isolation
// =============================================================================

fn create_widget(store: &Store) {
    let mut manifest = BTreeMap::new();
    manifest.insert(
        "spec".to_string(),
        submit(
            &store,
            "spec",
            json!({"namespace": "hologram.widget", "conformance": false, "type": "object"}),
        ),
    );
    manifest.insert(
        "interface".to_string(),
        submit(
            &store,
            "interface",
            json!({
                "namespace": "hologram.widget.interface",
                "parent": "hologram.widget",
                "conformance": true
            }),
        ),
    );
    store.submit_manifest("hologram.widget", &manifest).unwrap();
}

#[test]
fn test_rejected_update_leaves_store_byte_identical() {
    let temp = TempDir::new().unwrap();
    let store = open_initialized(&temp);
    create_widget(&store);

    let before = snapshot(store.cas().dir().root());

    // Invalid spec: not a schema document.
    let mut changes = BTreeMap::new();
    changes.insert(
        "spec".to_string(),
        json!({"namespace": "hologram.widget", "conformance": false, "type": 17}),
    );
    let err = store.update("hologram.widget", &changes).unwrap_err();
    assert!(err.issues().is_some());

    assert_eq!(
        snapshot(store.cas().dir().root()),
        before,
        "failed update must leave every file byte-identical"
    );

    // The pre-update spec still reads back unchanged.
    let spec = store.read_artifact("hologram.widget", "spec").unwrap();
    assert_eq!(spec["type"], "object");
}

#[test]
fn test_update_verify_failure_restores_previous_state() {
    let temp = TempDir::new().unwrap();
    let store = open_initialized(&temp);

    // Tighten hologram.docs' spec so its existing docs artifact no longer
    // conforms. The supplied spec itself is valid, so only the post-write
    // verify can catch it, forcing a full restore.
    let before = snapshot(store.cas().dir().root());
    let mut changes = BTreeMap::new();
    changes.insert(
        "spec".to_string(),
        json!({
            "namespace": "hologram.docs",
            "conformance": false,
            "type": "object",
            "properties": {"conformance": {"const": true}},
            "required": ["namespace", "parent", "conformance", "marker"]
        }),
    );

    let err = store.update("hologram.docs", &changes).unwrap_err();
    let issues = err.issues().expect("verify rejection carries issues");
    assert!(issues.iter().any(|i| i.message.contains("marker")));

    assert_eq!(
        snapshot(store.cas().dir().root()),
        before,
        "verify failure must restore the byte-identical pre-state"
    );
    let results = store.validate_all().unwrap();
    assert!(results.values().all(|r| r.valid));
}

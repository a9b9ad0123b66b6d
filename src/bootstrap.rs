//! First-run seeding of the schema component set.
//!
//! The commit protocol validates against schemas that live in the store, so
//! an empty store can accept nothing. `init` breaks the cycle by writing the
//! canonical schema components directly through the artifact store, bypassing
//! commit validation exactly once. The seeded set must validate cleanly under
//! its own rules; `validate_all` on a fresh store is the regression check.

use serde_json::{json, Value};
use std::collections::BTreeMap;

use holo_cas::ArtifactStore;

use crate::commit::CommitError;
use crate::namespace::{NAMESPACE_PATTERN, ROOT};
use crate::report::IssueCode;
use crate::schema::SchemaCache;

/// The universal base schema, stored as the spec artifact of `hologram`.
/// Every conformance artifact in the store must satisfy it.
fn base_schema() -> Value {
    json!({
        "namespace": ROOT,
        "conformance": false,
        "version": "1.0.0",
        "description": "Universal base schema for conformance artifacts",
        "type": "object",
        "properties": {
            "namespace": {"type": "string", "pattern": NAMESPACE_PATTERN},
            "parent": {"type": "string", "pattern": NAMESPACE_PATTERN},
            "conformance": {"type": "boolean"},
            "description": {"type": "string"}
        },
        "required": ["namespace", "conformance"]
    })
}

/// The conformance requirement model, stored as the spec artifact of
/// `hologram.component`.
fn requirement_model() -> Value {
    json!({
        "namespace": "hologram.component",
        "conformance": false,
        "version": "1.0.0",
        "description": "Conformance requirement model: one entry per recognized type",
        "type": "object",
        "conformanceTypes": {
            "interface": {"required": true, "schema": "hologram.interface"},
            "docs": {"required": false, "schema": "hologram.docs"},
            "test": {"required": false, "schema": "hologram.test"},
            "manager": {"required": false, "schema": "hologram.manager"}
        }
    })
}

/// Type schema governing conformance artifacts of type `T`, stored as the
/// spec artifact of `hologram.T`.
fn type_schema(type_name: &str) -> Value {
    json!({
        "namespace": format!("{ROOT}.{type_name}"),
        "conformance": false,
        "version": "1.0.0",
        "description": format!("Schema for {type_name} conformance artifacts"),
        "type": "object",
        "properties": {
            "namespace": {"type": "string", "pattern": NAMESPACE_PATTERN},
            "parent": {"type": "string", "pattern": NAMESPACE_PATTERN},
            "conformance": {"const": true}
        },
        "required": ["namespace", "parent", "conformance"]
    })
}

/// Minimal conformance artifact of the given type for a seeded component.
fn conformance_stub(component: &str, type_name: &str) -> Value {
    json!({
        "namespace": format!("{component}.{type_name}"),
        "parent": component,
        "conformance": true,
        "description": format!("{type_name} artifact of {component}")
    })
}

/// The seeded components, each as `(namespace, type -> content)`.
///
/// Every canonical type definition `hologram.T` carries its own `T`
/// artifact, so each type schema is exercised against itself from the
/// start. For `hologram.interface` that artifact doubles as the required
/// interface.
fn seed_components() -> Vec<(String, BTreeMap<String, Value>)> {
    let mut components = Vec::new();

    let mut root = BTreeMap::new();
    root.insert("spec".to_string(), base_schema());
    root.insert("interface".to_string(), conformance_stub(ROOT, "interface"));
    components.push((ROOT.to_string(), root));

    let mut model = BTreeMap::new();
    model.insert("spec".to_string(), requirement_model());
    model.insert(
        "interface".to_string(),
        conformance_stub("hologram.component", "interface"),
    );
    components.push(("hologram.component".to_string(), model));

    for type_name in ["interface", "docs", "test", "manager"] {
        let ns = format!("{ROOT}.{type_name}");
        let mut artifacts = BTreeMap::new();
        artifacts.insert("spec".to_string(), type_schema(type_name));
        artifacts.insert(
            "interface".to_string(),
            conformance_stub(&ns, "interface"),
        );
        artifacts.insert(type_name.to_string(), conformance_stub(&ns, type_name));
        components.push((ns, artifacts));
    }

    components
}

/// Seed a fresh store with the canonical schema components. Refuses to run
/// against a store that already holds any component.
pub fn init(cache: &mut SchemaCache, cas: &ArtifactStore) -> Result<Vec<String>, CommitError> {
    if !cas.dir().list_index_stems()?.is_empty() {
        return Err(CommitError::rejected(
            IssueCode::Precondition,
            "store already holds components; init only runs on an empty store",
        ));
    }

    let mut written = Vec::new();
    for (ns, artifacts) in seed_components() {
        let mut refs: BTreeMap<String, String> = BTreeMap::new();
        for (type_name, content) in &artifacts {
            let stored = cas.store_named(content)?;
            if !stored.existed {
                written.push(stored.stem.clone());
            }
            refs.insert(type_name.clone(), stored.stem);
        }
        let index_stem = format!("{ns}.index");
        cas.dir()
            .write_json_atomic(&index_stem, &json!({"namespace": ns, "artifacts": refs}))?;
        written.push(index_stem);
    }

    cache.invalidate();
    Ok(written)
}

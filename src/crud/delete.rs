//! Component deletion with dependency enforcement.
//!
//! A component may only be deleted when nothing else depends on it. The
//! scan walks every other index and every artifact those indexes reference:
//! a dependent is any component whose artifact claims `parent == ns`, whose
//! `$ref`/`$schema` strings name `ns`, or whose role as the requirement
//! model points a schema at `ns`. The index is removed first (the commit
//! marker disappears, leaving only inert orphans if interrupted), then the
//! referenced files.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use holo_cas::ArtifactStore;

use crate::namespace::{string_refers_to, Namespace, ROOT};
use crate::report::{IssueCode, ValidationIssue};
use crate::schema::{SchemaCache, REQUIREMENT_MODEL};

use super::{load_index, parse_artifacts, schema_refs, stem_referenced_elsewhere, CrudError};

/// Outcome of a successful delete.
#[derive(Debug, Serialize)]
pub struct DeleteReceipt {
    pub namespace: String,
    pub removed: Vec<String>,
    /// Stems left in place because another index still references them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ValidationIssue>,
}

/// Delete a component and every file its index references.
pub fn delete(
    cache: &mut SchemaCache,
    cas: &ArtifactStore,
    ns: &Namespace,
) -> Result<DeleteReceipt, CrudError> {
    let index = load_index(cas, ns)?;
    let refs = parse_artifacts(&index)?;

    // The two discovery components anchor schema resolution for the whole
    // store and are never deletable.
    let model_ns = REQUIREMENT_MODEL.trim_end_matches(".spec");
    if ns.as_str() == ROOT || ns.as_str() == model_ns {
        return Err(CrudError::Rejected(vec![ValidationIssue::new(
            IssueCode::DependencyExists,
            format!("'{ns}' is a discovery component; every validation depends on it"),
        )]));
    }

    let mut dependents: BTreeMap<String, String> = BTreeMap::new();
    let reqs = cache.requirements(cas)?;
    if reqs.mentions(ns.as_str()) {
        dependents.insert(
            model_ns.to_string(),
            format!("component '{model_ns}' depends on '{ns}'"),
        );
    }

    for index_stem in cas.dir().list_index_stems()? {
        if index_stem == ns.index_stem() {
            continue;
        }
        let Some(other_ns) = index_stem.strip_suffix(".index") else {
            continue;
        };
        let other = match cas.dir().read_json(&index_stem) {
            Ok(other) => other,
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e.into()),
        };
        let Some(other_refs) = other.get("artifacts").and_then(Value::as_object) else {
            continue;
        };
        for stem in other_refs.values().filter_map(Value::as_str) {
            let content = match cas.get_by_stem(stem) {
                Ok(content) => content,
                // An artifact we cannot inspect may well depend on `ns`;
                // refusing the delete is the only safe reading.
                Err(e) => {
                    dependents.insert(
                        other_ns.to_string(),
                        format!(
                            "artifact '{stem}' of component '{other_ns}' could not be \
                             inspected ({e}); assuming a dependency on '{ns}'"
                        ),
                    );
                    break;
                }
            };
            let depends = content
                .get("parent")
                .and_then(Value::as_str)
                .is_some_and(|parent| parent == ns.as_str())
                || schema_refs(&content)
                    .iter()
                    .any(|r| string_refers_to(r, ns.as_str()));
            if depends {
                dependents.insert(
                    other_ns.to_string(),
                    format!("component '{other_ns}' depends on '{ns}'"),
                );
                break;
            }
        }
    }

    if !dependents.is_empty() {
        let issues = dependents
            .into_values()
            .map(|message| ValidationIssue::new(IssueCode::DependencyExists, message))
            .collect();
        return Err(CrudError::Rejected(issues));
    }

    // Index first.
    cas.dir().remove(&ns.index_stem())?;
    let mut removed = vec![ns.index_stem()];
    let mut skipped = Vec::new();
    let mut warnings = Vec::new();

    let stems: BTreeSet<&String> = refs.values().collect();
    for stem in stems {
        match stem_referenced_elsewhere(cas, stem, &ns.index_stem()) {
            Ok(true) => skipped.push(stem.clone()),
            Ok(false) => match cas.dir().remove(stem) {
                Ok(_) => removed.push(stem.clone()),
                Err(e) => {
                    eprintln!("[delete] could not remove '{stem}': {e}");
                    warnings.push(ValidationIssue::new(
                        IssueCode::Rollback,
                        format!("file '{stem}' was not removed: {e}"),
                    ));
                }
            },
            Err(e) => {
                eprintln!("[delete] reference scan failed for '{stem}': {e}");
                warnings.push(ValidationIssue::new(
                    IssueCode::Rollback,
                    format!("file '{stem}' was kept; reference scan failed: {e}"),
                ));
            }
        }
    }

    cache.invalidate();
    Ok(DeleteReceipt {
        namespace: ns.as_str().to_string(),
        removed,
        skipped,
        warnings,
    })
}

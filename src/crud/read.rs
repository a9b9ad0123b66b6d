//! Component reads.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use holo_cas::{ArtifactStore, CasError};

use crate::namespace::{ArtifactKind, Namespace};
use crate::report::{IssueCode, ValidationIssue};

use super::{load_index, parse_artifacts, CrudError};

/// Everything a component currently holds, keyed by type. Artifacts whose
/// files are missing or unparseable are reported in `warnings` instead of
/// failing the whole read.
#[derive(Debug, Serialize)]
pub struct ComponentContents {
    pub namespace: String,
    pub artifacts: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ValidationIssue>,
}

/// Read one artifact of a component by kind.
pub fn read_artifact(
    cas: &ArtifactStore,
    ns: &Namespace,
    kind: &ArtifactKind,
) -> Result<Value, CrudError> {
    let index = load_index(cas, ns)?;
    let artifacts = parse_artifacts(&index)?;
    let stem = artifacts
        .get(kind.as_str())
        .ok_or_else(|| CrudError::ArtifactMissing {
            namespace: ns.as_str().to_string(),
            kind: kind.as_str().to_string(),
        })?;
    Ok(cas.get_by_stem(stem)?)
}

/// Read every artifact of a component.
pub fn read_component(cas: &ArtifactStore, ns: &Namespace) -> Result<ComponentContents, CrudError> {
    let index = load_index(cas, ns)?;
    let refs = parse_artifacts(&index)?;

    let mut artifacts = BTreeMap::new();
    let mut warnings = Vec::new();
    for (type_name, stem) in &refs {
        match cas.get_by_stem(stem) {
            Ok(content) => {
                artifacts.insert(type_name.clone(), content);
            }
            Err(e) if e.is_not_found() => warnings.push(ValidationIssue::new(
                IssueCode::ArtifactNotFound,
                format!("'{type_name}' artifact '{stem}' is missing"),
            )),
            Err(CasError::Json(e)) => warnings.push(ValidationIssue::new(
                IssueCode::Structural,
                format!("'{type_name}' artifact '{stem}' is not valid JSON: {e}"),
            )),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(ComponentContents {
        namespace: ns.as_str().to_string(),
        artifacts,
        warnings,
    })
}

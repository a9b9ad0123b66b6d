//! Component lifecycle operations over a committed store.
//!
//! Creation is the commit protocol's job; this module covers everything
//! after it: reads, in-place updates that supersede artifacts atomically,
//! and dependency-checked deletes.

mod delete;
mod read;
mod update;

pub use delete::{delete, DeleteReceipt};
pub use read::{read_artifact, read_component, ComponentContents};
pub use update::{update, UpdateReceipt};

use serde_json::Value;
use std::collections::BTreeMap;

use holo_cas::{ArtifactStore, CasError};

use crate::namespace::Namespace;
use crate::report::{IssueCode, ValidationIssue};
use crate::schema::SchemaError;

/// Errors for read/update/delete operations.
#[derive(Debug, thiserror::Error)]
pub enum CrudError {
    #[error("component '{0}' does not exist")]
    NotFound(String),

    #[error("component '{namespace}' has no '{kind}' artifact")]
    ArtifactMissing { namespace: String, kind: String },

    #[error("operation rejected with {} issue(s)", .0.len())]
    Rejected(Vec<ValidationIssue>),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Cas(#[from] CasError),
}

impl CrudError {
    pub fn issues(&self) -> Option<&[ValidationIssue]> {
        match self {
            Self::Rejected(issues) => Some(issues),
            _ => None,
        }
    }
}

/// Load a component's index, mapping a missing file to [`CrudError::NotFound`].
pub(crate) fn load_index(cas: &ArtifactStore, ns: &Namespace) -> Result<Value, CrudError> {
    match cas.dir().read_json(&ns.index_stem()) {
        Ok(index) => Ok(index),
        Err(e) if e.is_not_found() => Err(CrudError::NotFound(ns.as_str().to_string())),
        Err(e) => Err(e.into()),
    }
}

/// Parse the `artifacts` map out of an index document.
pub(crate) fn parse_artifacts(index: &Value) -> Result<BTreeMap<String, String>, CrudError> {
    index
        .get("artifacts")
        .cloned()
        .map(serde_json::from_value)
        .and_then(Result::ok)
        .ok_or_else(|| {
            CrudError::Rejected(vec![ValidationIssue::new(
                IssueCode::Structural,
                "index has no usable artifacts map",
            )])
        })
}

/// True if any index other than `exclude_index` still references `stem`.
/// Content addressing lets two components share a file; a supersede or
/// delete must not pull a shared file out from under the other component.
pub(crate) fn stem_referenced_elsewhere(
    cas: &ArtifactStore,
    stem: &str,
    exclude_index: &str,
) -> Result<bool, CasError> {
    for index_stem in cas.dir().list_index_stems()? {
        if index_stem == exclude_index {
            continue;
        }
        let index = match cas.dir().read_json(&index_stem) {
            Ok(index) => index,
            Err(e) if e.is_not_found() => continue,
            Err(e) => return Err(e),
        };
        let referenced = index
            .get("artifacts")
            .and_then(Value::as_object)
            .is_some_and(|map| map.values().any(|v| v.as_str() == Some(stem)));
        if referenced {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Collect every `$ref` and `$schema` string value in a document, at any
/// depth. Used by the delete dependency scan.
pub(crate) fn schema_refs(value: &Value) -> Vec<&str> {
    let mut refs = Vec::new();
    collect_schema_refs(value, &mut refs);
    refs
}

fn collect_schema_refs<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                if (key == "$ref" || key == "$schema") && inner.is_string() {
                    if let Some(s) = inner.as_str() {
                        out.push(s);
                    }
                }
                collect_schema_refs(inner, out);
            }
        }
        Value::Array(items) => {
            for inner in items {
                collect_schema_refs(inner, out);
            }
        }
        _ => {}
    }
}

//! In-place component updates.
//!
//! An update validates every supplied artifact first, writes new content
//! files, then swaps the index atomically and re-verifies the component.
//! Any failure after the index swap restores the original index verbatim
//! and deletes this attempt's files, leaving a byte-identical pre-state.
//! Superseded files are removed only after a successful verify, and only
//! when no other index still references them.

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use holo_cas::ArtifactStore;

use crate::namespace::{ArtifactKind, Namespace};
use crate::report::{IssueCode, ValidationIssue, ValidationReport};
use crate::schema::{
    check_conformance_fields, check_spec_fields, note_schema_failure, validate_against,
    validate_base, validate_component, ConformanceRequirements, SchemaCache,
};

use super::{parse_artifacts, stem_referenced_elsewhere, CrudError};

/// Outcome of a successful update.
#[derive(Debug, Serialize)]
pub struct UpdateReceipt {
    pub namespace: String,
    /// Types whose artifact was replaced or added.
    pub updated: Vec<String>,
    /// New content stems written by this update.
    pub written: Vec<String>,
    /// Old stems removed after the update verified.
    pub superseded: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ValidationIssue>,
}

/// Replace or add artifacts of an existing component.
pub fn update(
    cache: &mut SchemaCache,
    cas: &ArtifactStore,
    ns: &Namespace,
    changes: &BTreeMap<ArtifactKind, Value>,
) -> Result<UpdateReceipt, CrudError> {
    if changes.is_empty() {
        return Err(CrudError::Rejected(vec![ValidationIssue::new(
            IssueCode::Precondition,
            "update supplies no artifacts",
        )]));
    }

    // Keep the original index bytes for verbatim restore.
    let original_raw = match cas.dir().read_raw(&ns.index_stem()) {
        Ok(raw) => raw,
        Err(e) if e.is_not_found() => return Err(CrudError::NotFound(ns.as_str().to_string())),
        Err(e) => return Err(e.into()),
    };
    let index: Value = serde_json::from_str(&original_raw).map_err(holo_cas::CasError::from)?;
    let mut refs = parse_artifacts(&index)?;
    let reqs = cache.requirements(cas)?;

    let validation = validate_changes(cache, cas, ns, &reqs, changes);
    cache.clear_overlay();
    let report = validation?;
    if !report.valid {
        return Err(CrudError::Rejected(report.errors));
    }

    // Write new content files and build the candidate artifacts map.
    let mut written: Vec<String> = Vec::new();
    let mut updated: Vec<String> = Vec::new();
    let mut candidates: Vec<String> = Vec::new();
    for (kind, content) in changes {
        let stored = match cas.store_named(content) {
            Ok(stored) => stored,
            Err(e) => {
                remove_files(cas, ns, &written);
                return Err(e.into());
            }
        };
        if !stored.existed {
            written.push(stored.stem.clone());
        }
        updated.push(kind.as_str().to_string());
        if let Some(old_stem) = refs.insert(kind.as_str().to_string(), stored.stem.clone()) {
            if old_stem != stored.stem {
                candidates.push(old_stem);
            }
        }
    }

    let candidate_index = json!({"namespace": ns.as_str(), "artifacts": refs});
    if let Err(e) = cas.dir().write_json_atomic(&ns.index_stem(), &candidate_index) {
        remove_files(cas, ns, &written);
        return Err(e.into());
    }

    // An updated spec may have superseded a schema other components resolve.
    cache.invalidate();

    let verify = match validate_component(cache, cas, ns) {
        Ok(report) => report,
        Err(e) => {
            restore(cas, ns, &original_raw, &written);
            cache.invalidate();
            return Err(e.into());
        }
    };
    if !verify.valid {
        let mut errors = verify.errors;
        errors.extend(restore(cas, ns, &original_raw, &written));
        cache.invalidate();
        return Err(CrudError::Rejected(errors));
    }

    // Remove superseded files, skipping any stem another index still
    // references.
    let mut superseded = Vec::new();
    let mut warnings = Vec::new();
    for old_stem in candidates {
        if refs.values().any(|s| s == &old_stem) {
            continue;
        }
        match stem_referenced_elsewhere(cas, &old_stem, &ns.index_stem()) {
            Ok(true) => continue,
            Ok(false) => match cas.dir().remove(&old_stem) {
                Ok(_) => superseded.push(old_stem),
                Err(e) => {
                    eprintln!("[update] could not remove superseded '{old_stem}': {e}");
                    warnings.push(ValidationIssue::new(
                        IssueCode::Rollback,
                        format!("superseded file '{old_stem}' was not removed: {e}"),
                    ));
                }
            },
            Err(e) => {
                eprintln!("[update] reference scan failed for '{old_stem}': {e}");
                warnings.push(ValidationIssue::new(
                    IssueCode::Rollback,
                    format!("superseded file '{old_stem}' was kept; reference scan failed: {e}"),
                ));
            }
        }
    }

    Ok(UpdateReceipt {
        namespace: ns.as_str().to_string(),
        updated,
        written,
        superseded,
        warnings,
    })
}

/// Validate every supplied artifact, collecting all issues. If the
/// component is a canonical type definition and its spec is among the
/// changes, the candidate spec is installed in the cache overlay so the
/// matching conformance artifact validates against the new schema. The
/// caller clears the overlay.
fn validate_changes(
    cache: &mut SchemaCache,
    cas: &ArtifactStore,
    ns: &Namespace,
    reqs: &ConformanceRequirements,
    changes: &BTreeMap<ArtifactKind, Value>,
) -> Result<ValidationReport, CrudError> {
    let mut report = ValidationReport::new(ns.as_str());
    let self_schema = format!("{ns}.spec");

    if let Some(spec) = changes.get(&ArtifactKind::Spec) {
        if !spec.is_object() {
            report.push(ValidationIssue::new(
                IssueCode::Structural,
                "spec artifact is not a JSON object",
            ));
        } else {
            match SchemaCache::compile(&self_schema, spec) {
                Ok(_) => {
                    if ns.type_definition().is_some() {
                        cache
                            .push_overlay(&self_schema, spec)
                            .map_err(CrudError::Schema)?;
                    }
                }
                Err(err) => note_schema_failure(&mut report, &self_schema, err)
                    .map_err(CrudError::Schema)?,
            }
            report.extend(check_spec_fields(spec, ns));
        }
    }

    for (kind, content) in changes {
        if kind.is_spec() {
            continue;
        }
        if !content.is_object() {
            report.push(ValidationIssue::new(
                IssueCode::Structural,
                format!("{kind} artifact is not a JSON object"),
            ));
            continue;
        }
        report.extend(validate_base(cache, cas, content).map_err(CrudError::Schema)?);
        report.extend(check_conformance_fields(content, ns, kind));

        let schema_name = format!("{}.spec", reqs.schema_component(kind.as_str()));
        match validate_against(cache, cas, content, &schema_name) {
            Ok(issues) => report.extend(issues),
            Err(err) => {
                note_schema_failure(&mut report, &schema_name, err).map_err(CrudError::Schema)?
            }
        }
    }

    Ok(report)
}

/// Restore the original index bytes and delete this attempt's files.
fn restore(
    cas: &ArtifactStore,
    ns: &Namespace,
    original_raw: &str,
    written: &[String],
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    if let Err(e) = cas.dir().write_raw_atomic(&ns.index_stem(), original_raw) {
        eprintln!("[update] could not restore index for '{ns}': {e}");
        issues.push(ValidationIssue::new(
            IssueCode::Rollback,
            format!("could not restore index for '{ns}': {e}"),
        ));
    }
    issues.extend(remove_files(cas, ns, written));
    issues
}

fn remove_files(cas: &ArtifactStore, ns: &Namespace, written: &[String]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for stem in written.iter().rev() {
        if let Err(e) = cas.dir().remove(stem) {
            eprintln!("[update] rollback could not remove '{stem}' for '{ns}': {e}");
            issues.push(ValidationIssue::new(
                IssueCode::Rollback,
                format!("rollback could not remove '{stem}': {e}"),
            ));
        }
    }
    issues
}

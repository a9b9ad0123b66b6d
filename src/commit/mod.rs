//! Two-phase manifest commit protocol.
//!
//! Phase 1 ([`submit_artifact`]) validates and stores artifacts individually
//! as staged blobs. Phase 2 ([`submit_manifest`]) turns a map of previously
//! stored CIDs into a durable component: preconditions, completeness, load,
//! validate, write, verify. Content files are written first and the index
//! last — the index's existence is the sole commit marker, so orphan content
//! files from a failed attempt are inert. Any failure from the write phase
//! onward rolls back every file written in the attempt, in reverse order.

mod phase;

pub use phase::CommitPhase;

use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;

use holo_cas::{ArtifactStore, CasError, Cid, StoreDir};

use crate::namespace::{ArtifactKind, Namespace, ROOT};
use crate::report::{IssueCode, ValidationIssue, ValidationReport};
use crate::schema::{
    check_conformance_fields, check_spec_fields, note_schema_failure, validate_against,
    validate_base, validate_component, ConformanceRequirements, SchemaCache, SchemaError,
};

/// Outcome of a phase-1 artifact submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitReceipt {
    pub cid: Cid,
    pub stem: String,
    /// True if identical content was already stored.
    pub deduplicated: bool,
}

/// Outcome of a committed manifest.
#[derive(Debug, Clone, Serialize)]
pub struct CommitReceipt {
    pub namespace: String,
    /// Every file written by this attempt, index last.
    pub written: Vec<String>,
}

/// Errors for the commit protocol.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("submission rejected with {} issue(s)", .0.len())]
    Rejected(Vec<ValidationIssue>),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Cas(#[from] CasError),
}

impl CommitError {
    pub fn rejected(code: IssueCode, message: impl Into<String>) -> Self {
        Self::Rejected(vec![ValidationIssue::new(code, message)])
    }

    pub fn issues(&self) -> Option<&[ValidationIssue]> {
        match self {
            Self::Rejected(issues) => Some(issues),
            _ => None,
        }
    }
}

/// Phase 1: validate one artifact and store it as a staged blob.
///
/// Spec artifacts must compile as schema documents; conformance artifacts
/// must satisfy the base schema. The write itself is idempotent.
pub fn submit_artifact(
    cache: &mut SchemaCache,
    cas: &ArtifactStore,
    content: &Value,
    kind: &ArtifactKind,
) -> Result<SubmitReceipt, CommitError> {
    if !content.is_object() {
        return Err(CommitError::rejected(
            IssueCode::Structural,
            "artifact content is not a JSON object",
        ));
    }

    let mut issues = Vec::new();
    if kind.is_spec() {
        if let Err(SchemaError::Compile { message, .. }) =
            SchemaCache::compile("submitted spec", content).map(|_| ())
        {
            issues.push(ValidationIssue::new(
                IssueCode::SchemaCompile,
                format!("spec artifact is not a valid schema document: {message}"),
            ));
        }
    } else {
        issues.extend(validate_base(cache, cas, content)?);
    }
    if !issues.is_empty() {
        return Err(CommitError::Rejected(issues));
    }

    let stored = cas.store(content)?;
    Ok(SubmitReceipt {
        cid: stored.cid,
        stem: stored.stem,
        deduplicated: stored.existed,
    })
}

/// Phase 2: commit a manifest of previously stored CIDs as a component.
pub fn submit_manifest(
    cache: &mut SchemaCache,
    cas: &ArtifactStore,
    ns: &Namespace,
    manifest: &BTreeMap<ArtifactKind, Cid>,
) -> Result<CommitReceipt, CommitError> {
    let mut phase = CommitPhase::CheckingPreconditions;
    let reqs = cache.requirements(cas)?;

    // Preconditions: creation is not upsert, and a component namespace may
    // not sit where a conformance artifact namespace belongs. The canonical
    // type-definition components (`hologram.{type}`) are exempt.
    let mut issues = Vec::new();
    if cas.dir().exists(&ns.index_stem()) {
        issues.push(ValidationIssue::new(
            IssueCode::Precondition,
            format!("component '{ns}' already exists; creation is not an upsert"),
        ));
    }
    if let Some((parent, last)) = ns.split_last() {
        if parent != ROOT && reqs.is_recognized(last) {
            issues.push(ValidationIssue::new(
                IssueCode::Precondition,
                format!(
                    "namespace '{ns}' collides with the '{last}' conformance artifact namespace of '{parent}'"
                ),
            ));
        }
    }
    if !issues.is_empty() {
        return Err(CommitError::Rejected(issues));
    }

    // Completeness: spec always, plus every required conformance type.
    if !manifest.contains_key(&ArtifactKind::Spec) {
        issues.push(ValidationIssue::new(
            IssueCode::Precondition,
            "manifest has no spec artifact; the spec type is always mandatory",
        ));
    }
    for required in reqs.required_types() {
        if !manifest.keys().any(|k| k.as_str() == required) {
            issues.push(ValidationIssue::new(
                IssueCode::Precondition,
                format!("required conformance type '{required}' has no submitted artifact"),
            ));
        }
    }

    // Load every supplied CID; unresolved ones are collected across all
    // types before aborting.
    phase.advance(CommitPhase::LoadingArtifacts);
    let mut loaded: BTreeMap<ArtifactKind, Value> = BTreeMap::new();
    for (kind, cid) in manifest {
        match cas.get(cid) {
            Ok(content) => {
                loaded.insert(kind.clone(), content);
            }
            Err(e) if e.is_not_found() => {
                issues.push(ValidationIssue::new(
                    IssueCode::ArtifactNotFound,
                    format!("no stored artifact for {cid} (type '{kind}')"),
                ));
            }
            Err(e) => return Err(e.into()),
        }
    }
    if !issues.is_empty() {
        return Err(CommitError::Rejected(issues));
    }

    phase.advance(CommitPhase::Validating);
    let validation = validate_manifest(cache, cas, ns, &reqs, &loaded);
    cache.clear_overlay();
    let report = validation?;
    if !report.valid {
        return Err(CommitError::Rejected(report.errors));
    }

    // Write: content files first, index last.
    phase.advance(CommitPhase::Writing);
    let mut written: Vec<String> = Vec::new();
    let mut artifact_refs: BTreeMap<String, String> = BTreeMap::new();
    for (kind, content) in &loaded {
        match cas.store_named(content) {
            Ok(stored) => {
                if !stored.existed {
                    written.push(stored.stem.clone());
                }
                artifact_refs.insert(kind.as_str().to_string(), stored.stem);
            }
            Err(e) => {
                rollback(cas.dir(), &written);
                return Err(e.into());
            }
        }
    }
    let index = json!({"namespace": ns.as_str(), "artifacts": artifact_refs});
    if let Err(e) = cas.dir().write_json_atomic(&ns.index_stem(), &index) {
        rollback(cas.dir(), &written);
        return Err(e.into());
    }
    written.push(ns.index_stem());

    // Verify the just-written component as a final consistency check.
    phase.advance(CommitPhase::Verifying);
    let verify = match validate_component(cache, cas, ns) {
        Ok(report) => report,
        Err(e) => {
            rollback(cas.dir(), &written);
            phase.advance(CommitPhase::RolledBack);
            return Err(e.into());
        }
    };
    if !verify.valid {
        let mut errors = verify.errors;
        errors.extend(rollback(cas.dir(), &written));
        phase.advance(CommitPhase::RolledBack);
        return Err(CommitError::Rejected(errors));
    }

    phase.advance(CommitPhase::Committed);
    Ok(CommitReceipt {
        namespace: ns.as_str().to_string(),
        written,
    })
}

/// Validation step of a commit attempt; collects every issue. Installs the
/// candidate spec in the cache overlay for self-referential validation when
/// the component is a canonical type definition (`hologram.T` carrying a
/// `T` artifact). The caller clears the overlay.
fn validate_manifest(
    cache: &mut SchemaCache,
    cas: &ArtifactStore,
    ns: &Namespace,
    reqs: &ConformanceRequirements,
    loaded: &BTreeMap<ArtifactKind, Value>,
) -> Result<ValidationReport, CommitError> {
    let mut report = ValidationReport::new(ns.as_str());
    let self_schema = format!("{ns}.spec");

    let mut spec_compiles = false;
    if let Some(spec) = loaded.get(&ArtifactKind::Spec) {
        match SchemaCache::compile(&self_schema, spec) {
            Ok(_) => spec_compiles = true,
            Err(err) => note_schema_failure(&mut report, &self_schema, err)?,
        }
        report.extend(check_spec_fields(spec, ns));

        if spec_compiles {
            if let Some(type_name) = ns.type_definition() {
                if loaded.keys().any(|k| k.as_str() == type_name) {
                    cache.push_overlay(&self_schema, spec)?;
                }
            }
        }
    }

    for (kind, content) in loaded {
        if kind.is_spec() {
            continue;
        }
        report.extend(validate_base(cache, cas, content)?);
        report.extend(check_conformance_fields(content, ns, kind));

        let schema_name = format!("{}.spec", reqs.schema_component(kind.as_str()));
        match validate_against(cache, cas, content, &schema_name) {
            Ok(issues) => report.extend(issues),
            Err(err) => note_schema_failure(&mut report, &schema_name, err)?,
        }
    }

    Ok(report)
}

/// Delete every file written by a failed attempt, in reverse order (the
/// index, written last, goes first). Cleanup failures are logged and
/// reported as rollback issues; the caller still surfaces the original
/// error.
pub(crate) fn rollback(dir: &StoreDir, written: &[String]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    for stem in written.iter().rev() {
        if let Err(e) = dir.remove(stem) {
            eprintln!("[commit] rollback could not remove '{stem}': {e}");
            issues.push(ValidationIssue::new(
                IssueCode::Rollback,
                format!("rollback could not remove '{stem}': {e}"),
            ));
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap;
    use holo_cas::StoreDir;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn seeded_store(temp: &TempDir) -> (SchemaCache, ArtifactStore) {
        let cas = ArtifactStore::new(StoreDir::open(temp.path().join("store")).unwrap());
        let mut cache = SchemaCache::new();
        bootstrap::init(&mut cache, &cas).unwrap();
        (cache, cas)
    }

    fn widget_spec() -> Value {
        json!({
            "namespace": "hologram.widget",
            "conformance": false,
            "description": "Widget component",
            "type": "object"
        })
    }

    fn conformance(ns: &str, ty: &str) -> Value {
        json!({
            "namespace": format!("{ns}.{ty}"),
            "parent": ns,
            "conformance": true
        })
    }

    fn files_with_prefix(cas: &ArtifactStore, prefix: &str) -> Vec<String> {
        fs::read_dir(cas.dir().root())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(prefix))
            .collect()
    }

    #[test]
    fn test_submit_artifact_deduplicates_reordered_content() {
        let temp = TempDir::new().unwrap();
        let (mut cache, cas) = seeded_store(&temp);
        let ns = "hologram.widget";

        let a = submit_artifact(
            &mut cache,
            &cas,
            &json!({"namespace": format!("{ns}.docs"), "parent": ns, "conformance": true, "a": 1, "b": 2}),
            &ArtifactKind::Docs,
        )
        .unwrap();
        let b = submit_artifact(
            &mut cache,
            &cas,
            &json!({"b": 2, "a": 1, "conformance": true, "parent": ns, "namespace": format!("{ns}.docs")}),
            &ArtifactKind::Docs,
        )
        .unwrap();

        assert_eq!(a.cid, b.cid);
        assert!(b.deduplicated);
    }

    #[test]
    fn test_submit_artifact_rejects_non_object() {
        let temp = TempDir::new().unwrap();
        let (mut cache, cas) = seeded_store(&temp);

        let err = submit_artifact(&mut cache, &cas, &json!(42), &ArtifactKind::Docs).unwrap_err();
        let issues = err.issues().unwrap();
        assert_eq!(issues[0].code, IssueCode::Structural);
    }

    #[test]
    fn test_submit_artifact_collects_base_schema_errors() {
        let temp = TempDir::new().unwrap();
        let (mut cache, cas) = seeded_store(&temp);

        // Missing conformance flag and bad namespace pattern: both reported.
        let err = submit_artifact(
            &mut cache,
            &cas,
            &json!({"namespace": "Bad.Namespace"}),
            &ArtifactKind::Docs,
        )
        .unwrap_err();
        let issues = err.issues().unwrap();
        assert!(issues.len() >= 2, "all issues collected: {issues:?}");
        assert!(issues.iter().all(|i| i.code == IssueCode::BaseSchema));
    }

    #[test]
    fn test_commit_rejects_duplicate_creation() {
        let temp = TempDir::new().unwrap();
        let (mut cache, cas) = seeded_store(&temp);
        let ns = Namespace::parse("hologram").unwrap();

        let err = submit_manifest(&mut cache, &cas, &ns, &BTreeMap::new()).unwrap_err();
        let issues = err.issues().unwrap();
        assert!(issues
            .iter()
            .any(|i| i.code == IssueCode::Precondition && i.message.contains("already exists")));
    }

    #[test]
    fn test_commit_rejects_conformance_suffix_namespace() {
        let temp = TempDir::new().unwrap();
        let (mut cache, cas) = seeded_store(&temp);
        let ns = Namespace::parse("hologram.widget.interface").unwrap();

        let err = submit_manifest(&mut cache, &cas, &ns, &BTreeMap::new()).unwrap_err();
        let issues = err.issues().unwrap();
        assert!(issues
            .iter()
            .any(|i| i.code == IssueCode::Precondition && i.message.contains("collides")));
    }

    #[test]
    fn test_commit_missing_required_type_leaves_no_trace() {
        let temp = TempDir::new().unwrap();
        let (mut cache, cas) = seeded_store(&temp);
        let ns = Namespace::parse("hologram.widget").unwrap();

        let spec = submit_artifact(&mut cache, &cas, &widget_spec(), &ArtifactKind::Spec).unwrap();
        let mut manifest = BTreeMap::new();
        manifest.insert(ArtifactKind::Spec, spec.cid);

        let err = submit_manifest(&mut cache, &cas, &ns, &manifest).unwrap_err();
        let issues = err.issues().unwrap();
        assert!(issues
            .iter()
            .any(|i| i.code == IssueCode::Precondition && i.message.contains("interface")));
        assert!(
            files_with_prefix(&cas, "hologram.widget").is_empty(),
            "failed commit must leave no namespace-prefixed files"
        );
    }

    #[test]
    fn test_commit_collects_all_unresolved_cids() {
        let temp = TempDir::new().unwrap();
        let (mut cache, cas) = seeded_store(&temp);
        let ns = Namespace::parse("hologram.widget").unwrap();

        let mut manifest = BTreeMap::new();
        manifest.insert(ArtifactKind::Spec, Cid::of(&json!({"ghost": 1})).unwrap());
        manifest.insert(ArtifactKind::Interface, Cid::of(&json!({"ghost": 2})).unwrap());

        let err = submit_manifest(&mut cache, &cas, &ns, &manifest).unwrap_err();
        let issues = err.issues().unwrap();
        let missing = issues
            .iter()
            .filter(|i| i.code == IssueCode::ArtifactNotFound)
            .count();
        assert_eq!(missing, 2, "both dangling CIDs reported: {issues:?}");
    }

    #[test]
    fn test_commit_happy_path_writes_index_last() {
        let temp = TempDir::new().unwrap();
        let (mut cache, cas) = seeded_store(&temp);
        let ns = Namespace::parse("hologram.widget").unwrap();

        let spec = submit_artifact(&mut cache, &cas, &widget_spec(), &ArtifactKind::Spec).unwrap();
        let iface = submit_artifact(
            &mut cache,
            &cas,
            &conformance("hologram.widget", "interface"),
            &ArtifactKind::Interface,
        )
        .unwrap();

        let mut manifest = BTreeMap::new();
        manifest.insert(ArtifactKind::Spec, spec.cid);
        manifest.insert(ArtifactKind::Interface, iface.cid);

        let receipt = submit_manifest(&mut cache, &cas, &ns, &manifest).unwrap();
        assert_eq!(receipt.written.last().unwrap(), "hologram.widget.index");
        assert!(cas.dir().exists("hologram.widget.index"));

        let report = validate_component(&mut cache, &cas, &ns).unwrap();
        assert!(report.valid, "{:?}", report.errors);
    }

    #[test]
    fn test_commit_rejects_mismatched_conformance_fields() {
        let temp = TempDir::new().unwrap();
        let (mut cache, cas) = seeded_store(&temp);
        let ns = Namespace::parse("hologram.widget").unwrap();

        let spec = submit_artifact(&mut cache, &cas, &widget_spec(), &ArtifactKind::Spec).unwrap();
        // Interface artifact claiming to belong to another component.
        let stray = conformance("hologram.other", "interface");
        let iface = cas.store(&stray).unwrap();

        let mut manifest = BTreeMap::new();
        manifest.insert(ArtifactKind::Spec, spec.cid);
        manifest.insert(ArtifactKind::Interface, iface.cid);

        let err = submit_manifest(&mut cache, &cas, &ns, &manifest).unwrap_err();
        let issues = err.issues().unwrap();
        assert!(issues.iter().any(|i| i.code == IssueCode::NamespaceMismatch));
        assert!(files_with_prefix(&cas, "hologram.widget").is_empty());
    }

    #[test]
    fn test_commit_rejects_uncompilable_spec() {
        let temp = TempDir::new().unwrap();
        let (mut cache, cas) = seeded_store(&temp);
        let ns = Namespace::parse("hologram.widget").unwrap();

        // "type": 12 is not a valid schema document.
        let bad_spec = json!({"namespace": "hologram.widget", "conformance": false, "type": 12});
        let spec = cas.store(&bad_spec).unwrap();
        let iface = cas.store(&conformance("hologram.widget", "interface")).unwrap();

        let mut manifest = BTreeMap::new();
        manifest.insert(ArtifactKind::Spec, spec.cid);
        manifest.insert(ArtifactKind::Interface, iface.cid);

        let err = submit_manifest(&mut cache, &cas, &ns, &manifest).unwrap_err();
        let issues = err.issues().unwrap();
        assert!(issues.iter().any(|i| i.code == IssueCode::SchemaCompile));
    }
}

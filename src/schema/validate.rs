//! Component validation over the persisted store.
//!
//! All checks collect every failure they can find before returning; nothing
//! short-circuits on the first bad field.

use serde_json::Value;
use std::collections::BTreeMap;

use holo_cas::{ArtifactStore, CasError};

use crate::namespace::{ArtifactKind, Namespace};
use crate::report::{IssueCode, ValidationIssue, ValidationReport};

use super::cache::SchemaCache;
use super::SchemaError;

/// Validate a value against the universal base schema. Applies to every
/// conformance artifact.
pub fn validate_base(
    cache: &mut SchemaCache,
    cas: &ArtifactStore,
    content: &Value,
) -> Result<Vec<ValidationIssue>, SchemaError> {
    if !content.is_object() {
        return Ok(vec![ValidationIssue::new(
            IssueCode::Structural,
            "artifact content is not a JSON object",
        )]);
    }
    let validator = cache.base(cas)?;
    Ok(validator
        .iter_errors(content)
        .map(|e| {
            ValidationIssue::new(IssueCode::BaseSchema, e.to_string())
                .with_path(e.instance_path.to_string())
        })
        .collect())
}

/// Validate a value against a named schema (`{component}.spec`), compiling
/// and caching the schema on demand.
pub fn validate_against(
    cache: &mut SchemaCache,
    cas: &ArtifactStore,
    content: &Value,
    schema_name: &str,
) -> Result<Vec<ValidationIssue>, SchemaError> {
    let validator = cache.validator(cas, schema_name)?;
    Ok(validator
        .iter_errors(content)
        .map(|e| {
            ValidationIssue::new(
                IssueCode::TypeSchema,
                format!("does not satisfy schema '{schema_name}': {e}"),
            )
            .with_path(e.instance_path.to_string())
        })
        .collect())
}

/// Field-consistency checks for a spec artifact: it constitutes the
/// component, so its own namespace must equal the component namespace and
/// its conformance flag must be false.
pub fn check_spec_fields(content: &Value, ns: &Namespace) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    match content.get("namespace").and_then(Value::as_str) {
        Some(actual) if actual == ns.as_str() => {}
        Some(actual) => issues.push(
            ValidationIssue::new(
                IssueCode::NamespaceMismatch,
                format!("spec artifact namespace is '{actual}', expected '{ns}'"),
            )
            .with_path("/namespace"),
        ),
        None => issues.push(
            ValidationIssue::new(
                IssueCode::NamespaceMismatch,
                format!("spec artifact has no namespace field, expected '{ns}'"),
            )
            .with_path("/namespace"),
        ),
    }
    if content.get("conformance") != Some(&Value::Bool(false)) {
        issues.push(
            ValidationIssue::new(
                IssueCode::ConformanceFlagMismatch,
                "spec artifact must carry conformance: false",
            )
            .with_path("/conformance"),
        );
    }
    issues
}

/// Field-consistency checks for a conformance artifact of the given kind:
/// namespace must be `{ns}.{type}`, parent must be `{ns}`, conformance true.
pub fn check_conformance_fields(
    content: &Value,
    ns: &Namespace,
    kind: &ArtifactKind,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let expected_ns = ns.conformance_namespace(kind);

    match content.get("namespace").and_then(Value::as_str) {
        Some(actual) if actual == expected_ns => {}
        actual => issues.push(
            ValidationIssue::new(
                IssueCode::NamespaceMismatch,
                format!(
                    "{kind} artifact namespace is {}, expected '{expected_ns}'",
                    actual.map_or("missing".to_string(), |a| format!("'{a}'"))
                ),
            )
            .with_path("/namespace"),
        ),
    }
    match content.get("parent").and_then(Value::as_str) {
        Some(actual) if actual == ns.as_str() => {}
        actual => issues.push(
            ValidationIssue::new(
                IssueCode::NamespaceMismatch,
                format!(
                    "{kind} artifact parent is {}, expected '{ns}'",
                    actual.map_or("missing".to_string(), |a| format!("'{a}'"))
                ),
            )
            .with_path("/parent"),
        ),
    }
    if content.get("conformance") != Some(&Value::Bool(true)) {
        issues.push(
            ValidationIssue::new(
                IssueCode::ConformanceFlagMismatch,
                format!("{kind} artifact must carry conformance: true"),
            )
            .with_path("/conformance"),
        );
    }
    issues
}

/// Downgrade a schema-resolution failure to a collected issue. Only real
/// infrastructure errors (IO) stay hard.
pub(crate) fn note_schema_failure(
    report: &mut ValidationReport,
    schema_name: &str,
    err: SchemaError,
) -> Result<(), SchemaError> {
    match err {
        SchemaError::MissingComponent(component) => report.push(ValidationIssue::new(
            IssueCode::Reference,
            format!("schema '{schema_name}': component '{component}' has no index"),
        )),
        SchemaError::MissingSpec(component) => report.push(ValidationIssue::new(
            IssueCode::Reference,
            format!("schema '{schema_name}': component '{component}' has no spec artifact"),
        )),
        SchemaError::Compile { name, message } => report.push(ValidationIssue::new(
            IssueCode::SchemaCompile,
            format!("schema '{name}' failed to compile: {message}"),
        )),
        SchemaError::Cas(e) if e.is_not_found() => report.push(ValidationIssue::new(
            IssueCode::Reference,
            format!("schema '{schema_name}': dangling artifact reference ({e})"),
        )),
        SchemaError::Cas(CasError::Json(e)) => report.push(ValidationIssue::new(
            IssueCode::Reference,
            format!("schema '{schema_name}' is not valid JSON: {e}"),
        )),
        SchemaError::Cas(e) => return Err(SchemaError::Cas(e)),
    }
    Ok(())
}

/// Validate one committed component: required types present, every
/// referenced artifact resolvable and consistent, spec compiles, every
/// conformance artifact passes base and type schemas.
pub fn validate_component(
    cache: &mut SchemaCache,
    cas: &ArtifactStore,
    ns: &Namespace,
) -> Result<ValidationReport, SchemaError> {
    let index = match cas.dir().read_json(&ns.index_stem()) {
        Ok(index) => index,
        Err(e) if e.is_not_found() => {
            return Err(SchemaError::MissingComponent(ns.as_str().to_string()))
        }
        Err(e) => return Err(e.into()),
    };

    let mut report = ValidationReport::new(ns.as_str());
    let artifacts: BTreeMap<String, String> = match index
        .get("artifacts")
        .cloned()
        .map(serde_json::from_value)
    {
        Some(Ok(map)) => map,
        _ => {
            report.push(ValidationIssue::new(
                IssueCode::Structural,
                "index has no usable artifacts map",
            ));
            return Ok(report);
        }
    };

    let reqs = cache.requirements(cas)?;
    for required in reqs.required_types() {
        if !artifacts.contains_key(required) {
            report.push(ValidationIssue::new(
                IssueCode::Precondition,
                format!("required conformance type '{required}' is missing"),
            ));
        }
    }
    if !artifacts.contains_key(ArtifactKind::SPEC_NAME) {
        report.push(ValidationIssue::new(
            IssueCode::Precondition,
            "spec artifact is missing from index",
        ));
    }

    for (type_name, stem) in &artifacts {
        let content = match cas.get_by_stem(stem) {
            Ok(content) => content,
            Err(e) if e.is_not_found() => {
                report.push(ValidationIssue::new(
                    IssueCode::ArtifactNotFound,
                    format!("artifact '{stem}' referenced by index is missing"),
                ));
                continue;
            }
            Err(CasError::Json(e)) => {
                report.push(ValidationIssue::new(
                    IssueCode::Structural,
                    format!("artifact '{stem}' is not valid JSON: {e}"),
                ));
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if type_name == ArtifactKind::SPEC_NAME {
            let schema_name = format!("{ns}.spec");
            if let Err(err) = SchemaCache::compile(&schema_name, &content) {
                note_schema_failure(&mut report, &schema_name, err)?;
            }
            report.extend(check_spec_fields(&content, ns));
            continue;
        }

        report.extend(validate_base(cache, cas, &content)?);
        let kind = match ArtifactKind::resolve(type_name, &reqs.declared()) {
            Ok(kind) => kind,
            Err(_) => {
                report.push(ValidationIssue::new(
                    IssueCode::Precondition,
                    format!("conformance type '{type_name}' is not recognized"),
                ));
                continue;
            }
        };
        report.extend(check_conformance_fields(&content, ns, &kind));

        let schema_name = format!("{}.spec", reqs.schema_component(type_name));
        match validate_against(cache, cas, &content, &schema_name) {
            Ok(issues) => report.extend(issues),
            Err(err) => note_schema_failure(&mut report, &schema_name, err)?,
        }
    }

    Ok(report)
}

/// Validate every component in the store. Audit path only; the write path
/// never calls this.
pub fn validate_all(
    cache: &mut SchemaCache,
    cas: &ArtifactStore,
) -> Result<BTreeMap<String, ValidationReport>, SchemaError> {
    let mut results = BTreeMap::new();
    for index_stem in cas.dir().list_index_stems()? {
        let Some(raw_ns) = index_stem.strip_suffix(".index") else {
            continue;
        };
        let report = match Namespace::parse(raw_ns) {
            Ok(ns) => validate_component(cache, cas, &ns)?,
            Err(e) => {
                let mut report = ValidationReport::new(raw_ns);
                report.push(ValidationIssue::new(IssueCode::Precondition, e.to_string()));
                report
            }
        };
        results.insert(raw_ns.to_string(), report);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap;
    use holo_cas::StoreDir;
    use serde_json::json;
    use tempfile::TempDir;

    fn seeded_store(temp: &TempDir) -> (SchemaCache, ArtifactStore) {
        let cas = ArtifactStore::new(StoreDir::open(temp.path().join("store")).unwrap());
        let mut cache = SchemaCache::new();
        bootstrap::init(&mut cache, &cas).unwrap();
        (cache, cas)
    }

    #[test]
    fn test_fresh_store_validates_clean() {
        let temp = TempDir::new().unwrap();
        let (mut cache, cas) = seeded_store(&temp);

        let results = validate_all(&mut cache, &cas).unwrap();
        assert!(!results.is_empty());
        for (ns, report) in &results {
            assert!(report.valid, "{ns} invalid: {:?}", report.errors);
        }
    }

    #[test]
    fn test_missing_artifact_is_flagged_not_fatal() {
        let temp = TempDir::new().unwrap();
        let (mut cache, cas) = seeded_store(&temp);

        // Drop the file behind hologram's interface artifact.
        let ns = Namespace::parse("hologram").unwrap();
        let index = cas.dir().read_json(&ns.index_stem()).unwrap();
        let stem = index.pointer("/artifacts/interface").unwrap().as_str().unwrap();
        cas.dir().remove(stem).unwrap();

        let report = validate_component(&mut cache, &cas, &ns).unwrap();
        assert!(!report.valid);
        assert!(report
            .errors
            .iter()
            .any(|i| i.code == IssueCode::ArtifactNotFound));
    }

    #[test]
    fn test_required_type_missing_is_flagged() {
        let temp = TempDir::new().unwrap();
        let (mut cache, cas) = seeded_store(&temp);

        // A component index with only a spec, while interface is required.
        let spec = json!({"namespace": "hologram.widget", "conformance": false, "type": "object"});
        let stored = cas.store_named(&spec).unwrap();
        cas.dir()
            .write_json_atomic(
                "hologram.widget.index",
                &json!({"namespace": "hologram.widget", "artifacts": {"spec": stored.stem}}),
            )
            .unwrap();

        let ns = Namespace::parse("hologram.widget").unwrap();
        let report = validate_component(&mut cache, &cas, &ns).unwrap();
        assert!(!report.valid);
        assert!(report
            .errors
            .iter()
            .any(|i| i.code == IssueCode::Precondition && i.message.contains("interface")));
    }

    #[test]
    fn test_conformance_field_mismatches_are_collected() {
        let ns = Namespace::parse("hologram.widget").unwrap();
        let bad = json!({
            "namespace": "hologram.other.docs",
            "parent": "hologram.other",
            "conformance": false
        });

        let issues = check_conformance_fields(&bad, &ns, &ArtifactKind::Docs);
        let codes: Vec<_> = issues.iter().map(|i| i.code).collect();
        assert!(codes.contains(&IssueCode::NamespaceMismatch));
        assert!(codes.contains(&IssueCode::ConformanceFlagMismatch));
        assert_eq!(issues.len(), 3, "namespace, parent and flag all flagged");
    }

    #[test]
    fn test_spec_field_checks() {
        let ns = Namespace::parse("hologram.widget").unwrap();
        let good = json!({"namespace": "hologram.widget", "conformance": false});
        assert!(check_spec_fields(&good, &ns).is_empty());

        let bad = json!({"namespace": "hologram.widget", "conformance": true});
        let issues = check_spec_fields(&bad, &ns);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::ConformanceFlagMismatch);
    }

    #[test]
    fn test_base_validation_rejects_bad_namespace_pattern() {
        let temp = TempDir::new().unwrap();
        let (mut cache, cas) = seeded_store(&temp);

        let issues = validate_base(
            &mut cache,
            &cas,
            &json!({"namespace": "Not.A.Namespace", "conformance": true}),
        )
        .unwrap();
        assert!(issues.iter().any(|i| i.code == IssueCode::BaseSchema));
    }

    #[test]
    fn test_non_object_is_structural() {
        let temp = TempDir::new().unwrap();
        let (mut cache, cas) = seeded_store(&temp);

        let issues = validate_base(&mut cache, &cas, &json!(["nope"])).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].code, IssueCode::Structural);
    }
}

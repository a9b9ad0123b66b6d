//! Compiled-schema cache.
//!
//! An explicit, constructible context object: compiled validators live here
//! and are passed through each operation instead of hiding in process-wide
//! state, so repeated runs (and tests) never leak compilations between
//! stores. The overlay slot lets the commit protocol expose a candidate spec
//! under its schema name without touching disk.

use jsonschema::Validator;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use holo_cas::ArtifactStore;

use super::requirements::ConformanceRequirements;
use super::SchemaError;

/// Schema name of the universal base schema (spec artifact of `hologram`).
pub const BASE_SCHEMA: &str = "hologram.spec";

/// Schema name of the conformance requirement model.
pub const REQUIREMENT_MODEL: &str = "hologram.component.spec";

/// Cache of compiled validators, keyed by schema name
/// (`{component namespace}.spec`).
#[derive(Default)]
pub struct SchemaCache {
    compiled: HashMap<String, Arc<Validator>>,
    overlay: HashMap<String, Arc<Validator>>,
    requirements: Option<ConformanceRequirements>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile a schema document. The error message carries the offending
    /// schema name for diagnostics.
    pub fn compile(name: &str, doc: &Value) -> Result<Validator, SchemaError> {
        jsonschema::validator_for(doc).map_err(|e| SchemaError::Compile {
            name: name.to_string(),
            message: e.to_string(),
        })
    }

    /// Resolve the schema document named `{ns}.spec` through the component
    /// index of `ns`: bootstrap discovery for the base schema and the
    /// requirement model happens through this same path.
    fn resolve_doc(cas: &ArtifactStore, name: &str) -> Result<Value, SchemaError> {
        let component = name
            .strip_suffix(".spec")
            .ok_or_else(|| SchemaError::MissingComponent(name.to_string()))?;
        let index = match cas.dir().read_json(&format!("{component}.index")) {
            Ok(index) => index,
            Err(e) if e.is_not_found() => {
                return Err(SchemaError::MissingComponent(component.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let stem = index
            .pointer("/artifacts/spec")
            .and_then(Value::as_str)
            .ok_or_else(|| SchemaError::MissingSpec(component.to_string()))?;
        Ok(cas.get_by_stem(stem)?)
    }

    /// Compiled validator for a named schema, reusing a cached compilation
    /// when available. Overlay entries shadow persisted schemas.
    pub fn validator(
        &mut self,
        cas: &ArtifactStore,
        name: &str,
    ) -> Result<Arc<Validator>, SchemaError> {
        if let Some(v) = self.overlay.get(name) {
            return Ok(v.clone());
        }
        if let Some(v) = self.compiled.get(name) {
            return Ok(v.clone());
        }
        let doc = Self::resolve_doc(cas, name)?;
        let validator = Arc::new(Self::compile(name, &doc)?);
        self.compiled.insert(name.to_string(), validator.clone());
        Ok(validator)
    }

    /// The universal base schema validator.
    pub fn base(&mut self, cas: &ArtifactStore) -> Result<Arc<Validator>, SchemaError> {
        self.validator(cas, BASE_SCHEMA)
    }

    /// The conformance requirement model, parsed from the store.
    pub fn requirements(
        &mut self,
        cas: &ArtifactStore,
    ) -> Result<ConformanceRequirements, SchemaError> {
        if let Some(reqs) = &self.requirements {
            return Ok(reqs.clone());
        }
        let doc = Self::resolve_doc(cas, REQUIREMENT_MODEL)?;
        let reqs = ConformanceRequirements::from_spec(&doc);
        self.requirements = Some(reqs.clone());
        Ok(reqs)
    }

    /// Expose a candidate spec under its schema name for the duration of a
    /// commit attempt, without persisting anything.
    pub fn push_overlay(&mut self, name: &str, doc: &Value) -> Result<(), SchemaError> {
        let validator = Arc::new(Self::compile(name, doc)?);
        self.overlay.insert(name.to_string(), validator);
        Ok(())
    }

    pub fn clear_overlay(&mut self) {
        self.overlay.clear();
    }

    /// Drop every cached compilation and the cached requirement model.
    /// Called after any write that may have superseded a schema component.
    pub fn invalidate(&mut self) {
        self.compiled.clear();
        self.overlay.clear();
        self.requirements = None;
    }
}

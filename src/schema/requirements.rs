//! Conformance requirement model.
//!
//! The spec artifact of `hologram.component` enumerates, per conformance
//! type, whether that type is required and which component's spec governs
//! it. The recognized type set is read from the store, never hard-coded;
//! the built-in types only guarantee a floor.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::namespace::{string_refers_to, ROOT};

/// Types recognized even before the requirement model declares anything.
pub const BUILTIN_TYPES: &[&str] = &["interface", "docs", "test", "manager"];

/// Field of the requirement model spec holding the type table.
pub const CONFORMANCE_TYPES_FIELD: &str = "conformanceTypes";

/// Requirement entry for one conformance type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeRequirement {
    #[serde(default)]
    pub required: bool,
    /// Namespace of the component whose spec governs this type.
    /// Defaults to `hologram.{type}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
}

/// Parsed requirement model.
#[derive(Debug, Clone, Default)]
pub struct ConformanceRequirements {
    pub types: BTreeMap<String, TypeRequirement>,
}

impl ConformanceRequirements {
    /// Parse the model out of a spec artifact. Lenient: a missing or
    /// malformed `conformanceTypes` field yields an empty table rather than
    /// an error, leaving only the built-in floor.
    pub fn from_spec(spec: &Value) -> Self {
        let types = spec
            .get(CONFORMANCE_TYPES_FIELD)
            .cloned()
            .and_then(|v| serde_json::from_value::<BTreeMap<String, TypeRequirement>>(v).ok())
            .unwrap_or_default();
        Self { types }
    }

    /// Types every component must carry, sorted.
    pub fn required_types(&self) -> Vec<&str> {
        self.types
            .iter()
            .filter(|(_, req)| req.required)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Built-in types plus everything the model declares.
    pub fn declared(&self) -> BTreeSet<String> {
        let mut set: BTreeSet<String> = BUILTIN_TYPES.iter().map(|s| s.to_string()).collect();
        set.extend(self.types.keys().cloned());
        set
    }

    pub fn is_recognized(&self, name: &str) -> bool {
        BUILTIN_TYPES.contains(&name) || self.types.contains_key(name)
    }

    /// Namespace of the component whose spec governs the given type.
    pub fn schema_component(&self, type_name: &str) -> String {
        self.types
            .get(type_name)
            .and_then(|req| req.schema.clone())
            .unwrap_or_else(|| format!("{ROOT}.{type_name}"))
    }

    /// True if any schema pointer in the model names the given namespace.
    pub fn mentions(&self, namespace: &str) -> bool {
        self.types
            .values()
            .filter_map(|req| req.schema.as_deref())
            .any(|schema| string_refers_to(schema, namespace))
    }
}

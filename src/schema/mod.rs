//! Schema loading and validation.
//!
//! The schema set governing every artifact is itself stored in the component
//! set: the base schema is the spec artifact of `hologram`, the conformance
//! requirement model is the spec artifact of `hologram.component`, and each
//! conformance type `T` is governed by the spec artifact of `hologram.T`.
//! Nothing here is hard-coded; schemas are resolved from the store at
//! validation time and cached per [`SchemaCache`].

mod cache;
mod requirements;
mod validate;

pub use cache::{SchemaCache, BASE_SCHEMA, REQUIREMENT_MODEL};
pub use requirements::{ConformanceRequirements, TypeRequirement, BUILTIN_TYPES};
pub use validate::{
    check_conformance_fields, check_spec_fields, validate_against, validate_all,
    validate_base, validate_component,
};
pub(crate) use validate::note_schema_failure;

use holo_cas::CasError;

/// Errors for schema resolution and compilation.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error(transparent)]
    Cas(#[from] CasError),

    #[error("schema '{name}' failed to compile: {message}")]
    Compile { name: String, message: String },

    #[error("component '{0}' has no index; schema cannot be resolved")]
    MissingComponent(String),

    #[error("component '{0}' index has no spec artifact")]
    MissingSpec(String),
}

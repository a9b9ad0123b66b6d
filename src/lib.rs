//! Hologram component store.
//!
//! A transactional, content-addressed store for JSON components over one
//! flat directory. Components are namespaced sets of immutable artifacts
//! committed through a two-phase manifest protocol and validated against
//! schemas that are themselves stored components.

pub mod bootstrap;
pub mod commit;
pub mod config;
pub mod crud;
pub mod lock;
pub mod namespace;
pub mod report;
pub mod schema;
pub mod store;

pub use commit::{CommitError, CommitPhase, CommitReceipt, SubmitReceipt};
pub use crud::{ComponentContents, CrudError, DeleteReceipt, UpdateReceipt};
pub use holo_cas::{ArtifactStore, CasError, Cid, StoreDir};
pub use namespace::{ArtifactKind, Namespace, NamespaceError};
pub use report::{IssueCode, ValidationIssue, ValidationReport};
pub use schema::{SchemaCache, SchemaError};
pub use store::{Store, StoreError};

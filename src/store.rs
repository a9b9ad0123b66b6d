//! The store facade.
//!
//! [`Store`] owns the artifact store, the schema cache and the namespace
//! lock table, and exposes the operation surface with plain-string inputs:
//! namespaces and artifact types arrive as text and are resolved into
//! [`Namespace`] and [`ArtifactKind`] exactly once, here.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use holo_cas::{ArtifactStore, CasError, Cid, StoreDir};

use crate::bootstrap;
use crate::commit::{self, CommitError, CommitReceipt, SubmitReceipt};
use crate::crud::{self, ComponentContents, CrudError, DeleteReceipt, UpdateReceipt};
use crate::lock::{lock_unpoisoned, NamespaceLocks};
use crate::namespace::{ArtifactKind, Namespace, NamespaceError};
use crate::report::{ValidationIssue, ValidationReport};
use crate::schema::{self, SchemaCache, SchemaError};

/// Any error the operation surface can produce.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Namespace(#[from] NamespaceError),

    #[error(transparent)]
    Cid(#[from] CasError),

    #[error(transparent)]
    Commit(#[from] CommitError),

    #[error(transparent)]
    Crud(#[from] CrudError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl StoreError {
    /// Collected validation issues, when the failure was a rejection rather
    /// than an infrastructure error.
    pub fn issues(&self) -> Option<&[ValidationIssue]> {
        match self {
            Self::Commit(e) => e.issues(),
            Self::Crud(e) => e.issues(),
            _ => None,
        }
    }
}

/// One component store over one flat directory.
pub struct Store {
    cas: ArtifactStore,
    cache: Mutex<SchemaCache>,
    locks: NamespaceLocks,
}

impl Store {
    /// Open (creating if needed) the store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = StoreDir::open(root.as_ref())?;
        Ok(Self {
            cas: ArtifactStore::new(dir),
            cache: Mutex::new(SchemaCache::new()),
            locks: NamespaceLocks::new(),
        })
    }

    pub fn cas(&self) -> &ArtifactStore {
        &self.cas
    }

    /// Seed an empty store with the canonical schema components.
    pub fn init(&self) -> Result<Vec<String>, StoreError> {
        let mut cache = lock_unpoisoned(&self.cache);
        Ok(bootstrap::init(&mut cache, &self.cas)?)
    }

    /// Phase 1: validate and store one artifact.
    pub fn submit_artifact(
        &self,
        type_name: &str,
        content: &Value,
    ) -> Result<SubmitReceipt, StoreError> {
        let mut cache = lock_unpoisoned(&self.cache);
        let kind = self.resolve_kind(&mut cache, type_name)?;
        Ok(commit::submit_artifact(&mut cache, &self.cas, content, &kind)?)
    }

    /// Phase 2: commit a manifest of `type -> CID` as a new component.
    pub fn submit_manifest(
        &self,
        namespace: &str,
        manifest: &BTreeMap<String, String>,
    ) -> Result<CommitReceipt, StoreError> {
        let ns = Namespace::parse(namespace)?;
        let gate = self.locks.gate(ns.as_str());
        let _guard = lock_unpoisoned(&gate);

        let mut cache = lock_unpoisoned(&self.cache);
        let mut resolved: BTreeMap<ArtifactKind, Cid> = BTreeMap::new();
        for (type_name, cid) in manifest {
            let kind = self.resolve_kind(&mut cache, type_name)?;
            resolved.insert(kind, Cid::parse(cid)?);
        }
        Ok(commit::submit_manifest(&mut cache, &self.cas, &ns, &resolved)?)
    }

    /// Read one artifact of a component.
    pub fn read_artifact(&self, namespace: &str, type_name: &str) -> Result<Value, StoreError> {
        let ns = Namespace::parse(namespace)?;
        let mut cache = lock_unpoisoned(&self.cache);
        let kind = self.resolve_kind(&mut cache, type_name)?;
        drop(cache);
        Ok(crud::read_artifact(&self.cas, &ns, &kind)?)
    }

    /// Read every artifact of a component.
    pub fn read_component(&self, namespace: &str) -> Result<ComponentContents, StoreError> {
        let ns = Namespace::parse(namespace)?;
        Ok(crud::read_component(&self.cas, &ns)?)
    }

    /// Replace or add artifacts of an existing component.
    pub fn update(
        &self,
        namespace: &str,
        changes: &BTreeMap<String, Value>,
    ) -> Result<UpdateReceipt, StoreError> {
        let ns = Namespace::parse(namespace)?;
        let gate = self.locks.gate(ns.as_str());
        let _guard = lock_unpoisoned(&gate);

        let mut cache = lock_unpoisoned(&self.cache);
        let mut resolved: BTreeMap<ArtifactKind, Value> = BTreeMap::new();
        for (type_name, content) in changes {
            let kind = self.resolve_kind(&mut cache, type_name)?;
            resolved.insert(kind, content.clone());
        }
        Ok(crud::update(&mut cache, &self.cas, &ns, &resolved)?)
    }

    /// Delete a component, refusing while dependents exist.
    pub fn delete(&self, namespace: &str) -> Result<DeleteReceipt, StoreError> {
        let ns = Namespace::parse(namespace)?;
        let gate = self.locks.gate(ns.as_str());
        let _guard = lock_unpoisoned(&gate);

        let mut cache = lock_unpoisoned(&self.cache);
        Ok(crud::delete(&mut cache, &self.cas, &ns)?)
    }

    /// Validate one component.
    pub fn validate(&self, namespace: &str) -> Result<ValidationReport, StoreError> {
        let ns = Namespace::parse(namespace)?;
        let mut cache = lock_unpoisoned(&self.cache);
        Ok(schema::validate_component(&mut cache, &self.cas, &ns)?)
    }

    /// Validate every component in the store.
    pub fn validate_all(&self) -> Result<BTreeMap<String, ValidationReport>, StoreError> {
        let mut cache = lock_unpoisoned(&self.cache);
        Ok(schema::validate_all(&mut cache, &self.cas)?)
    }

    /// Resolve a type name against the recognized set. `spec` and the
    /// built-in types resolve even before the requirement model exists,
    /// which keeps phase-1 submissions usable during store assembly.
    fn resolve_kind(
        &self,
        cache: &mut SchemaCache,
        type_name: &str,
    ) -> Result<ArtifactKind, StoreError> {
        let declared = match cache.requirements(&self.cas) {
            Ok(reqs) => reqs.declared(),
            Err(SchemaError::MissingComponent(_)) | Err(SchemaError::MissingSpec(_)) => {
                Default::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(ArtifactKind::resolve(type_name, &declared)?)
    }
}

//! Content-addressed artifact storage.
//!
//! Artifacts are immutable: a value is stored once under its content hash and
//! never rewritten. Submitting the same canonical content twice deduplicates
//! to the same file; different content can never collide (different CID,
//! different file).
//!
//! Two naming schemes share the directory:
//! - staged blobs, written on individual submission: `{hex}.json`
//! - committed artifact files, written by the commit protocol:
//!   `{namespace}.{hex}.json` (the stem without extension is the
//!   `artifactRef` recorded in index files)

use serde_json::Value;

use crate::cid::Cid;
use crate::dir::StoreDir;
use crate::error::CasError;

/// Outcome of a store call.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    /// Content identifier of the stored value.
    pub cid: Cid,
    /// Filename stem the value lives under.
    pub stem: String,
    /// True if identical content was already present (deduplicated write).
    pub existed: bool,
}

/// Deduplicated, immutable storage keyed by content hash.
#[derive(Debug)]
pub struct ArtifactStore {
    dir: StoreDir,
}

impl ArtifactStore {
    pub fn new(dir: StoreDir) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &StoreDir {
        &self.dir
    }

    /// Store an arbitrary JSON value as a staged blob (`{hex}.json`).
    /// Idempotent: re-storing identical content is a no-op.
    pub fn store(&self, value: &Value) -> Result<StoredArtifact, CasError> {
        let cid = Cid::of(value)?;
        let stem = cid.hex().to_string();
        let existed = self.dir.exists(&stem);
        if !existed {
            self.dir.write_json(&stem, value)?;
        }
        Ok(StoredArtifact { cid, stem, existed })
    }

    /// Store a value under its committed name, `{namespace}.{hex}`, taking
    /// the namespace from the content's own `namespace` field.
    pub fn store_named(&self, value: &Value) -> Result<StoredArtifact, CasError> {
        let obj = value.as_object().ok_or(CasError::NotAnObject)?;
        let namespace = obj
            .get("namespace")
            .and_then(Value::as_str)
            .ok_or(CasError::MissingNamespace)?;
        let cid = Cid::of(value)?;
        let stem = format!("{namespace}.{}", cid.hex());
        let existed = self.dir.exists(&stem);
        if !existed {
            self.dir.write_json(&stem, value)?;
        }
        Ok(StoredArtifact { cid, stem, existed })
    }

    /// Resolve a CID to its content, checking staged blobs first and falling
    /// back to committed artifact files.
    pub fn get(&self, cid: &Cid) -> Result<Value, CasError> {
        match self.dir.find_stem_by_cid(cid.hex())? {
            Some(stem) => self.dir.read_json(&stem),
            None => Err(CasError::NotFound {
                key: cid.to_string(),
            }),
        }
    }

    /// Read the content stored under an exact stem (an `artifactRef`).
    pub fn get_by_stem(&self, stem: &str) -> Result<Value, CasError> {
        self.dir.read_json(stem)
    }
}

//! holo-cas: canonical JSON identity and flat-file content-addressed storage.
//!
//! This crate is the leaf layer of the component store: it knows how to turn
//! a JSON value into a CID, how to read and write JSON documents in one flat
//! store directory, and how to persist immutable, deduplicated artifacts.
//! Everything above it (schema validation, the commit protocol, CRUD) is
//! built in the `holo-store` crate.

mod cid;
mod dir;
mod error;
mod store;

pub use cid::{canonical_bytes, Cid, CID_PREFIX};
pub use dir::StoreDir;
pub use error::CasError;
pub use store::{ArtifactStore, StoredArtifact};

//! Error types for the CAS layer.

use std::io;

/// Errors for canonical-identity and flat-file storage operations.
#[derive(Debug, thiserror::Error)]
pub enum CasError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("canonicalization error: {0}")]
    Canonicalize(String),

    #[error("not found: {key}")]
    NotFound { key: String },

    #[error("artifact content must be a JSON object")]
    NotAnObject,

    #[error("artifact content is missing a string 'namespace' field")]
    MissingNamespace,

    #[error("invalid CID '{0}', expected 'cid:' followed by 64 lowercase hex chars")]
    InvalidCid(String),
}

impl CasError {
    /// True for the "document is simply absent" case, which callers often
    /// handle differently from real failures.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CasError::NotFound { .. })
    }
}

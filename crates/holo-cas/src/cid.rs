//! Content identity for artifacts.
//!
//! A CID is `"cid:" + hex(sha256(jcs(content)))` where `jcs` is the JSON
//! Canonicalization Scheme (RFC 8785). Two values with equal canonical
//! content share a CID no matter how their keys are ordered.

use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::CasError;

/// Prefix carried by every rendered CID.
pub const CID_PREFIX: &str = "cid:";

/// Canonical (RFC 8785) byte serialization of a JSON value.
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>, CasError> {
    serde_json_canonicalizer::to_vec(value).map_err(|e| CasError::Canonicalize(e.to_string()))
}

/// Content identifier: SHA-256 over the canonical bytes of a JSON value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid {
    hex: String,
}

impl Cid {
    /// Compute the CID of a JSON value.
    pub fn of(value: &Value) -> Result<Self, CasError> {
        let bytes = canonical_bytes(value)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(Self {
            hex: hex::encode(hasher.finalize()),
        })
    }

    /// The 64-char lowercase hex digest, without the `cid:` prefix.
    pub fn hex(&self) -> &str {
        &self.hex
    }

    /// Parse a rendered CID (`cid:` + 64 lowercase hex chars).
    pub fn parse(s: &str) -> Result<Self, CasError> {
        let digest = s
            .strip_prefix(CID_PREFIX)
            .ok_or_else(|| CasError::InvalidCid(s.to_string()))?;
        let well_formed = digest.len() == 64
            && digest
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        if !well_formed {
            return Err(CasError::InvalidCid(s.to_string()));
        }
        Ok(Self {
            hex: digest.to_string(),
        })
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CID_PREFIX, self.hex)
    }
}

impl serde::Serialize for Cid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for Cid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Cid::parse(&s).map_err(serde::de::Error::custom)
    }
}

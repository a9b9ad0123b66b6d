//! Store configuration.
//!
//! Three-layer merge in precedence order: built-in defaults, an optional
//! `holo-store.toml`, CLI flags. Each contributing source is recorded with
//! its provenance, including a sha256 digest of the raw file bytes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Store directory used when nothing overrides it.
pub const DEFAULT_ROOT: &str = ".holo/store";

/// Config file looked up in the working directory.
pub const CONFIG_FILE: &str = "holo-store.toml";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Origin of a configuration source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigOrigin {
    Builtin,
    File,
    Cli,
}

/// A contributing config source with provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSource {
    pub origin: ConfigOrigin,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 of raw file bytes; only present for file sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Shape of `holo-store.toml`.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    root: Option<PathBuf>,
}

/// Effective store configuration.
#[derive(Debug, Clone, Serialize)]
pub struct StoreConfig {
    /// Directory holding the flat component store.
    pub root: PathBuf,

    /// Contributing sources in precedence order.
    pub sources: Vec<ConfigSource>,
}

impl StoreConfig {
    /// Merge defaults, an optional config file and CLI overrides.
    pub fn resolve(
        file_path: Option<&Path>,
        cli_root: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        let mut root = PathBuf::from(DEFAULT_ROOT);
        let mut sources = vec![ConfigSource {
            origin: ConfigOrigin::Builtin,
            path: None,
            digest: None,
        }];

        if let Some(path) = file_path {
            if path.exists() {
                let bytes = fs::read(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
                let mut hasher = Sha256::new();
                hasher.update(&bytes);
                let digest = hex::encode(hasher.finalize());

                let contents = String::from_utf8(bytes)
                    .map_err(|e| ConfigError::ParseError(format!("invalid UTF-8: {e}")))?;
                let file: FileConfig = toml::from_str(&contents)
                    .map_err(|e| ConfigError::ParseError(e.to_string()))?;
                if let Some(file_root) = file.root {
                    root = file_root;
                }
                sources.push(ConfigSource {
                    origin: ConfigOrigin::File,
                    path: Some(path.to_string_lossy().to_string()),
                    digest: Some(digest),
                });
            }
        }

        if let Some(cli) = cli_root {
            root = cli;
            sources.push(ConfigSource {
                origin: ConfigOrigin::Cli,
                path: None,
                digest: None,
            });
        }

        Ok(Self { root, sources })
    }
}

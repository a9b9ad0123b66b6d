//! Flat-directory key-value layer.
//!
//! The store directory is modelled as a minimal KV store: keys are filename
//! stems, values are JSON documents persisted as `{stem}.json`. Index files
//! (`{namespace}.index.json`) are the only commit records and must be written
//! via temp-file + rename, so observers see either the prior index or the
//! fully new index, never a partial write.

use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::CasError;

/// Suffix that marks a stem as a component index record.
pub const INDEX_SUFFIX: &str = ".index";

/// One flat directory of JSON documents, addressed by filename stem.
#[derive(Debug)]
pub struct StoreDir {
    root: PathBuf,
}

impl StoreDir {
    /// Open (creating if needed) a store directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CasError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of the document stored under `stem`.
    pub fn path_for(&self, stem: &str) -> PathBuf {
        self.root.join(format!("{stem}.json"))
    }

    pub fn exists(&self, stem: &str) -> bool {
        self.path_for(stem).is_file()
    }

    /// Read and parse the document stored under `stem`.
    pub fn read_json(&self, stem: &str) -> Result<Value, CasError> {
        Ok(serde_json::from_str(&self.read_raw(stem)?)?)
    }

    /// Read the raw bytes of the document stored under `stem`.
    pub fn read_raw(&self, stem: &str) -> Result<String, CasError> {
        match fs::read_to_string(self.path_for(stem)) {
            Ok(s) => Ok(s),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(CasError::NotFound {
                key: stem.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Write a document under `stem` (plain write; used for content-addressed
    /// files, where concurrent writers can only race on identical bytes).
    pub fn write_json(&self, stem: &str, value: &Value) -> Result<(), CasError> {
        let json = serde_json::to_string_pretty(value)?;
        fs::write(self.path_for(stem), json)?;
        Ok(())
    }

    /// Write a document under `stem` atomically (write-then-rename).
    pub fn write_json_atomic(&self, stem: &str, value: &Value) -> Result<(), CasError> {
        let json = serde_json::to_string_pretty(value)?;
        self.write_raw_atomic(stem, &json)
    }

    /// Atomically replace the document under `stem` with exact raw bytes.
    /// Used to restore an index verbatim on rollback.
    pub fn write_raw_atomic(&self, stem: &str, contents: &str) -> Result<(), CasError> {
        let path = self.path_for(stem);
        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, contents)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    /// Remove the document under `stem`. Returns false if it was absent.
    pub fn remove(&self, stem: &str) -> Result<bool, CasError> {
        match fs::remove_file(self.path_for(stem)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// All index stems in the directory (`{namespace}.index`), sorted.
    pub fn list_index_stems(&self) -> Result<Vec<String>, CasError> {
        let mut stems = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stem) = name.strip_suffix(".json") {
                if stem.ends_with(INDEX_SUFFIX) {
                    stems.push(stem.to_string());
                }
            }
        }
        stems.sort();
        Ok(stems)
    }

    /// Find a stored document whose stem ends in the given CID hex digest.
    /// Matches both staged blobs (`{hex}`) and committed artifact files
    /// (`{namespace}.{hex}`).
    pub fn find_stem_by_cid(&self, cid_hex: &str) -> Result<Option<String>, CasError> {
        if self.exists(cid_hex) {
            return Ok(Some(cid_hex.to_string()));
        }
        let dotted = format!(".{cid_hex}");
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stem) = name.strip_suffix(".json") {
                if stem.ends_with(&dotted) {
                    return Ok(Some(stem.to_string()));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_dir(temp: &TempDir) -> StoreDir {
        StoreDir::open(temp.path().join("store")).unwrap()
    }

    #[test]
    fn test_open_creates_directory() {
        let temp = TempDir::new().unwrap();
        let dir = open_dir(&temp);
        assert!(dir.root().is_dir());
    }

    #[test]
    fn test_write_and_read_round_trip() {
        let temp = TempDir::new().unwrap();
        let dir = open_dir(&temp);
        let doc = json!({"namespace": "hologram", "conformance": false});

        dir.write_json("hologram.abc", &doc).unwrap();
        assert!(dir.exists("hologram.abc"));
        assert_eq!(dir.read_json("hologram.abc").unwrap(), doc);
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let dir = open_dir(&temp);
        let err = dir.read_json("nope").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let dir = open_dir(&temp);
        dir.write_json_atomic("hologram.index", &json!({"namespace": "hologram"}))
            .unwrap();

        assert!(dir.exists("hologram.index"));
        assert!(!dir.path_for("hologram.index").with_extension("tmp").exists());
    }

    #[test]
    fn test_write_raw_atomic_restores_exact_bytes() {
        let temp = TempDir::new().unwrap();
        let dir = open_dir(&temp);
        let original = "{\"namespace\": \"hologram\",\n  \"artifacts\": {}}";

        dir.write_raw_atomic("hologram.index", original).unwrap();
        assert_eq!(dir.read_raw("hologram.index").unwrap(), original);
    }

    #[test]
    fn test_remove_reports_absence() {
        let temp = TempDir::new().unwrap();
        let dir = open_dir(&temp);
        dir.write_json("x", &json!(1)).unwrap();

        assert!(dir.remove("x").unwrap());
        assert!(!dir.remove("x").unwrap());
    }

    #[test]
    fn test_list_index_stems_filters_and_sorts() {
        let temp = TempDir::new().unwrap();
        let dir = open_dir(&temp);
        dir.write_json("hologram.widget.index", &json!({})).unwrap();
        dir.write_json("hologram.index", &json!({})).unwrap();
        dir.write_json("hologram.aaaa1111", &json!({})).unwrap();

        let stems = dir.list_index_stems().unwrap();
        assert_eq!(stems, vec!["hologram.index", "hologram.widget.index"]);
    }

    #[test]
    fn test_find_stem_by_cid_prefers_staged_blob() {
        let temp = TempDir::new().unwrap();
        let dir = open_dir(&temp);
        let hex = "ab".repeat(32);
        dir.write_json(&hex, &json!(1)).unwrap();
        dir.write_json(&format!("hologram.widget.{hex}"), &json!(1))
            .unwrap();

        assert_eq!(dir.find_stem_by_cid(&hex).unwrap(), Some(hex.clone()));
    }

    #[test]
    fn test_find_stem_by_cid_falls_back_to_named_file() {
        let temp = TempDir::new().unwrap();
        let dir = open_dir(&temp);
        let hex = "cd".repeat(32);
        let named = format!("hologram.widget.{hex}");
        dir.write_json(&named, &json!(1)).unwrap();

        assert_eq!(dir.find_stem_by_cid(&hex).unwrap(), Some(named));
        assert_eq!(dir.find_stem_by_cid(&"ef".repeat(32)).unwrap(), None);
    }
}

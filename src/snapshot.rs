//! Engine snapshots: a JSON document carrying items, their encoded
//! vectors, and enough metadata to restore an engine without calling
//! the embedder.
//!
//! File persistence writes to a temp file and renames into place so a
//! crash mid-save never corrupts an existing snapshot.

use crate::config;
use crate::error::{Result, SearchError};
use crate::item::Item;
use crate::quantization::Quantization;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Serialized engine state.
///
/// `vectors` holds one base64 payload per item, in item order. The
/// `quantization` tag is absent for plain float32 payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    pub model: String,
    pub items: Vec<Item>,
    pub vectors: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    #[serde(
        rename = "textPaths",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub text_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization: Option<Quantization>,
}

impl Snapshot {
    /// Structural checks shared by every load path.
    pub fn validate(&self) -> Result<()> {
        if self.version != config::SNAPSHOT_VERSION {
            return Err(SearchError::Snapshot(format!(
                "unknown snapshot version '{}'",
                self.version
            )));
        }
        if self.items.len() != self.vectors.len() {
            return Err(SearchError::Snapshot(format!(
                "{} items but {} vectors",
                self.items.len(),
                self.vectors.len()
            )));
        }
        Ok(())
    }

    /// Effective vector encoding; absent means float32.
    pub fn quantization(&self) -> Quantization {
        self.quantization.unwrap_or(Quantization::Float32)
    }

    /// Serializes to a JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses and validates a JSON snapshot.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Writes the snapshot atomically (temp file + rename).
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = self.to_json()?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &json)?;
        fs::rename(&tmp, path)?;
        tracing::info!(
            path = %path.display(),
            items = self.items.len(),
            "saved snapshot"
        );
        Ok(())
    }

    /// Reads and validates a snapshot file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)?;
        let snapshot = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            items = snapshot.items.len(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantization::StoredVector;

    fn sample() -> Snapshot {
        let vector = StoredVector::encode(&[0.6, 0.8], Quantization::Float32);
        Snapshot {
            version: config::SNAPSHOT_VERSION.to_string(),
            model: "hash-bow-2".to_string(),
            items: vec![Item::new("1", "desk lamp")],
            vectors: vec![vector.to_base64()],
            created_at: "2024-05-01T12:00:00Z".to_string(),
            text_paths: None,
            quantization: None,
        }
    }

    #[test]
    fn test_json_roundtrip() {
        let snapshot = sample();
        let json = snapshot.to_json().unwrap();
        let back = Snapshot::from_json(&json).unwrap();
        assert_eq!(back.items.len(), 1);
        assert_eq!(back.model, "hash-bow-2");
        assert_eq!(back.quantization(), Quantization::Float32);
    }

    #[test]
    fn test_camel_case_field_names() {
        let json = sample().to_json().unwrap();
        assert!(json.contains("\"createdAt\""));
        assert!(!json.contains("\"textPaths\""), "absent field serialized");
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut snapshot = sample();
        snapshot.version = "99".to_string();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(matches!(
            Snapshot::from_json(&json),
            Err(SearchError::Snapshot(_))
        ));
    }

    #[test]
    fn test_count_mismatch_rejected() {
        let mut snapshot = sample();
        snapshot.vectors.clear();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(matches!(
            Snapshot::from_json(&json),
            Err(SearchError::Snapshot(_))
        ));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            Snapshot::from_json("{not json"),
            Err(SearchError::SnapshotJson(_))
        ));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let snapshot = sample();
        snapshot.save_to_file(&path).unwrap();
        let back = Snapshot::load_from_file(&path).unwrap();
        assert_eq!(back.items[0].id, "1");
        assert!(!path.with_extension("tmp").exists());
    }
}

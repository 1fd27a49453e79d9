//! Versioned envelope for persisted encoder and projector models
//!
//! Each fitted model is written as one JSON document:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "kind": "feature_encoder",
//!   "created_at": "2026-01-01T00:00:00+00:00",
//!   "producer_version": "0.1.0",
//!   "feature_names": ["sex_female", "..."],
//!   "payload": { ... }
//! }
//! ```
//!
//! `feature_names` is the encoded column layout the model was fitted with.
//! The mapping path compares it between the encoder and the projector to catch
//! a pair that was not fitted together.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use super::loader::save_json;

/// Bumped whenever the payload layout of any artifact changes
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// What an artifact contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    FeatureEncoder,
    Projector,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::FeatureEncoder => write!(f, "feature encoder"),
            ArtifactKind::Projector => write!(f, "projector"),
        }
    }
}

/// A persisted model with its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact<T> {
    pub format_version: u32,
    pub kind: ArtifactKind,
    /// RFC 3339 timestamp of the fit
    pub created_at: String,
    /// Version of the crate that wrote the artifact
    pub producer_version: String,
    /// Encoded column layout the model was fitted with
    pub feature_names: Vec<String>,
    pub payload: T,
}

/// Fields checked before the payload is decoded
#[derive(Deserialize)]
struct ArtifactHeader {
    format_version: u32,
    kind: ArtifactKind,
}

/// Write `payload` wrapped in a [`ModelArtifact`] envelope
pub fn save_artifact<T: Serialize>(
    path: &Path,
    kind: ArtifactKind,
    feature_names: Vec<String>,
    payload: &T,
) -> Result<()> {
    let artifact = ModelArtifact {
        format_version: ARTIFACT_FORMAT_VERSION,
        kind,
        created_at: Utc::now().to_rfc3339(),
        producer_version: env!("CARGO_PKG_VERSION").to_string(),
        feature_names,
        payload,
    };
    save_json(&artifact, path).with_context(|| format!("Failed to save {} model", kind))
}

/// Read an artifact, checking it exists and has the expected kind and version
pub fn load_artifact<T: DeserializeOwned>(path: &Path, kind: ArtifactKind) -> Result<ModelArtifact<T>> {
    if !path.exists() {
        return Err(PipelineError::ModelNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read model artifact: {}", path.display()))?;

    let header: ArtifactHeader = serde_json::from_str(&text).map_err(|e| PipelineError::ArtifactMismatch {
        path: path.to_path_buf(),
        reason: format!("not a model artifact ({})", e),
    })?;
    if header.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(PipelineError::ArtifactMismatch {
            path: path.to_path_buf(),
            reason: format!(
                "format version {} is not supported (expected {}); refit the models",
                header.format_version, ARTIFACT_FORMAT_VERSION
            ),
        }
        .into());
    }
    if header.kind != kind {
        return Err(PipelineError::ArtifactMismatch {
            path: path.to_path_buf(),
            reason: format!("contains a {} model, expected a {} model", header.kind, kind),
        }
        .into());
    }

    let artifact = serde_json::from_str(&text)
        .with_context(|| format!("Failed to decode {} model: {}", kind, path.display()))?;
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Dummy {
        value: f64,
    }

    #[test]
    fn test_artifact_round_trip_preserves_payload_exactly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        let payload = Dummy { value: 0.1 + 0.2 };

        save_artifact(&path, ArtifactKind::Projector, vec!["a".into()], &payload).unwrap();
        let loaded = load_artifact::<Dummy>(&path, ArtifactKind::Projector).unwrap();

        assert_eq!(loaded.payload, payload);
        assert_eq!(loaded.feature_names, vec!["a".to_string()]);
        assert_eq!(loaded.format_version, ARTIFACT_FORMAT_VERSION);
    }

    #[test]
    fn test_missing_artifact_is_model_not_found() {
        let dir = TempDir::new().unwrap();
        let err = load_artifact::<Dummy>(&dir.path().join("nope.json"), ArtifactKind::Projector)
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::ModelNotFound { .. })
        ));
    }

    #[test]
    fn test_wrong_kind_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        save_artifact(&path, ArtifactKind::Projector, vec![], &Dummy { value: 1.0 }).unwrap();

        let err = load_artifact::<Dummy>(&path, ArtifactKind::FeatureEncoder).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::ArtifactMismatch { .. })
        ));
    }

    #[test]
    fn test_future_version_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(
            &path,
            r#"{"format_version": 99, "kind": "projector", "created_at": "", "producer_version": "", "feature_names": [], "payload": {"value": 1.0}}"#,
        )
        .unwrap();

        let err = load_artifact::<Dummy>(&path, ArtifactKind::Projector).unwrap_err();
        assert!(err.to_string().contains("format version 99"));
    }
}

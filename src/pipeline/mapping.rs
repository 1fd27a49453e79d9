//! Out-of-sample mapping: place new records with a persisted encoder/projector pair
//!
//! Incomplete rows are filtered first and every later step works on the
//! filtered table, so row `i` of the matrix, the layout and the export all
//! describe the same surviving record.

use anyhow::{Context, Result};
use polars::prelude::*;

use super::artifact::{load_artifact, ArtifactKind};
use super::config::{MapConfig, ModelPaths};
use super::encoder::FeatureEncoder;
use super::error::{PipelineError, SchemaAlignmentWarning};
use super::loader::load_dataset;
use super::projector::FittedProjector;
use super::reconcile::{drop_incomplete_rows, normalize_columns};
use super::schema::{Provenance, FEATURE_COLUMNS};
use crate::report::embedding_export::{build_embedding_points, export_embedding, EmbeddingPoint};

/// Load the encoder and projector, checking they were fitted together.
///
/// Fails with [`PipelineError::ModelNotFound`] if either artifact is absent and
/// with [`PipelineError::ArtifactMismatch`] if their feature layouts differ.
pub fn load_models(paths: &ModelPaths) -> Result<(FeatureEncoder, FittedProjector)> {
    let encoder = load_artifact::<FeatureEncoder>(&paths.encoder, ArtifactKind::FeatureEncoder)?;
    let projector = load_artifact::<FittedProjector>(&paths.projector, ArtifactKind::Projector)?;

    if encoder.feature_names != projector.feature_names {
        return Err(PipelineError::ArtifactMismatch {
            path: paths.projector.clone(),
            reason: format!(
                "fitted on {} encoded column(s) that do not match the encoder's {}; refit both models",
                projector.feature_names.len(),
                encoder.feature_names.len()
            ),
        }
        .into());
    }

    Ok((encoder.payload, projector.payload))
}

/// Result of mapping one table
#[derive(Debug)]
pub struct MappingOutcome {
    pub rows_loaded: usize,
    /// Rows dropped for a missing feature value
    pub rows_dropped: usize,
    pub points: Vec<EmbeddingPoint>,
    pub warnings: Vec<SchemaAlignmentWarning>,
}

/// Map an in-memory table through fitted models.
///
/// Column names are normalized like the reconciler does. Rows without a
/// provenance tag are labeled as user records.
pub fn map_frame(
    df: &DataFrame,
    encoder: &FeatureEncoder,
    projector: &FittedProjector,
) -> Result<MappingOutcome> {
    let (normalized, warnings) = normalize_columns(df, Provenance::User)?;

    let required: Vec<String> = FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect();
    let (complete, dropped) = drop_incomplete_rows(&normalized, &required)?;

    let matrix = encoder.transform(&complete)?;
    let layout = projector.transform(&matrix)?;
    let points = build_embedding_points(&complete, &layout, Provenance::User)?;

    Ok(MappingOutcome {
        rows_loaded: df.height(),
        rows_dropped: dropped,
        points,
        warnings,
    })
}

/// Load the models and the new table, map it and write the export
pub fn map_new_records(config: &MapConfig) -> Result<MappingOutcome> {
    let (encoder, projector) = load_models(&config.models)?;

    if !config.input.exists() {
        return Err(PipelineError::MissingSource {
            paths: vec![config.input.clone()],
        }
        .into());
    }
    let df = load_dataset(&config.input, config.infer_schema_length)
        .with_context(|| format!("Failed to load records to map: {}", config.input.display()))?;

    let outcome = map_frame(&df, &encoder, &projector)?;
    export_embedding(&outcome.points, &config.output)?;
    Ok(outcome)
}

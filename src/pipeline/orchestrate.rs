//! In-process composition of the reconcile, encode, project and export stages
//!
//! Each stage returns `anyhow::Result`; the first failure stops the run and
//! later stages never execute.

use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;

use super::columns::{filter_rows, i64_values};
use super::config::{EmbedConfig, FitScope, ModelPaths, PipelineConfig, ReconcileConfig};
use super::encoder::FeatureEncoder;
use super::loader::load_dataset;
use super::projector::{FittedProjector, Point2, Projector, ProjectorParams};
use super::reconcile::{drop_incomplete_rows, reconcile_sources, ReconcileOptions, Reconciliation};
use super::schema::{Provenance, FEATURE_COLUMNS, PROVENANCE_COLUMN};
use crate::report::embedding_export::{
    build_embedding_points, export_embedding, publish_to_assets, EmbeddingPoint, PublishOutcome,
};

/// Encoder and projector fitted together, with the layout of the fitted table
#[derive(Debug, Clone)]
pub struct FittedModels {
    pub encoder: FeatureEncoder,
    pub projector: FittedProjector,
    /// One point per row of the table the models were fitted from, in row order
    pub embedding: Vec<Point2>,
    /// Rows the models were fitted on
    pub fit_rows: usize,
}

impl FittedModels {
    /// Write both artifacts, tagging the projector with the encoder layout
    pub fn save(&self, paths: &ModelPaths) -> Result<()> {
        self.encoder.save(&paths.encoder)?;
        self.projector
            .save(&paths.projector, self.encoder.feature_names())?;
        Ok(())
    }
}

/// Reconcile the three sources and write the reconciled table
pub fn run_reconcile(config: &ReconcileConfig) -> Result<Reconciliation> {
    let mut options = ReconcileOptions {
        infer_schema_length: config.infer_schema_length,
        ..ReconcileOptions::default()
    };
    if config.require_complete {
        options = options.require_feature_columns();
    }

    let mut reconciliation = reconcile_sources(&config.sources, &options)?;
    reconciliation
        .save(&config.output)
        .with_context(|| format!("Failed to write reconciled table: {}", config.output.display()))?;
    Ok(reconciliation)
}

fn feature_columns() -> Vec<String> {
    FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect()
}

/// Fit the encoder and projector on `frame` and lay out every row.
///
/// With [`FitScope::TrainingOnly`] the models only see training rows; the
/// remaining rows are placed into the fitted layout afterwards.
pub fn fit_models(frame: &DataFrame, scope: FitScope, params: &ProjectorParams) -> Result<FittedModels> {
    match scope {
        FitScope::Joint => {
            let (encoder, matrix) = FeatureEncoder::fit_transform(frame)?;
            let (projector, embedding) = Projector::new(params.clone()).fit_transform(&matrix)?;
            Ok(FittedModels {
                encoder,
                projector,
                embedding,
                fit_rows: frame.height(),
            })
        }
        FitScope::TrainingOnly => {
            let tags = i64_values(frame, PROVENANCE_COLUMN)?.with_context(|| {
                format!(
                    "Fitting on training rows needs the '{}' column",
                    PROVENANCE_COLUMN
                )
            })?;
            let training_code = Provenance::Training.code() as i64;
            let is_training: Vec<bool> = tags.iter().map(|t| *t == Some(training_code)).collect();
            let training_rows: Vec<usize> = (0..frame.height()).filter(|&i| is_training[i]).collect();
            let other_rows: Vec<usize> = (0..frame.height()).filter(|&i| !is_training[i]).collect();
            if training_rows.is_empty() {
                anyhow::bail!("No training rows to fit on");
            }

            let training = filter_rows(frame, &is_training)?;
            let encoder = FeatureEncoder::fit(&training)?;
            let matrix = encoder.transform(frame)?;

            let (projector, fit_layout) =
                Projector::new(params.clone()).fit_transform(&matrix.select_rows(&training_rows))?;
            let placed = projector.transform(&matrix.select_rows(&other_rows))?;

            let mut embedding = vec![[0.0; 2]; frame.height()];
            for (row, point) in training_rows.iter().zip(fit_layout) {
                embedding[*row] = point;
            }
            for (row, point) in other_rows.iter().zip(placed) {
                embedding[*row] = point;
            }

            Ok(FittedModels {
                encoder,
                projector,
                embedding,
                fit_rows: training_rows.len(),
            })
        }
    }
}

/// What an embed run produced
#[derive(Debug)]
pub struct EmbedOutcome {
    pub rows_loaded: usize,
    /// Rows dropped for a missing feature value
    pub rows_dropped: usize,
    pub fit_rows: usize,
    pub encoded_width: usize,
    pub points: Vec<EmbeddingPoint>,
    /// `None` when no asset directory was configured
    pub publish: Option<PublishOutcome>,
}

/// Fit both models on an in-memory table, save them and build the points
pub fn embed_frame(
    frame: &DataFrame,
    scope: FitScope,
    params: &ProjectorParams,
    models: &ModelPaths,
) -> Result<(FittedModels, Vec<EmbeddingPoint>, usize)> {
    let (complete, dropped) = drop_incomplete_rows(frame, &feature_columns())?;
    if complete.height() == 0 {
        anyhow::bail!("No rows with every feature column filled; nothing to embed");
    }

    let fitted = fit_models(&complete, scope, params)?;
    fitted.save(models)?;
    let points = build_embedding_points(&complete, &fitted.embedding, Provenance::User)?;
    Ok((fitted, points, dropped))
}

/// Write the export, then copy it into `assets_dir` when one is given.
///
/// A failed copy is returned as [`PublishOutcome::Failed`], not as an error.
pub fn export_and_publish(
    points: &[EmbeddingPoint],
    output: &Path,
    assets_dir: Option<&Path>,
) -> Result<Option<PublishOutcome>> {
    export_embedding(points, output)?;
    Ok(assets_dir.map(|dir| publish_to_assets(output, dir)))
}

/// Load the reconciled table, fit and save the models, export the points
/// and publish the export when an asset directory is set.
pub fn run_embed(config: &EmbedConfig) -> Result<EmbedOutcome> {
    let frame = load_dataset(&config.input, config.infer_schema_length)
        .with_context(|| format!("Failed to load reconciled table: {}", config.input.display()))?;

    let (fitted, points, dropped) =
        embed_frame(&frame, config.fit_scope, &config.projector, &config.models)?;
    let publish = export_and_publish(&points, &config.output, config.assets_dir.as_deref())?;

    Ok(EmbedOutcome {
        rows_loaded: frame.height(),
        rows_dropped: dropped,
        fit_rows: fitted.fit_rows,
        encoded_width: fitted.encoder.width(),
        points,
        publish,
    })
}

/// Outcome of a full run
#[derive(Debug)]
pub struct PipelineOutcome {
    pub reconciliation: Reconciliation,
    pub embed: EmbedOutcome,
}

/// Reconcile, then embed the reconciled table
pub fn run_pipeline(config: &PipelineConfig) -> Result<PipelineOutcome> {
    let reconciliation = run_reconcile(&config.reconcile)?;
    let embed = run_embed(&config.embed)?;
    Ok(PipelineOutcome {
        reconciliation,
        embed,
    })
}

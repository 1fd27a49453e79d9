//! Explicit paths and settings for each pipeline stage

use std::path::{Path, PathBuf};

use super::loader::DEFAULT_INFER_SCHEMA_LENGTH;
use super::projector::ProjectorParams;
use super::reconcile::SourcePaths;

pub const DEFAULT_TRAINING_FILE: &str = "german_credit_data_with_predictions.csv";
pub const DEFAULT_COUNTERFACTUALS_FILE: &str = "results.csv";
pub const DEFAULT_USER_FILE: &str = "user.csv";
pub const DEFAULT_RECONCILED_FILE: &str = "joint_credit_data.csv";
pub const DEFAULT_EXPORT_FILE: &str = "german_credit_umap_with_counterfactuals.json";
pub const DEFAULT_MODEL_DIR: &str = "models";
/// Frontend asset directory the export is published to
pub const DEFAULT_ASSETS_DIR: &str = "public/assets";

pub const ENCODER_FILE: &str = "encoder.json";
pub const PROJECTOR_FILE: &str = "projector.json";

/// Rows the encoder and projector are fitted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitScope {
    /// Training, counterfactual and user rows together
    #[default]
    Joint,
    /// Training rows only; the other rows are placed afterwards
    TrainingOnly,
}

impl std::str::FromStr for FitScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "joint" => Ok(FitScope::Joint),
            "training" | "training-only" => Ok(FitScope::TrainingOnly),
            _ => Err(format!("Unknown fit scope: '{}'. Use 'joint' or 'training'.", s)),
        }
    }
}

impl std::fmt::Display for FitScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FitScope::Joint => write!(f, "joint"),
            FitScope::TrainingOnly => write!(f, "training"),
        }
    }
}

/// Where the fitted encoder and projector are stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub encoder: PathBuf,
    pub projector: PathBuf,
}

impl ModelPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            encoder: dir.join(ENCODER_FILE),
            projector: dir.join(PROJECTOR_FILE),
        }
    }

    /// True if either artifact is already on disk
    pub fn any_exist(&self) -> bool {
        self.encoder.exists() || self.projector.exists()
    }
}

/// Settings for the reconcile stage
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    pub sources: SourcePaths,
    /// Reconciled table (CSV or Parquet)
    pub output: PathBuf,
    /// Drop rows missing any encoder feature column
    pub require_complete: bool,
    pub infer_schema_length: usize,
}

/// Settings for fitting the models and exporting the embedding
#[derive(Debug, Clone)]
pub struct EmbedConfig {
    /// Reconciled table to embed
    pub input: PathBuf,
    /// JSON export
    pub output: PathBuf,
    pub models: ModelPaths,
    pub fit_scope: FitScope,
    /// Frontend asset directory the export is copied into; `None` skips publishing
    pub assets_dir: Option<PathBuf>,
    pub projector: ProjectorParams,
    pub infer_schema_length: usize,
}

/// Settings for placing new records with previously fitted models
#[derive(Debug, Clone)]
pub struct MapConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub models: ModelPaths,
    pub infer_schema_length: usize,
}

/// Reconcile followed by embed; the embed input is the reconciled table
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub reconcile: ReconcileConfig,
    pub embed: EmbedConfig,
}

impl PipelineConfig {
    /// Default file layout under `work_dir`
    pub fn in_work_dir(work_dir: &Path) -> Self {
        let reconciled = work_dir.join(DEFAULT_RECONCILED_FILE);
        Self {
            reconcile: ReconcileConfig {
                sources: SourcePaths {
                    training: work_dir.join(DEFAULT_TRAINING_FILE),
                    counterfactuals: work_dir.join(DEFAULT_COUNTERFACTUALS_FILE),
                    user: work_dir.join(DEFAULT_USER_FILE),
                },
                output: reconciled.clone(),
                require_complete: false,
                infer_schema_length: DEFAULT_INFER_SCHEMA_LENGTH,
            },
            embed: EmbedConfig {
                input: reconciled,
                output: work_dir.join(DEFAULT_EXPORT_FILE),
                models: ModelPaths::in_dir(&work_dir.join(DEFAULT_MODEL_DIR)),
                fit_scope: FitScope::Joint,
                assets_dir: Some(work_dir.join(DEFAULT_ASSETS_DIR)),
                projector: ProjectorParams::default(),
                infer_schema_length: DEFAULT_INFER_SCHEMA_LENGTH,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_scope_parsing() {
        assert_eq!("joint".parse::<FitScope>().unwrap(), FitScope::Joint);
        assert_eq!("Training".parse::<FitScope>().unwrap(), FitScope::TrainingOnly);
        assert!("everything".parse::<FitScope>().is_err());
    }

    #[test]
    fn test_work_dir_layout_chains_stages() {
        let config = PipelineConfig::in_work_dir(Path::new("/data"));
        assert_eq!(config.reconcile.output, config.embed.input);
        assert!(!config.reconcile.require_complete);
        assert_eq!(
            config.embed.assets_dir,
            Some(PathBuf::from("/data/public/assets"))
        );
        assert_eq!(
            config.embed.models.encoder,
            PathBuf::from("/data/models/encoder.json")
        );
    }
}

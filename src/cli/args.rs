//! Command-line argument definitions using clap

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use crate::pipeline::{
    EmbedConfig, FitScope, MapConfig, ModelPaths, PipelineConfig, ProjectorParams, ReconcileConfig,
    SourcePaths,
};

/// credit-embed - Reconcile credit records and project them into a 2-D map
#[derive(Parser, Debug)]
#[command(name = "credit-embed")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory the default input, output and model paths are resolved against
    #[arg(long, global = true, default_value = ".")]
    pub work_dir: PathBuf,

    /// Skip interactive confirmation prompts (overwriting fitted models)
    #[arg(long, global = true, default_value = "false")]
    pub no_confirm: bool,

    /// Number of rows to use for schema inference (CSV only).
    /// Use 0 for full table scan (very slow for large files).
    #[arg(long, global = true, default_value = "10000")]
    pub infer_schema_length: usize,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Merge the training, counterfactual and user tables into one canonical table
    Reconcile {
        #[command(flatten)]
        sources: SourceArgs,

        /// Reconciled table (CSV or Parquet, determined by extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fit the encoder and projector on a reconciled table and export the embedding
    Embed {
        /// Reconciled table to embed
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Embedding export (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        embed: EmbedArgs,
    },

    /// Reconcile, then embed the reconciled table
    Run {
        #[command(flatten)]
        sources: SourceArgs,

        /// Reconciled table written between the two stages
        #[arg(long)]
        reconciled: Option<PathBuf>,

        /// Embedding export (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        embed: EmbedArgs,
    },

    /// Place new records into an existing embedding using the saved models
    Map {
        /// Table of new records (CSV or Parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// Mapped export (JSON).
        /// Defaults to the input directory with a '_umap.json' suffix.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory holding encoder.json and projector.json
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
}

/// Input tables of the reconcile stage
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Training table with model predictions
    #[arg(long)]
    pub training: Option<PathBuf>,

    /// Counterfactual results table
    #[arg(long)]
    pub counterfactuals: Option<PathBuf>,

    /// User-submitted records
    #[arg(long)]
    pub user: Option<PathBuf>,

    /// Drop rows missing any encoder feature column before concatenation
    #[arg(long, default_value = "false")]
    pub require_complete: bool,
}

/// Model and projection settings of the embed stage
#[derive(Args, Debug, Clone)]
pub struct EmbedArgs {
    /// Directory encoder.json and projector.json are written to
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    /// Rows the models are fitted on: "joint" (all rows) or "training"
    #[arg(long, default_value = "joint", value_parser = parse_fit_scope)]
    pub fit_scope: FitScope,

    /// Frontend asset directory the export is copied into.
    /// Defaults to 'public/assets' under the work directory.
    #[arg(long)]
    pub assets_dir: Option<PathBuf>,

    /// Do not copy the export into the asset directory
    #[arg(long, default_value = "false", conflicts_with = "assets_dir")]
    pub no_publish: bool,

    /// Neighbourhood size of the embedding graph
    #[arg(long, default_value = "15", value_parser = validate_n_neighbors)]
    pub n_neighbors: usize,

    /// Minimum distance between points in the embedding
    #[arg(long, default_value = "0.1", value_parser = validate_min_dist)]
    pub min_dist: f64,

    /// Random seed of the embedding
    #[arg(long, default_value = "42")]
    pub seed: u64,
}

impl EmbedArgs {
    fn projector_params(&self) -> ProjectorParams {
        ProjectorParams {
            n_neighbors: self.n_neighbors,
            min_dist: self.min_dist,
            random_state: self.seed,
            ..ProjectorParams::default()
        }
    }
}

impl Cli {
    fn defaults(&self) -> PipelineConfig {
        PipelineConfig::in_work_dir(&self.work_dir)
    }

    /// Settings of the `reconcile` subcommand
    pub fn reconcile_config(&self, sources: &SourceArgs, output: Option<&PathBuf>) -> ReconcileConfig {
        let defaults = self.defaults().reconcile;
        ReconcileConfig {
            sources: SourcePaths {
                training: sources.training.clone().unwrap_or(defaults.sources.training),
                counterfactuals: sources
                    .counterfactuals
                    .clone()
                    .unwrap_or(defaults.sources.counterfactuals),
                user: sources.user.clone().unwrap_or(defaults.sources.user),
            },
            output: output.cloned().unwrap_or(defaults.output),
            require_complete: sources.require_complete,
            infer_schema_length: self.infer_schema_length,
        }
    }

    /// Settings of the `embed` subcommand
    pub fn embed_config(&self, embed: &EmbedArgs, input: Option<&PathBuf>, output: Option<&PathBuf>) -> EmbedConfig {
        let defaults = self.defaults().embed;
        EmbedConfig {
            input: input.cloned().unwrap_or(defaults.input),
            output: output.cloned().unwrap_or(defaults.output),
            models: embed
                .model_dir
                .as_deref()
                .map_or(defaults.models, ModelPaths::in_dir),
            fit_scope: embed.fit_scope,
            assets_dir: if embed.no_publish {
                None
            } else {
                embed.assets_dir.clone().or(defaults.assets_dir)
            },
            projector: embed.projector_params(),
            infer_schema_length: self.infer_schema_length,
        }
    }

    /// Settings of the `run` subcommand; the embed stage reads the reconciled table
    pub fn pipeline_config(
        &self,
        sources: &SourceArgs,
        reconciled: Option<&PathBuf>,
        output: Option<&PathBuf>,
        embed: &EmbedArgs,
    ) -> PipelineConfig {
        let reconcile = self.reconcile_config(sources, reconciled);
        let embed = self.embed_config(embed, Some(&reconcile.output), output);
        PipelineConfig { reconcile, embed }
    }

    /// Settings of the `map` subcommand
    pub fn map_config(&self, input: &Path, output: Option<&PathBuf>, model_dir: Option<&Path>) -> MapConfig {
        MapConfig {
            input: input.to_path_buf(),
            output: output.cloned().unwrap_or_else(|| mapped_output_path(input)),
            models: model_dir.map_or(self.defaults().embed.models, ModelPaths::in_dir),
            infer_schema_length: self.infer_schema_length,
        }
    }
}

/// Default mapped export: next to the input with a '_umap.json' suffix
fn mapped_output_path(input: &Path) -> PathBuf {
    let parent = input.parent().unwrap_or_else(|| Path::new("."));
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("mapped");
    parent.join(format!("{}_umap.json", stem))
}

fn parse_fit_scope(s: &str) -> Result<FitScope, String> {
    s.parse()
}

/// Validator for n_neighbors parameter
fn validate_n_neighbors(s: &str) -> Result<usize, String> {
    let value: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid count", s))?;

    if value < 2 {
        Err(format!("n_neighbors must be at least 2, got {}", value))
    } else {
        Ok(value)
    }
}

/// Validator for min_dist parameter
fn validate_min_dist(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;

    if !(0.0..=1.0).contains(&value) {
        Err(format!("min_dist must be between 0.0 and 1.0, got {}", value))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapped_output_path() {
        assert_eq!(
            mapped_output_path(Path::new("/data/new_records.csv")),
            PathBuf::from("/data/new_records_umap.json")
        );
    }

    #[test]
    fn test_assets_dir_defaults_under_work_dir() {
        let cli = Cli::parse_from(["credit-embed", "--work-dir", "/srv", "embed"]);
        let Commands::Embed { input, output, embed } = &cli.command else {
            panic!("expected embed");
        };
        let config = cli.embed_config(embed, input.as_ref(), output.as_ref());
        assert_eq!(config.assets_dir, Some(PathBuf::from("/srv/public/assets")));

        let cli = Cli::parse_from(["credit-embed", "embed", "--assets-dir", "/web/assets"]);
        let Commands::Embed { input, output, embed } = &cli.command else {
            panic!("expected embed");
        };
        let config = cli.embed_config(embed, input.as_ref(), output.as_ref());
        assert_eq!(config.assets_dir, Some(PathBuf::from("/web/assets")));

        let cli = Cli::parse_from(["credit-embed", "embed", "--no-publish"]);
        let Commands::Embed { input, output, embed } = &cli.command else {
            panic!("expected embed");
        };
        let config = cli.embed_config(embed, input.as_ref(), output.as_ref());
        assert_eq!(config.assets_dir, None);
    }

    #[test]
    fn test_validators() {
        assert!(validate_n_neighbors("1").is_err());
        assert_eq!(validate_n_neighbors("15").unwrap(), 15);
        assert!(validate_min_dist("1.5").is_err());
        assert!(validate_min_dist("abc").is_err());
    }
}

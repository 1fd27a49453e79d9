//! Point-cloud export consumed by the frontend

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::pipeline::columns::{f64_values, i64_values, str_values};
use crate::pipeline::error::PipelineError;
use crate::pipeline::loader::save_json;
use crate::pipeline::projector::Point2;
use crate::pipeline::schema::{
    Provenance, AGE, CHECKING_ACCOUNT, CREDIT_AMOUNT, DURATION, HOUSING, JOB, PREDICTION_COLUMN,
    PROVENANCE_COLUMN, PURPOSE, RISK_COLUMN, SAVING_ACCOUNTS, SEX,
};

/// Risk label written when a record has none
pub const UNKNOWN_RISK: &str = "unknown";

/// Original (pre-encoding) feature values of a record
///
/// Values are ungrouped: `saving_accounts` may be "quite rich" and `purpose`
/// may be any raw label such as "business", while the frontend expects
/// little|moderate|rich and the grouped purpose set. Consumers that need the
/// grouped vocabulary apply [`group_saving_accounts`] and [`group_purpose`].
///
/// [`group_saving_accounts`]: crate::pipeline::group_saving_accounts
/// [`group_purpose`]: crate::pipeline::group_purpose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub age: f64,
    pub credit_amount: f64,
    pub duration: f64,
    pub job: i64,
    pub sex: String,
    pub housing: String,
    pub saving_accounts: String,
    pub checking_account: String,
    pub purpose: String,
}

/// One exported record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingPoint {
    /// Position in the exported sequence, equal to the embedding row index
    pub id: usize,
    pub x: f64,
    pub y: f64,
    pub risk: String,
    /// True for every non-training record
    pub counterfactual: bool,
    /// "training", "counterfactual" or "user"
    pub data_type: Provenance,
    /// Ungrouped feature values, see [`FeatureSnapshot`]
    pub features: FeatureSnapshot,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pred: Option<f64>,
}

/// Columns of the table read once for every point
struct SnapshotColumns {
    age: Vec<Option<f64>>,
    credit_amount: Vec<Option<f64>>,
    duration: Vec<Option<f64>>,
    job: Vec<Option<f64>>,
    sex: Vec<Option<String>>,
    housing: Vec<Option<String>>,
    saving_accounts: Vec<Option<String>>,
    checking_account: Vec<Option<String>>,
    purpose: Vec<Option<String>>,
}

fn required<T>(values: Option<Vec<Option<T>>>, column: &str) -> Result<Vec<Option<T>>> {
    values.ok_or_else(|| {
        PipelineError::MissingColumn {
            column: column.to_string(),
            row: None,
        }
        .into()
    })
}

fn cell<T: Clone>(values: &[Option<T>], column: &str, row: usize) -> Result<T> {
    values[row].clone().ok_or_else(|| {
        PipelineError::MissingColumn {
            column: column.to_string(),
            row: Some(row),
        }
        .into()
    })
}

impl SnapshotColumns {
    fn read(df: &DataFrame) -> Result<Self> {
        Ok(Self {
            age: required(f64_values(df, AGE)?, AGE)?,
            credit_amount: required(f64_values(df, CREDIT_AMOUNT)?, CREDIT_AMOUNT)?,
            duration: required(f64_values(df, DURATION)?, DURATION)?,
            job: required(f64_values(df, JOB)?, JOB)?,
            sex: required(str_values(df, SEX)?, SEX)?,
            housing: required(str_values(df, HOUSING)?, HOUSING)?,
            saving_accounts: required(str_values(df, SAVING_ACCOUNTS)?, SAVING_ACCOUNTS)?,
            checking_account: required(str_values(df, CHECKING_ACCOUNT)?, CHECKING_ACCOUNT)?,
            purpose: required(str_values(df, PURPOSE)?, PURPOSE)?,
        })
    }

    fn snapshot(&self, row: usize) -> Result<FeatureSnapshot> {
        Ok(FeatureSnapshot {
            age: cell(&self.age, AGE, row)?,
            credit_amount: cell(&self.credit_amount, CREDIT_AMOUNT, row)?,
            duration: cell(&self.duration, DURATION, row)?,
            job: cell(&self.job, JOB, row)?.round() as i64,
            sex: cell(&self.sex, SEX, row)?,
            housing: cell(&self.housing, HOUSING, row)?,
            saving_accounts: cell(&self.saving_accounts, SAVING_ACCOUNTS, row)?,
            checking_account: cell(&self.checking_account, CHECKING_ACCOUNT, row)?,
            purpose: cell(&self.purpose, PURPOSE, row)?,
        })
    }
}

/// Pair every row of `df` with its coordinate.
///
/// Row `i` of the table must be the row that produced `embedding[i]`. Rows
/// without a provenance tag (or tables without the column) are labeled
/// `default_provenance`. Feature values are copied from the table as-is.
pub fn build_embedding_points(
    df: &DataFrame,
    embedding: &[Point2],
    default_provenance: Provenance,
) -> Result<Vec<EmbeddingPoint>> {
    if df.height() != embedding.len() {
        anyhow::bail!(
            "Table has {} row(s) but the embedding has {} point(s)",
            df.height(),
            embedding.len()
        );
    }

    let snapshots = SnapshotColumns::read(df)?;
    let risk = str_values(df, RISK_COLUMN)?;
    let pred = f64_values(df, PREDICTION_COLUMN)?;
    let provenance = i64_values(df, PROVENANCE_COLUMN)?;

    let mut points = Vec::with_capacity(df.height());
    for (row, coords) in embedding.iter().enumerate() {
        let data_type = match provenance.as_ref().and_then(|tags| tags[row]) {
            Some(code) => Provenance::from_code(code, row)?,
            None => default_provenance,
        };

        points.push(EmbeddingPoint {
            id: row,
            x: coords[0],
            y: coords[1],
            risk: risk
                .as_ref()
                .and_then(|values| values[row].clone())
                .unwrap_or_else(|| UNKNOWN_RISK.to_string()),
            counterfactual: data_type != Provenance::Training,
            data_type,
            features: snapshots.snapshot(row)?,
            pred: pred
                .as_ref()
                .and_then(|values| values[row])
                .filter(|p| !p.is_nan()),
        });
    }

    Ok(points)
}

/// Write the points as one JSON array, atomically
pub fn export_embedding(points: &[EmbeddingPoint], path: &Path) -> Result<()> {
    save_json(points, path)
}

/// Result of copying the export into the frontend asset directory
#[derive(Debug)]
pub enum PublishOutcome {
    Published(PathBuf),
    Failed(anyhow::Error),
}

/// Copy `export` into `assets_dir` under the same file name.
///
/// Failure is reported in the outcome rather than returned as an error: the
/// export itself is already complete.
pub fn publish_to_assets(export: &Path, assets_dir: &Path) -> PublishOutcome {
    match copy_into(export, assets_dir) {
        Ok(dest) => PublishOutcome::Published(dest),
        Err(e) => PublishOutcome::Failed(e),
    }
}

fn copy_into(export: &Path, assets_dir: &Path) -> Result<PathBuf> {
    let file_name = export
        .file_name()
        .with_context(|| format!("Export path has no file name: {}", export.display()))?;
    let dest = assets_dir.join(file_name);

    std::fs::create_dir_all(assets_dir)
        .with_context(|| format!("Failed to create asset directory: {}", assets_dir.display()))?;
    let bytes = std::fs::read(export)
        .with_context(|| format!("Failed to read export: {}", export.display()))?;

    let mut tmp = NamedTempFile::new_in(assets_dir)
        .with_context(|| format!("Failed to create file in {}", assets_dir.display()))?;
    tmp.write_all(&bytes)
        .with_context(|| format!("Failed to write {}", dest.display()))?;
    tmp.persist(&dest)
        .with_context(|| format!("Failed to move export into place: {}", dest.display()))?;

    Ok(dest)
}

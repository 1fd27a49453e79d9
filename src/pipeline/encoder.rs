//! Feature encoding: one-hot categoricals, ordinal job code, standardized numerics
//!
//! The encoder is fitted once and then reused unchanged for every later
//! transform, so categories, codes and scales learned at fit time define the
//! matrix layout for all rows encoded afterwards.

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use super::artifact::{load_artifact, save_artifact, ArtifactKind};
use super::columns::{f64_values, str_values};
use super::error::PipelineError;
use super::matrix::FeatureMatrix;
use super::schema::{
    CATEGORICAL_COLUMNS, NUMERIC_COLUMNS, ORDINAL_COLUMNS, PURPOSE, SAVING_ACCOUNTS,
};

/// Purpose labels kept as-is; everything else becomes [`OTHER_PURPOSE`]
const KEPT_PURPOSES: [&str; 3] = ["radio/TV", "car", "furniture/equipment"];
const OTHER_PURPOSE: &str = "others";

/// Saving-account levels kept as-is; everything else becomes [`RICH_SAVINGS`]
const KEPT_SAVINGS: [&str; 2] = ["little", "moderate"];
const RICH_SAVINGS: &str = "rich";

/// Collapse infrequent purposes into "others".
///
/// Matching is case-insensitive and returns the canonical spelling, so a
/// user-entered `radio/tv` groups with `radio/TV`.
pub fn group_purpose(value: &str) -> String {
    KEPT_PURPOSES
        .iter()
        .find(|kept| kept.eq_ignore_ascii_case(value))
        .map_or(OTHER_PURPOSE, |kept| *kept)
        .to_string()
}

/// Collapse every saving-account level above "moderate" into "rich"
pub fn group_saving_accounts(value: &str) -> String {
    KEPT_SAVINGS
        .iter()
        .find(|kept| kept.eq_ignore_ascii_case(value))
        .map_or(RICH_SAVINGS, |kept| *kept)
        .to_string()
}

/// Grouping applied to a categorical value before fitting or transforming
fn grouped(column: &str, value: &str) -> String {
    match column {
        PURPOSE => group_purpose(value),
        SAVING_ACCOUNTS => group_saving_accounts(value),
        _ => value.to_string(),
    }
}

/// Categories learned for one one-hot column, in indicator order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalVocabulary {
    pub column: String,
    pub categories: Vec<String>,
}

impl CategoricalVocabulary {
    fn index_of(&self, value: &str) -> Option<usize> {
        self.categories.binary_search_by(|c| c.as_str().cmp(value)).ok()
    }
}

/// Ordinal code table: a value's code is its position in `values`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrdinalTable {
    pub column: String,
    pub values: Vec<i64>,
}

/// Standard-scaling parameters for one numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericScaler {
    pub column: String,
    pub mean: f64,
    pub scale: f64,
}

/// Fitted feature encoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    categorical: Vec<CategoricalVocabulary>,
    ordinal: Vec<OrdinalTable>,
    numeric: Vec<NumericScaler>,
}

/// Feature columns of a frame, read once and grouped
struct RawFeatures {
    n_rows: usize,
    categorical: Vec<Vec<String>>,
    ordinal: Vec<Vec<i64>>,
    numeric: Vec<Vec<f64>>,
}

impl RawFeatures {
    fn from_frame(df: &DataFrame) -> Result<Self> {
        let categorical = CATEGORICAL_COLUMNS
            .iter()
            .map(|&column| -> Result<Vec<String>> {
                let values = required(column, str_values(df, column)?)?;
                Ok(values.iter().map(|v| grouped(column, v)).collect())
            })
            .collect::<Result<Vec<Vec<String>>>>()?;

        let ordinal = ORDINAL_COLUMNS
            .iter()
            .map(|&column| -> Result<Vec<i64>> {
                let values = required(column, f64_values(df, column)?)?;
                Ok(values.into_iter().map(|v| v.round() as i64).collect())
            })
            .collect::<Result<Vec<Vec<i64>>>>()?;

        let numeric = NUMERIC_COLUMNS
            .iter()
            .map(|&column| required(column, f64_values(df, column)?))
            .collect::<Result<Vec<Vec<f64>>>>()?;

        Ok(Self {
            n_rows: df.height(),
            categorical,
            ordinal,
            numeric,
        })
    }
}

/// Unwrap a column that must be present and fully populated
fn required<T>(column: &str, values: Option<Vec<Option<T>>>) -> Result<Vec<T>> {
    let values = values.ok_or_else(|| PipelineError::MissingColumn {
        column: column.to_string(),
        row: None,
    })?;
    values
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                PipelineError::MissingColumn {
                    column: column.to_string(),
                    row: Some(row),
                }
                .into()
            })
        })
        .collect()
}

impl FeatureEncoder {
    /// Learn vocabularies, ordinal codes and scales from `df`.
    pub fn fit(df: &DataFrame) -> Result<Self> {
        if df.height() == 0 {
            anyhow::bail!("Cannot fit the feature encoder on an empty table");
        }
        let raw = RawFeatures::from_frame(df)?;

        let categorical = CATEGORICAL_COLUMNS
            .iter()
            .zip(&raw.categorical)
            .map(|(&column, values)| {
                let categories: BTreeSet<&String> = values.iter().collect();
                CategoricalVocabulary {
                    column: column.to_string(),
                    categories: categories.into_iter().cloned().collect(),
                }
            })
            .collect();

        let ordinal = ORDINAL_COLUMNS
            .iter()
            .zip(&raw.ordinal)
            .map(|(&column, values)| {
                let distinct: BTreeSet<i64> = values.iter().copied().collect();
                OrdinalTable {
                    column: column.to_string(),
                    values: distinct.into_iter().collect(),
                }
            })
            .collect();

        let numeric = NUMERIC_COLUMNS
            .iter()
            .zip(&raw.numeric)
            .map(|(&column, values)| {
                let n = values.len() as f64;
                let mean = values.iter().sum::<f64>() / n;
                let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
                let std = variance.sqrt();
                NumericScaler {
                    column: column.to_string(),
                    mean,
                    // Constant columns are centred but not scaled
                    scale: if std > 0.0 { std } else { 1.0 },
                }
            })
            .collect();

        Ok(Self {
            categorical,
            ordinal,
            numeric,
        })
    }

    /// Encode `df` into a matrix of [`Self::width`] columns.
    ///
    /// Categories not seen at fit time leave their indicator block all zero.
    pub fn transform(&self, df: &DataFrame) -> Result<FeatureMatrix> {
        let raw = RawFeatures::from_frame(df)?;
        let width = self.width();
        let mut data = vec![0.0; raw.n_rows * width];

        for row in 0..raw.n_rows {
            let out = &mut data[row * width..(row + 1) * width];
            let mut offset = 0;

            for (vocab, values) in self.categorical.iter().zip(&raw.categorical) {
                if let Some(idx) = vocab.index_of(&values[row]) {
                    out[offset + idx] = 1.0;
                }
                offset += vocab.categories.len();
            }

            for (table, values) in self.ordinal.iter().zip(&raw.ordinal) {
                let value = values[row];
                let code = table.values.binary_search(&value).map_err(|_| {
                    PipelineError::UnknownOrdinalValue {
                        column: table.column.clone(),
                        value,
                        row,
                    }
                })?;
                out[offset] = code as f64;
                offset += 1;
            }

            for (scaler, values) in self.numeric.iter().zip(&raw.numeric) {
                out[offset] = (values[row] - scaler.mean) / scaler.scale;
                offset += 1;
            }
        }

        Ok(FeatureMatrix::new(raw.n_rows, width, data))
    }

    /// Fit on `df` and encode it in one step
    pub fn fit_transform(df: &DataFrame) -> Result<(Self, FeatureMatrix)> {
        let encoder = Self::fit(df)?;
        let matrix = encoder.transform(df)?;
        Ok((encoder, matrix))
    }

    /// Number of columns produced by [`Self::transform`]
    pub fn width(&self) -> usize {
        self.categorical
            .iter()
            .map(|v| v.categories.len())
            .sum::<usize>()
            + self.ordinal.len()
            + self.numeric.len()
    }

    /// Names of the encoded columns, in matrix order
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(self.width());
        for vocab in &self.categorical {
            for category in &vocab.categories {
                names.push(format!("{}_{}", vocab.column, category));
            }
        }
        names.extend(self.ordinal.iter().map(|t| t.column.clone()));
        names.extend(self.numeric.iter().map(|s| s.column.clone()));
        names
    }

    pub fn vocabulary(&self, column: &str) -> Option<&CategoricalVocabulary> {
        self.categorical.iter().find(|v| v.column == column)
    }

    pub fn scaler(&self, column: &str) -> Option<&NumericScaler> {
        self.numeric.iter().find(|s| s.column == column)
    }

    /// Persist as a versioned model artifact
    pub fn save(&self, path: &Path) -> Result<()> {
        save_artifact(path, ArtifactKind::FeatureEncoder, self.feature_names(), self)
    }

    /// Load an encoder written by [`Self::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let artifact = load_artifact::<Self>(path, ArtifactKind::FeatureEncoder)?;
        Ok(artifact.payload)
    }
}

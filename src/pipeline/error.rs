//! Error types for the embedding pipeline.
//!
//! Stage functions return `anyhow::Result`; the failures a caller may want to
//! react to are raised as `PipelineError` values so they can be recovered with
//! `downcast_ref`.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::schema::Provenance;

/// Errors that abort a pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// One or more declared input tables do not exist.
    ///
    /// All sources are checked before any is read, so nothing has been
    /// written when this is returned.
    #[error("Missing required input file(s): {}", join_paths(.paths))]
    MissingSource {
        /// Every declared path that was not found
        paths: Vec<PathBuf>,
    },

    /// A row lacks a column the fitted encoder requires.
    #[error("{}", describe_missing_column(.column, *.row))]
    MissingColumn {
        /// Canonical column name
        column: String,
        /// Zero-based row index, or `None` when the whole column is absent
        row: Option<usize>,
    },

    /// The encoded matrix width disagrees with the fitted projector.
    #[error("Feature matrix has {actual} column(s) but the projector was fitted on {expected}")]
    DimensionMismatch {
        /// Width the projector was fitted on
        expected: usize,
        /// Width of the matrix that was passed in
        actual: usize,
    },

    /// Out-of-sample mapping was requested without persisted models.
    #[error(
        "No fitted model found at {}. Run `credit-embed embed` (or `run`) first to fit and persist the encoder and projector.",
        .path.display()
    )]
    ModelNotFound {
        /// Artifact path that was looked up
        path: PathBuf,
    },

    /// A persisted artifact cannot be used with this build or with its partner.
    #[error("Model artifact {} cannot be used: {reason}", .path.display())]
    ArtifactMismatch {
        /// Artifact path
        path: PathBuf,
        /// What did not match
        reason: String,
    },

    /// An ordinal value that has no code in the fitted table.
    #[error("Row {row}: value {value} in ordinal column '{column}' was not seen when the encoder was fitted")]
    UnknownOrdinalValue {
        column: String,
        value: i64,
        row: usize,
    },

    /// A provenance tag outside 0/1/2.
    #[error("Row {row}: provenance value {value} is not one of 0 (training), 1 (counterfactual), 2 (user)")]
    InvalidProvenance { row: usize, value: i64 },
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_missing_column(column: &str, row: Option<usize>) -> String {
    match row {
        Some(row) => format!("Row {} is missing a value for required column '{}'", row, column),
        None => format!("Required column '{}' is not present in the input", column),
    }
}

/// Non-fatal notice that a source did not carry a canonical column, or
/// carried it twice under different spellings.
///
/// Warnings are collected and printed; they never abort reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaAlignmentWarning {
    pub source: Provenance,
    pub column: String,
    pub kind: AlignmentIssue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentIssue {
    /// Column is absent from this source and was filled with nulls
    FilledWithNulls,
    /// Two source columns normalized to the same name; the first was kept
    DuplicateAfterNormalization,
}

impl fmt::Display for SchemaAlignmentWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            AlignmentIssue::FilledWithNulls => write!(
                f,
                "{} source has no '{}' column; filled with nulls",
                self.source, self.column
            ),
            AlignmentIssue::DuplicateAfterNormalization => write!(
                f,
                "{} source has more than one column normalizing to '{}'; kept the first",
                self.source, self.column
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_source_lists_every_path() {
        let err = PipelineError::MissingSource {
            paths: vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")],
        };
        assert_eq!(err.to_string(), "Missing required input file(s): a.csv, b.csv");
    }

    #[test]
    fn test_model_not_found_is_actionable() {
        let err = PipelineError::ModelNotFound {
            path: PathBuf::from("models/encoder.json"),
        };
        let msg = err.to_string();
        assert!(msg.contains("models/encoder.json"));
        assert!(msg.contains("embed"));
    }

    #[test]
    fn test_missing_column_message_variants() {
        let whole = PipelineError::MissingColumn {
            column: "age".to_string(),
            row: None,
        };
        let cell = PipelineError::MissingColumn {
            column: "age".to_string(),
            row: Some(3),
        };
        assert!(whole.to_string().contains("not present"));
        assert!(cell.to_string().contains("Row 3"));
    }
}

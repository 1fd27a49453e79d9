//! Schema reconciliation across the training, counterfactual and user tables
//!
//! Every source is normalized to lower-case canonical column names, aligned
//! to the union of all source columns (absent cells become explicit nulls),
//! tagged with its provenance and concatenated in source order. Columns are
//! emitted in lexicographic order so positions are stable across runs.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use polars::prelude::*;

use super::columns::CellKind;
use super::error::{AlignmentIssue, PipelineError, SchemaAlignmentWarning};
use super::loader::{load_dataset, save_dataset};
use super::schema::{Provenance, COLUMN_SYNONYMS, FEATURE_COLUMNS, PROVENANCE_COLUMN};

/// Locations of the three input tables
#[derive(Debug, Clone)]
pub struct SourcePaths {
    pub training: PathBuf,
    pub counterfactuals: PathBuf,
    pub user: PathBuf,
}

impl SourcePaths {
    pub fn iter(&self) -> impl Iterator<Item = (Provenance, &Path)> {
        [
            (Provenance::Training, self.training.as_path()),
            (Provenance::Counterfactual, self.counterfactuals.as_path()),
            (Provenance::User, self.user.as_path()),
        ]
        .into_iter()
    }
}

/// One loaded input table with its provenance
#[derive(Debug, Clone)]
pub struct SourceFrame {
    pub provenance: Provenance,
    pub frame: DataFrame,
}

impl SourceFrame {
    pub fn new(provenance: Provenance, frame: DataFrame) -> Self {
        Self { provenance, frame }
    }
}

/// Options for [`reconcile_sources`]
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Drop rows missing a value in any of these columns before concatenation
    pub required_columns: Option<Vec<String>>,
    /// Rows used for CSV schema inference
    pub infer_schema_length: usize,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            required_columns: None,
            infer_schema_length: super::loader::DEFAULT_INFER_SCHEMA_LENGTH,
        }
    }
}

impl ReconcileOptions {
    /// Require every encoder feature column to be filled
    pub fn require_feature_columns(mut self) -> Self {
        self.required_columns = Some(FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect());
        self
    }
}

/// Row counts for one source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRowCount {
    pub provenance: Provenance,
    /// Rows read from the source
    pub loaded: usize,
    /// Rows that made it into the reconciled table
    pub kept: usize,
}

/// Result of reconciling the input tables
#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Reconciled table, columns in lexicographic order
    pub frame: DataFrame,
    /// Per-source row counts, in source order
    pub row_counts: Vec<SourceRowCount>,
    /// Non-fatal alignment notices
    pub warnings: Vec<SchemaAlignmentWarning>,
}

impl Reconciliation {
    pub fn columns(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn total_rows(&self) -> usize {
        self.frame.height()
    }

    /// Write the reconciled table (CSV or Parquet by extension)
    pub fn save(&mut self, path: &Path) -> Result<()> {
        save_dataset(&mut self.frame, path)
    }
}

/// Canonical form of a source column name: lower-cased, synonyms resolved
pub fn normalize_column_name(name: &str) -> String {
    let lowered = name.to_lowercase();
    COLUMN_SYNONYMS
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(lowered)
}

/// Unlabeled leading column holding row labels (written by R and pandas)
fn is_row_label_column(position: usize, name: &str) -> bool {
    position == 0 && (name.is_empty() || name.eq_ignore_ascii_case("unnamed: 0"))
}

/// A source with its columns renamed to canonical names
struct NormalizedSource {
    provenance: Provenance,
    height: usize,
    columns: BTreeMap<String, Column>,
}

/// Columns of `frame` keyed by canonical name; the row-label column is dropped
/// and later duplicates of a canonical name are reported and skipped.
fn canonical_columns(
    frame: &DataFrame,
    provenance: Provenance,
    warnings: &mut Vec<SchemaAlignmentWarning>,
) -> BTreeMap<String, Column> {
    let mut columns: BTreeMap<String, Column> = BTreeMap::new();

    for (position, col) in frame.get_columns().iter().enumerate() {
        let raw_name = col.name().as_str();
        if is_row_label_column(position, raw_name) {
            continue;
        }

        let canonical = normalize_column_name(raw_name);
        if columns.contains_key(&canonical) {
            warnings.push(SchemaAlignmentWarning {
                source: provenance,
                column: canonical,
                kind: AlignmentIssue::DuplicateAfterNormalization,
            });
            continue;
        }
        columns.insert(canonical, col.clone());
    }

    columns
}

fn normalize_source(
    source: SourceFrame,
    warnings: &mut Vec<SchemaAlignmentWarning>,
) -> NormalizedSource {
    let mut columns = canonical_columns(&source.frame, source.provenance, warnings);
    // Provenance is assigned from the source slot, never trusted from the file
    columns.remove(PROVENANCE_COLUMN);

    NormalizedSource {
        provenance: source.provenance,
        height: source.frame.height(),
        columns,
    }
}

/// Rename the columns of a single table to canonical names.
///
/// Unlike [`reconcile_frames`], an existing `counterfactual` column is kept.
/// Columns are returned in lexicographic order.
pub fn normalize_columns(
    df: &DataFrame,
    provenance: Provenance,
) -> Result<(DataFrame, Vec<SchemaAlignmentWarning>)> {
    let mut warnings = Vec::new();
    let renamed: Vec<Column> = canonical_columns(df, provenance, &mut warnings)
        .into_iter()
        .map(|(name, col)| col.with_name(name.into()))
        .collect();

    let frame = DataFrame::new(renamed).context("Failed to assemble normalized table")?;
    Ok((frame, warnings))
}

/// Keep only rows with a value in every `required` column.
///
/// Surviving rows keep their relative order. Returns the filtered table and
/// the number of rows dropped; a required column that is absent drops every
/// row.
pub fn drop_incomplete_rows(df: &DataFrame, required: &[String]) -> Result<(DataFrame, usize)> {
    let height = df.height();
    let mut keep = BooleanChunked::full("keep".into(), true, height);
    for column in required {
        keep = match df.column(column) {
            Ok(col) => &keep & &col.is_not_null(),
            Err(_) => BooleanChunked::full("keep".into(), false, height),
        };
    }

    let kept = keep.num_trues();
    if kept == height {
        return Ok((df.clone(), 0));
    }
    let frame = df
        .filter(&keep)
        .context("Failed to assemble filtered table")?;
    Ok((frame, height - kept))
}

/// Reconcile already-loaded tables into one canonical frame.
///
/// Sources are concatenated in the order given. When `required` is set, rows
/// with a null (or absent) value in any required column are dropped from
/// their source before concatenation; other columns are not inspected.
pub fn reconcile_frames(
    sources: Vec<SourceFrame>,
    required: Option<&[String]>,
) -> Result<Reconciliation> {
    let mut warnings = Vec::new();
    let normalized: Vec<NormalizedSource> = sources
        .into_iter()
        .map(|s| normalize_source(s, &mut warnings))
        .collect();

    // Union of column names and the storage kind each one needs
    let mut kinds: BTreeMap<String, Option<CellKind>> = BTreeMap::new();
    for source in &normalized {
        for (name, col) in &source.columns {
            let entry = kinds.entry(name.clone()).or_insert(None);
            // All-null columns say nothing about the type
            if col.null_count() == col.len() {
                continue;
            }
            let kind = CellKind::of(col.dtype());
            *entry = Some(entry.map_or(kind, |k| k.unify(kind)));
        }
    }

    for source in &normalized {
        for name in kinds.keys() {
            if !source.columns.contains_key(name) {
                warnings.push(SchemaAlignmentWarning {
                    source: source.provenance,
                    column: name.clone(),
                    kind: AlignmentIssue::FilledWithNulls,
                });
            }
        }
    }

    let mut parts = Vec::with_capacity(normalized.len());
    let mut row_counts = Vec::with_capacity(normalized.len());

    for source in &normalized {
        let mut columns = Vec::with_capacity(source.columns.len() + 1);
        for (name, col) in &source.columns {
            let kind = kinds.get(name).copied().flatten().unwrap_or(CellKind::Text);
            let cast = col
                .cast(&kind.dtype())
                .with_context(|| format!("Failed to read column '{}'", name))?;
            columns.push(cast.with_name(name.as_str().into()));
        }
        columns.push(Column::new(
            PROVENANCE_COLUMN.into(),
            vec![source.provenance.code(); source.height],
        ));

        let frame = DataFrame::new(columns).with_context(|| {
            format!("Failed to assemble {} rows", source.provenance.as_str())
        })?;
        // Columns a source lacks are null throughout, so a required one drops every row
        let frame = match required {
            Some(required) => drop_incomplete_rows(&frame, required)?.0,
            None => frame,
        };

        row_counts.push(SourceRowCount {
            provenance: source.provenance,
            loaded: source.height,
            kept: frame.height(),
        });
        parts.push(frame);
    }

    let frame = if parts.is_empty() {
        DataFrame::new(vec![Column::new(PROVENANCE_COLUMN.into(), Vec::<i32>::new())])?
    } else {
        let mut order: BTreeSet<&str> = kinds.keys().map(String::as_str).collect();
        order.insert(PROVENANCE_COLUMN);
        polars::functions::concat_df_diagonal(&parts)
            .and_then(|df| df.select(order))
            .context("Failed to assemble reconciled table")?
    };

    Ok(Reconciliation {
        frame,
        row_counts,
        warnings,
    })
}

/// Check every source exists, load them and reconcile.
///
/// Fails with [`PipelineError::MissingSource`] before reading anything if any
/// declared input is absent.
pub fn reconcile_sources(paths: &SourcePaths, options: &ReconcileOptions) -> Result<Reconciliation> {
    let missing: Vec<PathBuf> = paths
        .iter()
        .filter(|(_, path)| !path.exists())
        .map(|(_, path)| path.to_path_buf())
        .collect();
    if !missing.is_empty() {
        return Err(PipelineError::MissingSource { paths: missing }.into());
    }

    let mut sources = Vec::with_capacity(3);
    for (provenance, path) in paths.iter() {
        let frame = load_dataset(path, options.infer_schema_length)
            .with_context(|| format!("Failed to load {} data", provenance.as_str()))?;
        sources.push(SourceFrame::new(provenance, frame));
    }

    reconcile_frames(sources, options.required_columns.as_deref())
}

/// Distinct canonical column names across sources, provenance column included
pub fn union_columns(frames: &[&DataFrame]) -> BTreeSet<String> {
    let mut union = BTreeSet::new();
    for df in frames {
        for (position, name) in df.get_column_names().into_iter().enumerate() {
            if !is_row_label_column(position, name.as_str()) {
                union.insert(normalize_column_name(name.as_str()));
            }
        }
    }
    union.insert(PROVENANCE_COLUMN.to_string());
    union
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_column_name_lowercases_and_resolves_synonyms() {
        assert_eq!(normalize_column_name("Saving.accounts"), "saving accounts");
        assert_eq!(normalize_column_name("checking.account"), "checking account");
        assert_eq!(normalize_column_name("Credit.Amount"), "credit amount");
        assert_eq!(normalize_column_name("credit_amount"), "credit amount");
        assert_eq!(normalize_column_name("Saving accounts"), "saving accounts");
        assert_eq!(normalize_column_name("Age"), "age");
    }

    #[test]
    fn test_row_label_column_only_at_first_position() {
        assert!(is_row_label_column(0, ""));
        assert!(is_row_label_column(0, "Unnamed: 0"));
        assert!(!is_row_label_column(1, ""));
        assert!(!is_row_label_column(0, "age"));
    }

    #[test]
    fn test_duplicate_after_normalization_keeps_first() {
        let df = df! {
            "Saving accounts" => ["little"],
            "saving.accounts" => ["rich"],
        }
        .unwrap();
        let rec = reconcile_frames(vec![SourceFrame::new(Provenance::User, df)], None).unwrap();
        let values = super::super::columns::str_values(&rec.frame, "saving accounts")
            .unwrap()
            .unwrap();
        assert_eq!(values, vec![Some("little".to_string())]);
        assert!(rec
            .warnings
            .iter()
            .any(|w| w.kind == AlignmentIssue::DuplicateAfterNormalization));
    }

    #[test]
    fn test_normalize_columns_keeps_existing_provenance() {
        let df = df! {
            "" => [0i64, 1],
            "Credit.Amount" => [1000.0f64, 2000.0],
            "counterfactual" => [1i64, 2],
        }
        .unwrap();
        let (frame, warnings) = normalize_columns(&df, Provenance::User).unwrap();
        let names: Vec<String> = frame.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["counterfactual", "credit amount"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_drop_incomplete_rows_only_checks_required_columns() {
        let df = df! {
            "age" => [Some(30.0f64), None, Some(50.0)],
            "risk" => [None, Some("good"), None],
        }
        .unwrap();
        let (filtered, dropped) = drop_incomplete_rows(&df, &["age".to_string()]).unwrap();
        assert_eq!(dropped, 1);
        let ages = super::super::columns::f64_values(&filtered, "age").unwrap().unwrap();
        assert_eq!(ages, vec![Some(30.0), Some(50.0)]);
    }

    #[test]
    fn test_integer_and_float_sources_unify_to_float() {
        let a = df! { "age" => [25i64] }.unwrap();
        let b = df! { "age" => [31.5f64] }.unwrap();
        let rec = reconcile_frames(
            vec![
                SourceFrame::new(Provenance::Training, a),
                SourceFrame::new(Provenance::Counterfactual, b),
            ],
            None,
        )
        .unwrap();
        assert_eq!(rec.frame.column("age").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_disjoint_columns_are_null_filled_and_ordered() {
        let a = df! { "Age" => [25i64, 40], "Risk" => ["good", "bad"] }.unwrap();
        let b = df! { "age" => [31i64], "Job" => [2i64] }.unwrap();
        let rec = reconcile_frames(
            vec![
                SourceFrame::new(Provenance::Training, a),
                SourceFrame::new(Provenance::User, b),
            ],
            None,
        )
        .unwrap();
        assert_eq!(rec.columns(), vec!["age", "counterfactual", "job", "risk"]);
        let jobs = super::super::columns::i64_values(&rec.frame, "job").unwrap().unwrap();
        assert_eq!(jobs, vec![None, None, Some(2)]);
        let risk = super::super::columns::str_values(&rec.frame, "risk").unwrap().unwrap();
        assert_eq!(risk[2], None);
        let tags = super::super::columns::i64_values(&rec.frame, PROVENANCE_COLUMN)
            .unwrap()
            .unwrap();
        assert_eq!(tags, vec![Some(0), Some(0), Some(2)]);
    }

    #[test]
    fn test_required_column_absent_from_a_source_drops_its_rows() {
        let a = df! { "age" => [25i64, 40], "risk" => ["good", "bad"] }.unwrap();
        let b = df! { "age" => [31i64] }.unwrap();
        let rec = reconcile_frames(
            vec![
                SourceFrame::new(Provenance::Training, a),
                SourceFrame::new(Provenance::User, b),
            ],
            Some(&["risk".to_string()]),
        )
        .unwrap();
        assert_eq!(rec.total_rows(), 2);
        assert_eq!(rec.row_counts[1].kept, 0);
        assert_eq!(rec.row_counts[1].loaded, 1);
    }
}

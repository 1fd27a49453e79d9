//! Shared test utilities and fixture generators

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

use credit_embed::pipeline::{ProjectorParams, SourcePaths};

const SEXES: [&str; 2] = ["male", "female"];
const HOUSING: [&str; 3] = ["own", "rent", "free"];
const SAVINGS: [&str; 4] = ["little", "moderate", "quite rich", "rich"];
const CHECKING: [&str; 3] = ["little", "moderate", "rich"];
const PURPOSES: [&str; 6] = [
    "radio/TV",
    "car",
    "furniture/equipment",
    "business",
    "education",
    "repairs",
];

fn pick<'a>(rng: &mut StdRng, values: &[&'a str]) -> &'a str {
    values[rng.gen_range(0..values.len())]
}

/// Random but reproducible feature columns, keyed by the given column names
/// (so callers can use each source's own spelling).
fn feature_columns(rng: &mut StdRng, rows: usize, names: [&str; 9]) -> Vec<Column> {
    let [age, sex, job, housing, savings, checking, amount, duration, purpose] = names;
    vec![
        Column::new(age.into(), (0..rows).map(|_| rng.gen_range(19..75) as i64).collect::<Vec<_>>()),
        Column::new(sex.into(), (0..rows).map(|_| pick(rng, &SEXES)).collect::<Vec<_>>()),
        // Every job code appears so a training-only fit knows all of them
        Column::new(job.into(), (0..rows).map(|i| (i % 4) as i64).collect::<Vec<_>>()),
        Column::new(housing.into(), (0..rows).map(|_| pick(rng, &HOUSING)).collect::<Vec<_>>()),
        Column::new(savings.into(), (0..rows).map(|_| pick(rng, &SAVINGS)).collect::<Vec<_>>()),
        Column::new(checking.into(), (0..rows).map(|_| pick(rng, &CHECKING)).collect::<Vec<_>>()),
        Column::new(amount.into(), (0..rows).map(|_| rng.gen_range(250..18_000) as i64).collect::<Vec<_>>()),
        Column::new(duration.into(), (0..rows).map(|_| rng.gen_range(4..72) as i64).collect::<Vec<_>>()),
        Column::new(purpose.into(), (0..rows).map(|_| pick(rng, &PURPOSES)).collect::<Vec<_>>()),
    ]
}

/// Training table in the layout the credit model writes: capitalized names,
/// a risk label and the model's prediction
pub fn create_training_dataframe(rows: usize) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(1);
    let mut columns = feature_columns(
        &mut rng,
        rows,
        [
            "Age",
            "Sex",
            "Job",
            "Housing",
            "Saving accounts",
            "Checking account",
            "Credit amount",
            "Duration",
            "Purpose",
        ],
    );
    let risk: Vec<&str> = (0..rows).map(|i| if i % 3 == 0 { "bad" } else { "good" }).collect();
    let pred: Vec<f64> = (0..rows).map(|_| rng.gen_range(0.0..1.0)).collect();
    columns.push(Column::new("Risk".into(), risk));
    columns.push(Column::new("pred".into(), pred));
    DataFrame::new(columns).unwrap()
}

/// Counterfactual results with dotted column names and no prediction
pub fn create_counterfactual_dataframe(rows: usize) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(2);
    let mut columns = feature_columns(
        &mut rng,
        rows,
        [
            "age",
            "sex",
            "job",
            "housing",
            "saving.accounts",
            "checking.account",
            "credit.amount",
            "duration",
            "purpose",
        ],
    );
    let risk: Vec<&str> = (0..rows).map(|_| "good").collect();
    columns.push(Column::new("risk".into(), risk));
    DataFrame::new(columns).unwrap()
}

/// A single user-submitted record without a risk label
pub fn create_user_dataframe() -> DataFrame {
    df! {
        "age" => [33i64],
        "sex" => ["female"],
        "job" => [2i64],
        "housing" => ["rent"],
        "saving accounts" => ["little"],
        "checking account" => ["moderate"],
        "credit amount" => [4200i64],
        "duration" => [24i64],
        "purpose" => ["radio/tv"],
    }
    .unwrap()
}

/// Write `df` as CSV to `dir/name`
pub fn write_csv(dir: &Path, name: &str, df: &mut DataFrame) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();
    path
}

/// Write the three fixture sources into a fresh temporary directory
pub fn create_temp_sources(training_rows: usize, counterfactual_rows: usize) -> (TempDir, SourcePaths) {
    let temp_dir = TempDir::new().unwrap();
    let paths = SourcePaths {
        training: write_csv(
            temp_dir.path(),
            "training.csv",
            &mut create_training_dataframe(training_rows),
        ),
        counterfactuals: write_csv(
            temp_dir.path(),
            "counterfactuals.csv",
            &mut create_counterfactual_dataframe(counterfactual_rows),
        ),
        user: write_csv(temp_dir.path(), "user.csv", &mut create_user_dataframe()),
    };
    (temp_dir, paths)
}

/// Projection settings small enough for tests
pub fn fast_projector_params() -> ProjectorParams {
    ProjectorParams {
        n_neighbors: 5,
        n_epochs: Some(60),
        ..ProjectorParams::default()
    }
}

/// Assert DataFrame has expected columns
pub fn assert_has_columns(df: &DataFrame, expected: &[&str]) {
    let columns: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    for col in expected {
        assert!(
            columns.contains(&col.to_string()),
            "Expected column '{}' not found in {:?}",
            col,
            columns
        );
    }
}

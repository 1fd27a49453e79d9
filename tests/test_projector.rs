//! Tests for fitting, persisting and reusing the projector

mod common;

use common::*;
use credit_embed::pipeline::{
    normalize_columns, FeatureEncoder, FeatureMatrix, FittedProjector, PipelineError, Projector,
    Provenance,
};
use tempfile::TempDir;

fn encoded_fixture(rows: usize) -> (FeatureEncoder, FeatureMatrix) {
    let (df, _) = normalize_columns(&create_training_dataframe(rows), Provenance::Training).unwrap();
    FeatureEncoder::fit_transform(&df).unwrap()
}

#[test]
fn test_fit_is_deterministic_for_a_seed() {
    let (_, matrix) = encoded_fixture(40);
    let projector = Projector::new(fast_projector_params());

    let (_, first) = projector.fit_transform(&matrix).unwrap();
    let (_, second) = projector.fit_transform(&matrix).unwrap();

    assert_eq!(first.len(), 40);
    assert_eq!(first, second);
    assert!(first.iter().all(|p| p[0].is_finite() && p[1].is_finite()));
}

#[test]
fn test_different_seeds_give_different_layouts() {
    let (_, matrix) = encoded_fixture(30);
    let mut params = fast_projector_params();
    let (_, a) = Projector::new(params.clone()).fit_transform(&matrix).unwrap();
    params.random_state = 7;
    let (_, b) = Projector::new(params).fit_transform(&matrix).unwrap();

    assert_ne!(a, b);
}

#[test]
fn test_save_and_load_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("projector.json");
    let (encoder, matrix) = encoded_fixture(30);
    let (fitted, _) = Projector::new(fast_projector_params())
        .fit_transform(&matrix)
        .unwrap();

    fitted.save(&path, encoder.feature_names()).unwrap();
    let loaded = FittedProjector::load(&path).unwrap();

    assert_eq!(loaded, fitted);

    let (_, new_rows) = encoded_fixture(5);
    assert_eq!(
        loaded.transform(&new_rows).unwrap(),
        fitted.transform(&new_rows).unwrap()
    );
}

#[test]
fn test_transform_does_not_move_fitted_points() {
    let (_, matrix) = encoded_fixture(30);
    let (fitted, layout) = Projector::new(fast_projector_params())
        .fit_transform(&matrix)
        .unwrap();

    let placed = fitted.transform(&matrix.select_rows(&[0, 3, 7])).unwrap();
    assert_eq!(placed.len(), 3);
    assert_eq!(fitted.embedding(), layout.as_slice());
}

#[test]
fn test_transform_rejects_wrong_width() {
    let (_, matrix) = encoded_fixture(20);
    let (fitted, _) = Projector::new(fast_projector_params())
        .fit_transform(&matrix)
        .unwrap();

    let narrow = FeatureMatrix::new(2, 3, vec![0.0; 6]);
    let err = fitted.transform(&narrow).unwrap_err();
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::DimensionMismatch { expected, actual }) => {
            assert_eq!(*expected, matrix.ncols());
            assert_eq!(*actual, 3);
        }
        other => panic!("expected DimensionMismatch, got {:?}", other),
    }
}

#[test]
fn test_small_fit_set_shrinks_neighbourhood() {
    let (_, matrix) = encoded_fixture(4);
    let (fitted, layout) = Projector::new(fast_projector_params())
        .fit_transform(&matrix)
        .unwrap();

    assert_eq!(layout.len(), 4);
    assert_eq!(fitted.n_features(), matrix.ncols());
}

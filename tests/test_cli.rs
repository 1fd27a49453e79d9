//! Tests for CLI argument parsing and process exit behaviour

mod common;

use std::path::PathBuf;

use assert_cmd::Command;
use clap::Parser;
use credit_embed::cli::{Cli, Commands};
use credit_embed::pipeline::FitScope;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn test_cli_default_values() {
    let cli = Cli::parse_from(["credit-embed", "embed"]);

    assert!(!cli.no_confirm, "Default no_confirm should be false");
    assert_eq!(cli.work_dir, PathBuf::from("."));
    assert_eq!(
        cli.infer_schema_length, 10000,
        "Default schema inference should be 10000"
    );

    match &cli.command {
        Commands::Embed { input, output, embed } => {
            assert!(input.is_none());
            assert!(output.is_none());
            assert_eq!(embed.n_neighbors, 15);
            assert_eq!(embed.min_dist, 0.1);
            assert_eq!(embed.seed, 42);
            assert_eq!(embed.fit_scope, FitScope::Joint);
        }
        other => panic!("expected embed, got {:?}", other),
    }
}

#[test]
fn test_default_paths_follow_work_dir() {
    let cli = Cli::parse_from(["credit-embed", "--work-dir", "/srv/credit", "run"]);
    let Commands::Run {
        sources,
        reconciled,
        output,
        embed,
    } = &cli.command
    else {
        panic!("expected run");
    };

    let config = cli.pipeline_config(sources, reconciled.as_ref(), output.as_ref(), embed);
    assert_eq!(
        config.reconcile.sources.training,
        PathBuf::from("/srv/credit/german_credit_data_with_predictions.csv")
    );
    assert_eq!(config.embed.input, config.reconcile.output);
    assert_eq!(
        config.embed.output,
        PathBuf::from("/srv/credit/german_credit_umap_with_counterfactuals.json")
    );
    assert_eq!(
        config.embed.models.encoder,
        PathBuf::from("/srv/credit/models/encoder.json")
    );
}

#[test]
fn test_embed_options() {
    let cli = Cli::parse_from([
        "credit-embed",
        "embed",
        "--fit-scope",
        "training",
        "--n-neighbors",
        "8",
        "--min-dist",
        "0.3",
        "--seed",
        "7",
        "--model-dir",
        "/tmp/models",
    ]);
    let Commands::Embed { input, output, embed } = &cli.command else {
        panic!("expected embed");
    };

    let config = cli.embed_config(embed, input.as_ref(), output.as_ref());
    assert_eq!(config.fit_scope, FitScope::TrainingOnly);
    assert_eq!(config.projector.n_neighbors, 8);
    assert_eq!(config.projector.min_dist, 0.3);
    assert_eq!(config.projector.random_state, 7);
    assert_eq!(config.models.projector, PathBuf::from("/tmp/models/projector.json"));
}

#[test]
fn test_invalid_embed_options_are_rejected() {
    assert!(Cli::try_parse_from(["credit-embed", "embed", "--n-neighbors", "1"]).is_err());
    assert!(Cli::try_parse_from(["credit-embed", "embed", "--min-dist", "2"]).is_err());
    assert!(Cli::try_parse_from(["credit-embed", "embed", "--fit-scope", "users"]).is_err());
}

#[test]
fn test_map_requires_input() {
    assert!(Cli::try_parse_from(["credit-embed", "map"]).is_err());

    let cli = Cli::parse_from(["credit-embed", "map", "-i", "/data/new.csv"]);
    let Commands::Map {
        input,
        output,
        model_dir,
    } = &cli.command
    else {
        panic!("expected map");
    };
    let config = cli.map_config(input, output.as_ref(), model_dir.as_deref());
    assert_eq!(config.output, PathBuf::from("/data/new_umap.json"));
}

#[test]
fn test_run_with_missing_sources_exits_non_zero() {
    let temp_dir = TempDir::new().unwrap();

    Command::cargo_bin("credit-embed")
        .unwrap()
        .args(["--no-confirm", "--work-dir"])
        .arg(temp_dir.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Missing required input"));

    assert!(!temp_dir.path().join("joint_credit_data.csv").exists());
}

#[test]
fn test_map_without_models_exits_non_zero() {
    let temp_dir = TempDir::new().unwrap();
    let input = common::write_csv(
        temp_dir.path(),
        "new.csv",
        &mut common::create_user_dataframe(),
    );

    Command::cargo_bin("credit-embed")
        .unwrap()
        .args(["--work-dir"])
        .arg(temp_dir.path())
        .args(["map", "-i"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No fitted model found"));
}

#[test]
fn test_run_end_to_end_through_the_binary() {
    let (temp_dir, sources) = common::create_temp_sources(20, 4);

    Command::cargo_bin("credit-embed")
        .unwrap()
        .args(["--no-confirm", "--work-dir"])
        .arg(temp_dir.path())
        .arg("run")
        .arg("--training")
        .arg(&sources.training)
        .arg("--counterfactuals")
        .arg(&sources.counterfactuals)
        .arg("--user")
        .arg(&sources.user)
        .args(["--n-neighbors", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Feature Encoding, Projection & Export"))
        .stdout(predicate::str::contains("Published to"));

    let export = temp_dir
        .path()
        .join("german_credit_umap_with_counterfactuals.json");
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(export).unwrap()).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 25);
    assert!(temp_dir.path().join("models").join("encoder.json").exists());
}

#[test]
fn test_run_with_no_publish_leaves_assets_untouched() {
    let (temp_dir, sources) = common::create_temp_sources(20, 4);

    Command::cargo_bin("credit-embed")
        .unwrap()
        .args(["--no-confirm", "--work-dir"])
        .arg(temp_dir.path())
        .arg("run")
        .arg("--training")
        .arg(&sources.training)
        .arg("--counterfactuals")
        .arg(&sources.counterfactuals)
        .arg("--user")
        .arg(&sources.user)
        .args(["--n-neighbors", "5", "--no-publish"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Published to").not());

    assert!(temp_dir
        .path()
        .join("german_credit_umap_with_counterfactuals.json")
        .exists());
    assert!(!temp_dir.path().join("public").exists());
}

//! Subcommand runners: each stage as a styled, timed step

use std::time::Instant;

use anyhow::Result;

use super::prompts::confirm_overwrite_models;
use crate::pipeline::{
    map_new_records, run_embed, run_reconcile, EmbedConfig, MapConfig, ReconcileConfig,
    Reconciliation,
};
use crate::report::{PublishOutcome, RunSummary};
use crate::utils::progress::{create_spinner, finish_with_success, finish_with_warning};
use crate::utils::styling::{
    print_count, print_info, print_step_header, print_step_time, print_success, print_warning,
};

/// Counts reported by a completed embed step
#[derive(Debug, Clone, Copy)]
pub struct EmbedReport {
    pub encoded_width: usize,
    pub exported_points: usize,
}

/// Reconcile the sources and write the reconciled table
pub fn reconcile_step(step: u8, config: &ReconcileConfig) -> Result<Reconciliation> {
    print_step_header(step, "Schema Reconciliation");
    let start = Instant::now();

    let spinner = create_spinner("Loading and aligning sources...");
    let reconciliation = run_reconcile(config)?;
    finish_with_success(&spinner, "Sources reconciled");

    print_count(
        "column(s) in the canonical schema",
        reconciliation.frame.width(),
        None,
    );
    for warning in &reconciliation.warnings {
        print_warning(&warning.to_string());
    }

    print_success(&format!(
        "Reconciled table written to {}",
        config.output.display()
    ));
    print_step_time(start.elapsed());
    Ok(reconciliation)
}

/// Fit the models on the reconciled table, export and publish the embedding.
///
/// Returns `None` when the user declines to overwrite existing models.
pub fn embed_step(step: u8, config: &EmbedConfig, no_confirm: bool) -> Result<Option<EmbedReport>> {
    if !no_confirm && !confirm_overwrite_models(&config.models)? {
        print_info("Keeping the existing models; nothing was embedded");
        return Ok(None);
    }

    print_step_header(step, "Feature Encoding, Projection & Export");
    let start = Instant::now();

    let spinner = create_spinner(&format!(
        "Fitting encoder and projector ({} scope)...",
        config.fit_scope
    ));
    let outcome = run_embed(config)?;
    if outcome.rows_dropped > 0 {
        finish_with_warning(&spinner, "Models fitted; incomplete rows were skipped");
    } else {
        finish_with_success(&spinner, "Models fitted and saved");
    }

    print_count("row(s) loaded", outcome.rows_loaded, None);
    if outcome.rows_dropped > 0 {
        print_count(
            "row(s) dropped for missing feature values",
            outcome.rows_dropped,
            None,
        );
    }
    print_count(
        "encoded feature column(s)",
        outcome.encoded_width,
        Some(&format!("(fitted on {} row(s))", outcome.fit_rows)),
    );
    print_info(&format!("Models saved to {}", config.models.encoder.display()));
    print_success(&format!(
        "{} point(s) written to {}",
        outcome.points.len(),
        config.output.display()
    ));
    match &outcome.publish {
        Some(PublishOutcome::Published(dest)) => {
            print_success(&format!("Published to {}", dest.display()))
        }
        Some(PublishOutcome::Failed(e)) => {
            print_warning(&format!("Could not publish to the asset directory: {:#}", e))
        }
        None => {}
    }
    print_step_time(start.elapsed());

    Ok(Some(EmbedReport {
        encoded_width: outcome.encoded_width,
        exported_points: outcome.points.len(),
    }))
}

/// Print the row-count table of a run
pub fn print_summary(reconciliation: &Reconciliation, embed: Option<EmbedReport>) {
    let mut summary = RunSummary::new(
        reconciliation.row_counts.clone(),
        reconciliation.warnings.len(),
    );
    if let Some(report) = embed {
        summary.encoded_width = Some(report.encoded_width);
        summary.exported_points = Some(report.exported_points);
    }
    summary.display();
}

/// Place new records with the saved models and write the mapped export
pub fn map_step(step: u8, config: &MapConfig) -> Result<()> {
    print_step_header(step, "Out-of-sample Mapping");
    let start = Instant::now();

    let spinner = create_spinner("Mapping records into the fitted embedding...");
    let outcome = map_new_records(config)?;
    if outcome.rows_dropped > 0 {
        finish_with_warning(&spinner, "Records mapped; incomplete rows were skipped");
    } else {
        finish_with_success(&spinner, "Records mapped");
    }

    for warning in &outcome.warnings {
        print_warning(&warning.to_string());
    }
    print_count("row(s) loaded", outcome.rows_loaded, None);
    if outcome.rows_dropped > 0 {
        print_count(
            "row(s) dropped for missing feature values",
            outcome.rows_dropped,
            None,
        );
    }
    print_success(&format!(
        "{} point(s) written to {}",
        outcome.points.len(),
        config.output.display()
    ));
    print_step_time(start.elapsed());
    Ok(())
}

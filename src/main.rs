//! credit-embed: reconcile credit records and project them into a 2-D map
//!
//! Subcommands run the stages individually (`reconcile`, `embed`, `map`) or
//! back to back (`run`). Any failure stops the run and exits non-zero.

use anyhow::Result;
use clap::Parser;

use credit_embed::cli::commands::{embed_step, map_step, print_summary, reconcile_step};
use credit_embed::cli::{Cli, Commands};
use credit_embed::pipeline::loader::parent_dir;
use credit_embed::utils::styling::{print_banner, print_completion, print_config};

fn main() -> Result<()> {
    let cli = Cli::parse();

    print_banner(env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Reconcile { sources, output } => {
            let config = cli.reconcile_config(sources, output.as_ref());
            print_config(&[
                ("training", config.sources.training.as_path()),
                ("counterfactuals", config.sources.counterfactuals.as_path()),
                ("user", config.sources.user.as_path()),
                ("output", config.output.as_path()),
            ]);

            let reconciliation = reconcile_step(1, &config)?;
            print_summary(&reconciliation, None);
            print_completion("Reconciliation complete!");
        }
        Commands::Embed {
            input,
            output,
            embed,
        } => {
            let config = cli.embed_config(embed, input.as_ref(), output.as_ref());
            print_config(&[
                ("input", config.input.as_path()),
                ("output", config.output.as_path()),
                ("model dir", parent_dir(&config.models.encoder)),
            ]);

            if embed_step(1, &config, cli.no_confirm)?.is_some() {
                print_completion("Embedding complete!");
            }
        }
        Commands::Run {
            sources,
            reconciled,
            output,
            embed,
        } => {
            let config = cli.pipeline_config(sources, reconciled.as_ref(), output.as_ref(), embed);
            print_config(&[
                ("training", config.reconcile.sources.training.as_path()),
                ("counterfactuals", config.reconcile.sources.counterfactuals.as_path()),
                ("user", config.reconcile.sources.user.as_path()),
                ("reconciled", config.reconcile.output.as_path()),
                ("output", config.embed.output.as_path()),
                ("model dir", parent_dir(&config.embed.models.encoder)),
            ]);

            let reconciliation = reconcile_step(1, &config.reconcile)?;
            let report = embed_step(2, &config.embed, cli.no_confirm)?;
            print_summary(&reconciliation, report);
            if report.is_some() {
                print_completion("Pipeline complete!");
            }
        }
        Commands::Map {
            input,
            output,
            model_dir,
        } => {
            let config = cli.map_config(input, output.as_ref(), model_dir.as_deref());
            print_config(&[
                ("input", config.input.as_path()),
                ("output", config.output.as_path()),
                ("model dir", parent_dir(&config.models.encoder)),
            ]);

            map_step(1, &config)?;
            print_completion("Mapping complete!");
        }
    }

    Ok(())
}

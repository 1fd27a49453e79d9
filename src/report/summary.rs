//! Row-count summary printed after reconciliation and export

use comfy_table::{presets::UTF8_FULL_CONDENSED, Attribute, Cell, Color, Table};
use console::style;

use crate::pipeline::reconcile::SourceRowCount;

/// Counts gathered across the stages of one run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub sources: Vec<SourceRowCount>,
    pub schema_warnings: usize,
    /// Width of the encoded feature matrix, once encoded
    pub encoded_width: Option<usize>,
    /// Points written to the export, once exported
    pub exported_points: Option<usize>,
}

impl RunSummary {
    pub fn new(sources: Vec<SourceRowCount>, schema_warnings: usize) -> Self {
        Self {
            sources,
            schema_warnings,
            ..Default::default()
        }
    }

    pub fn total_loaded(&self) -> usize {
        self.sources.iter().map(|s| s.loaded).sum()
    }

    pub fn total_kept(&self) -> usize {
        self.sources.iter().map(|s| s.kept).sum()
    }

    fn render(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL_CONDENSED);
        table.set_header(vec![
            Cell::new("Source").add_attribute(Attribute::Bold),
            Cell::new("Loaded").add_attribute(Attribute::Bold),
            Cell::new("Kept").add_attribute(Attribute::Bold),
            Cell::new("Dropped").add_attribute(Attribute::Bold),
        ]);

        for source in &self.sources {
            let dropped = source.loaded - source.kept;
            table.add_row(vec![
                Cell::new(source.provenance),
                Cell::new(source.loaded),
                Cell::new(source.kept),
                Cell::new(dropped).fg(if dropped == 0 { Color::White } else { Color::Red }),
            ]);
        }

        let dropped = self.total_loaded() - self.total_kept();
        table.add_row(vec![
            Cell::new("Total").add_attribute(Attribute::Bold),
            Cell::new(self.total_loaded()),
            Cell::new(self.total_kept())
                .fg(Color::Green)
                .add_attribute(Attribute::Bold),
            Cell::new(dropped),
        ]);

        table
    }

    pub fn display(&self) {
        println!();
        println!(
            "    {} {}",
            style("📋").cyan(),
            style("RUN SUMMARY").white().bold()
        );
        println!("    {}", style("─".repeat(50)).dim());
        println!();

        for line in self.render().to_string().lines() {
            println!("    {}", line);
        }

        println!();
        if self.schema_warnings > 0 {
            println!(
                "      {} schema alignment warning(s)",
                style(self.schema_warnings).yellow().bold()
            );
        }
        if let Some(width) = self.encoded_width {
            println!("      {} encoded feature columns", style(width).cyan().bold());
        }
        if let Some(points) = self.exported_points {
            println!("      {} points exported", style(points).green().bold());
        }
    }
}

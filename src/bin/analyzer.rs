//! `raw-cell-analyze` — the offline log analyzer binary (§6.7).
//!
//! Reads a simulator event log (plain or gzip), tallies it into
//! [`raw_cell_sim::analyzer::Metrics`], and prints the delivery/delay/
//! collision report. Entirely decoupled from the simulator: the log schema
//! (§6.6) is the only contract between the two binaries.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use raw_cell_sim::analyzer;

/// Batch report generator for `raw-cell-sim` event logs.
#[derive(Parser, Debug)]
#[command(name = "raw-cell-analyze", version, about)]
struct Cli {
    /// Path to the event log to analyze; reads stdin if omitted.
    #[arg(short = 'f', long = "file")]
    file: Option<String>,

    /// Input is gzip-compressed.
    #[arg(short = 'z', long = "zip", default_value_t = false)]
    zip: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    info!(
        "analyzing {}",
        cli.file.as_deref().unwrap_or("<stdin>")
    );

    let reader = analyzer::open_input(cli.file.as_deref(), cli.zip).with_context(|| {
        format!(
            "opening event log {}",
            cli.file.as_deref().unwrap_or("<stdin>")
        )
    })?;
    let metrics = analyzer::analyze(reader);
    print!("{}", analyzer::format_report(&metrics));

    Ok(())
}

//! Field Registry Report
//!
//! Loads a dataset and prints its field rules and mutex pairs as JSON.
//! Allowed metrics are listed per grouping candidate, or for `--group` only.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use cohort_cli::*;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file (or URL, with the `http` feature) holding the rows
    #[arg(short, long)]
    data: String,

    /// Engine config overrides
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only list the metrics allowed for this grouping field
    #[arg(short, long)]
    group: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let args = Args::parse();

    let dataset = load_dataset(&args.data, args.config.as_deref()).await?;
    let report = match &args.group {
        Some(group) => FieldReport::for_groups(&dataset, &[group.as_str()]),
        None => FieldReport::new(&dataset),
    };
    write_json(&report)
}

//! Dashboard Render
//!
//! Renders every chart of a saved dashboard against a dataset and prints
//! the outcomes in order. Rejected charts are reported inline and do not
//! stop the rest.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use cohort_cli::*;
use cohort_guard::dashboard::DashboardConfig;
use serde_json::json;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file (or URL, with the `http` feature) holding the rows
    #[arg(short, long)]
    data: String,

    /// Saved dashboard layout
    #[arg(short = 'b', long)]
    dashboard: PathBuf,

    /// Engine config overrides
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let args = Args::parse();

    let dashboard = DashboardConfig::load(&args.dashboard)
        .await
        .with_context(|| format!("loading dashboard {}", args.dashboard.display()))?;
    let dataset = load_dataset(&args.data, args.config.as_deref()).await?;

    let outcomes = dashboard.render_all(&dataset);
    let rendered = outcomes.iter().filter(|o| o.is_rendered()).count();
    info!(
        charts = outcomes.len(),
        rendered,
        rejected = outcomes.len() - rendered,
        "Rendered dashboard"
    );

    let cards: Vec<_> = dashboard
        .charts
        .iter()
        .zip(&outcomes)
        .map(|(spec, outcome)| json!({"title": spec.title, "outcome": outcome}))
        .collect();
    write_json(&cards)
}

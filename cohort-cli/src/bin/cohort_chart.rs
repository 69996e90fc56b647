//! Single Chart
//!
//! Guards and renders one chart selection against a dataset. Prints the
//! chart data and summary on success; on rejection prints the guard outcome
//! and exits with status 2.

use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, Result};
use clap::Parser;
use cohort_cli::*;
use cohort_guard::aggregation::{FieldFilter, MetricFilter};
use cohort_guard::guard::{ChartType, Selection};
use cohort_guard::metrics::Metric;
use cohort_guard::RenderOutcome;
use tracing::warn;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file (or URL, with the `http` feature) holding the rows
    #[arg(short, long)]
    data: String,

    /// Engine config overrides
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// bar, line, pie or doughnut
    #[arg(short = 't', long = "type", default_value = "bar")]
    chart_type: ChartType,

    /// Grouping field key
    #[arg(short, long)]
    group: String,

    /// Metric key, e.g. __count__ or __avg__age__
    #[arg(short, long, default_value = "__count__")]
    metric: String,

    /// Row filter as field=value; repeatable
    #[arg(short, long = "filter")]
    filters: Vec<FieldFilter>,

    /// Group filter as metric<op>threshold, e.g. __count__>=10; repeatable
    #[arg(long = "where", value_parser = metric_filter)]
    metric_filters: Vec<MetricFilter>,

    /// Print only the narrative summary
    #[arg(long)]
    text: bool,
}

fn metric_filter(input: &str) -> Result<MetricFilter, String> {
    parse_metric_filter(input).map_err(|e| format!("{e:#}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let args = Args::parse();

    let metric = Metric::parse(&args.metric)
        .ok_or_else(|| anyhow!("metric key must not be empty"))?;
    let selection = Selection {
        chart_type: args.chart_type,
        group_field: Some(args.group),
        metric: Some(metric),
        filters: args.filters,
        metric_filters: args.metric_filters,
    };

    let dataset = load_dataset(&args.data, args.config.as_deref()).await?;
    match dataset.render(&selection) {
        RenderOutcome::Rendered(chart) if args.text => {
            print!("{}", chart.narrative);
            Ok(())
        }
        RenderOutcome::Rendered(chart) => write_json(&chart),
        RenderOutcome::Rejected(outcome) => {
            warn!(reason = ?outcome.reason, "Chart rejected");
            write_json(&outcome)?;
            process::exit(2);
        }
    }
}

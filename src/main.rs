use anyhow::{Context, Result};
use chrono::Utc;
use log::{info, warn};
use serde_json::json;
use std::path::PathBuf;

use insight_dashboard::client::HttpDashboardApi;
use insight_dashboard::config::AppConfig;
use insight_dashboard::coordinator::FetchCoordinator;
use insight_dashboard::env_loader;
use insight_dashboard::filters::PredicateSet;
use insight_dashboard::render::{render_dashboard, ChartDimensions};

const DEFAULT_OUTPUT: &str = "dashboard_snapshot.json";

/// Usage: dashboard-snapshot [--out FILE] [field=value ...]
#[tokio::main]
async fn main() -> Result<()> {
    env_loader::load_env();
    env_logger::init();

    let (output_path, filters) = parse_args(std::env::args().skip(1))?;
    let config = AppConfig::from_env();
    info!("Fetching dashboard snapshot from {} for {:?}", config.api_url, filters);

    let api = HttpDashboardApi::new(config.api_url.clone(), config.request_timeout)
        .context("Failed to build HTTP client")?;
    let coordinator = FetchCoordinator::new(api);

    coordinator.init().await;
    if !filters.is_empty() {
        coordinator.apply_filters(filters).await;
    }
    coordinator.settle().await;

    let state = coordinator.snapshot().await;
    coordinator.shutdown().await;
    for message in &state.notifications {
        warn!("{}", message);
    }

    let view = render_dashboard(&state, &ChartDimensions::default());
    let document = json!({
        "generated_at": Utc::now().to_rfc3339(),
        "filter_options": state.filter_options.data,
        "view": view,
    });
    let body = serde_json::to_vec_pretty(&document).context("Failed to serialize snapshot")?;
    tokio::fs::write(&output_path, body)
        .await
        .with_context(|| format!("Failed to write snapshot to {:?}", output_path))?;

    info!("Snapshot written to {:?}", output_path);
    if let Some(metrics) = &view.metrics {
        println!(
            "records: {}  avg intensity: {}  avg likelihood: {}  avg relevance: {}",
            metrics.total_records, metrics.avg_intensity, metrics.avg_likelihood, metrics.avg_relevance
        );
    }
    if !view.errors.is_empty() {
        println!("{} of the dashboard's views failed to load, see log for details", view.errors.len());
    }
    Ok(())
}

fn parse_args<I: Iterator<Item = String>>(mut args: I) -> Result<(PathBuf, PredicateSet)> {
    let mut output = PathBuf::from(DEFAULT_OUTPUT);
    let mut pairs = Vec::new();
    while let Some(arg) = args.next() {
        if arg == "--out" {
            output = PathBuf::from(args.next().context("--out needs a file path")?);
        } else if let Some((key, value)) = arg.split_once('=') {
            pairs.push((key.to_string(), value.to_string()));
        } else {
            anyhow::bail!("Unexpected argument '{}', expected field=value", arg);
        }
    }
    let filters = PredicateSet::from_pairs(pairs)?;
    Ok((output, filters))
}

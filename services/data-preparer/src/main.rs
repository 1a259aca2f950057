use anyhow::{Context, Result};
use tracing::info;
use admission_core::{init_tracing, load_config};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = load_config().context("loading configuration")?;
    init_tracing("data-preparer", &cfg.log_level)?;
    info!(target: "data-preparer", data = ?cfg.data, "Starting data-preparer");

    let report = data_preparer::prepare(&cfg.data)
        .await
        .with_context(|| format!("preparing dataset from {}", cfg.data.url))?;
    info!(target: "data-preparer", downloaded = report.downloaded, features = ?report.feature_columns, "done");
    Ok(())
}

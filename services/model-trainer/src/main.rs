use anyhow::{Context, Result};
use tracing::info;
use admission_core::{init_tracing, load_config};

fn main() -> Result<()> {
    let cfg = load_config().context("loading configuration")?;
    init_tracing("model-trainer", &cfg.log_level)?;
    info!(target: "model-trainer", processed = %cfg.data.processed_dir.display(), "Starting model-trainer");

    let report = model_trainer::train(&cfg).context("training admission model (has data-preparer run?)")?;
    info!(
        target: "model-trainer",
        mse = report.evaluation.mse,
        r2 = report.evaluation.r2,
        tag = %report.version.tag,
        "training complete"
    );
    Ok(())
}

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};
use admission_core::{init_tracing, load_config, set_status};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = load_config().context("loading configuration")?;
    init_tracing("prediction-service", &cfg.log_level)?;
    info!(target: "prediction-service", auth = ?cfg.auth, "Starting prediction-service");
    if cfg.auth.uses_development_secret() {
        warn!(target: "prediction-service", "using the built-in signing secret; set ADMISSION__AUTH__SECRET");
    }

    let (version, state) = prediction_service::load_state(&cfg)
        .with_context(|| format!("loading '{}' from {} (has model-trainer run?)", cfg.model.name, cfg.model.store_dir.display()))?;
    set_status("model", version.tag.clone());

    let listener = TcpListener::bind(&cfg.server.listen_addr)
        .await
        .with_context(|| format!("binding {}", cfg.server.listen_addr))?;
    prediction_service::serve(listener, state, async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = ?e, "ctrl-c handler failed");
        }
    })
    .await?;

    info!(target: "prediction-service", "shutdown");
    Ok(())
}

//! Core shared utilities for the admission prediction pipeline.

use anyhow::Result;
use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static TRACING_INIT: OnceCell<()> = OnceCell::new();
static NODE_LIVENESS: AtomicBool = AtomicBool::new(true);
static NODE_READINESS: AtomicBool = AtomicBool::new(false);
static STATUS_DETAILS: Lazy<RwLock<Map<String, Value>>> = Lazy::new(|| RwLock::new(Map::new()));

pub fn mark_ready() { NODE_READINESS.store(true, Ordering::SeqCst); }
pub fn clear_ready() { NODE_READINESS.store(false, Ordering::SeqCst); }
pub fn mark_not_live() { NODE_LIVENESS.store(false, Ordering::SeqCst); }
pub fn is_ready() -> bool { NODE_READINESS.load(Ordering::SeqCst) }
pub fn is_live() -> bool { NODE_LIVENESS.load(Ordering::SeqCst) }

/// Publishes a key on the `/status` document (e.g. the serving model tag).
pub fn set_status(key: &str, value: impl Into<Value>) {
    STATUS_DETAILS.write().insert(key.to_string(), value.into());
}

/// Installs the global subscriber. `RUST_LOG` wins over `default_level`;
/// `ADMISSION_JSON_LOG=1|true` switches to flattened JSON lines.
pub fn init_tracing(service: &str, default_level: &str) -> Result<()> {
    TRACING_INIT.get_or_try_init(|| -> Result<()> {
        let json = std::env::var("ADMISSION_JSON_LOG").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        let registry = tracing_subscriber::registry().with(env_filter);
        if json {
            registry
                .with(tracing_subscriber::fmt::layer().json().flatten_event(true).with_current_span(true).with_span_list(false))
                .try_init()?;
        } else {
            registry
                .with(tracing_subscriber::fmt::layer().with_target(true).with_thread_ids(false).with_line_number(true))
                .try_init()?;
        }
        Ok(())
    })?;
    info!(target: "admission", service, "tracing initialized");
    Ok(())
}

/// Liveness, readiness, status and metrics routes, merged into a service router.
pub fn health_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/live", get(|| async { Json(serde_json::json!({"live": is_live()})) }))
        .route("/ready", get(|| async {
            let ready = is_ready();
            let code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
            (code, Json(serde_json::json!({"ready": ready})))
        }))
        .route("/status", get(|| async {
            let mut doc = STATUS_DETAILS.read().clone();
            doc.insert("live".into(), is_live().into());
            doc.insert("ready".into(), is_ready().into());
            Json(Value::Object(doc))
        }))
        .route("/metrics", get(metrics_handler))
}

async fn metrics_handler() -> axum::response::Response {
    match telemetry::encode_metrics() {
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized").into_response(),
        Some(Err(e)) => (StatusCode::INTERNAL_SERVER_ERROR, format!("encode error: {e}")).into_response(),
        Some(Ok((content_type, body))) => ([(header::CONTENT_TYPE, content_type)], body).into_response(),
    }
}

pub mod dataset;
pub mod lifecycle;
pub mod metrics;
pub mod model_registry;
pub mod regression;
pub mod settings;
pub mod telemetry;

pub use dataset::{train_test_split, DatasetError, Frame, Split};
pub use lifecycle::{LifecycleError, RequestLifecycle, RequestPhase};
pub use metrics::{evaluate, mean_squared_error, r2_score, Evaluation, MetricsError};
pub use model_registry::{ModelRegistry, ModelVersion, RegistryError};
pub use regression::{LinearModel, RegressionError};
pub use settings::{load_config, load_config_with, AppConfig, AuthConfig, DataConfig, ModelConfig, ServerConfig, UserCredential};
pub use telemetry::{init_metrics, observe_inference, prediction_metrics, record_login, record_predict, PredictionMetrics};

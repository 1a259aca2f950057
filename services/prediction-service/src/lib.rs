//! Authenticated HTTP front end for the latest registered admission model.

use std::future::Future;
use std::sync::Arc;

use admission_core::{
    clear_ready, health_router, init_metrics, mark_not_live, mark_ready, AppConfig, AuthConfig, LinearModel, ModelRegistry, ModelVersion, RegistryError,
};
use axum::{routing::post, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::info;

pub mod auth;
pub mod error;
pub mod handlers;

pub use auth::{token_ttl, AuthError, Claims, CredentialStore, TokenIssuer, MAX_TOKEN_TTL_MINUTES, TOKEN_TYPE};
pub use error::ServiceError;
pub use handlers::{AdmissionInput, LoginResponse, PredictResponse};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("loading model: {0}")]
    Registry(#[from] RegistryError),
    #[error("model expects {found} features, the predict payload carries {expected}")]
    ModelWidth { expected: usize, found: usize },
    #[error("token lifetime must be 1..={} minutes, got {0}", MAX_TOKEN_TTL_MINUTES)]
    InvalidTokenTtl(i64),
    #[error("no users configured")]
    NoUsers,
}

/// Immutable after startup; cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<LinearModel>,
    pub credentials: Arc<CredentialStore>,
    pub tokens: Arc<TokenIssuer>,
}

impl AppState {
    pub fn new(model: LinearModel, auth: &AuthConfig) -> Result<Self, StartupError> {
        if model.n_features() != AdmissionInput::FEATURE_COUNT {
            return Err(StartupError::ModelWidth { expected: AdmissionInput::FEATURE_COUNT, found: model.n_features() });
        }
        let ttl = token_ttl(auth.token_ttl_minutes).ok_or(StartupError::InvalidTokenTtl(auth.token_ttl_minutes))?;
        if auth.users.is_empty() {
            return Err(StartupError::NoUsers);
        }
        Ok(Self {
            model: Arc::new(model),
            credentials: Arc::new(CredentialStore::from_users(&auth.users)),
            tokens: Arc::new(TokenIssuer::new(auth.secret.as_bytes(), ttl)),
        })
    }
}

/// Loads the latest model version named in `cfg` and builds the request state.
pub fn load_state(cfg: &AppConfig) -> Result<(ModelVersion, AppState), StartupError> {
    let registry = ModelRegistry::new(&cfg.model.store_dir);
    let (version, model) = registry.load_latest(&cfg.model.name)?;
    info!(tag = %version.tag, hash = %version.hash, "model loaded");
    let state = AppState::new(model, &cfg.auth)?;
    Ok((version, state))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/login", post(handlers::login))
        .route("/predict", post(handlers::predict))
        .merge(health_router::<AppState>())
        .with_state(state)
}

/// Serves until `shutdown` resolves. Readiness is reported only while the
/// listener is accepting; liveness is dropped once serving ends.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    init_metrics()?;
    info!(addr = ?listener.local_addr()?, "prediction service listening");
    mark_ready();
    let result = axum::serve(listener, router(state)).with_graceful_shutdown(shutdown).await;
    clear_ready();
    mark_not_live();
    result?;
    Ok(())
}

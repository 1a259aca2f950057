//! HTTP request handlers

use std::time::Instant;

use admission_core::{observe_inference, record_login, record_predict, RequestLifecycle, RequestPhase};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::auth::{bearer_token, AuthError, TOKEN_TYPE};
use crate::error::ServiceError;
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
}

/// Prediction payload. Field names are the public wire names; values are
/// type-checked but not range-checked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct AdmissionInput {
    #[serde(rename = "GRE_Score")]
    pub gre_score: i64,
    #[serde(rename = "TOEFL_Score")]
    pub toefl_score: i64,
    #[serde(rename = "University_Rating")]
    pub university_rating: i64,
    #[serde(rename = "SOP")]
    pub sop: f64,
    #[serde(rename = "LOR")]
    pub lor: f64,
    #[serde(rename = "CGPA")]
    pub cgpa: f64,
    #[serde(rename = "Research")]
    pub research: i64,
}

impl AdmissionInput {
    pub const FEATURE_COUNT: usize = 7;

    /// Model input order: GRE, TOEFL, rating, SOP, LOR, CGPA, research.
    pub fn to_features(&self) -> [f64; Self::FEATURE_COUNT] {
        [
            self.gre_score as f64,
            self.toefl_score as f64,
            self.university_rating as f64,
            self.sop,
            self.lor,
            self.cgpa,
            self.research as f64,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub username: String,
    #[serde(rename = "Chance of Admit")]
    pub chance_of_admit: f64,
}

fn invalid_input(rejection: JsonRejection) -> ServiceError {
    ServiceError::InvalidInput(rejection.body_text())
}

/// `POST /login` — body is an arbitrary JSON object; only string
/// `username`/`password` entries are considered.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<LoginResponse>, ServiceError> {
    let Json(form) = payload.map_err(invalid_input)?;
    let username = form.get("username").and_then(Value::as_str);
    let password = form.get("password").and_then(Value::as_str);
    let (Some(username), Some(password)) = (username, password) else {
        warn!("login rejected: credentials missing");
        record_login(false);
        return Err(AuthError::InvalidCredentials.into());
    };

    if let Err(e) = state.credentials.authenticate(username, password) {
        warn!(username, "login rejected");
        record_login(false);
        return Err(e.into());
    }
    let access_token = state.tokens.issue(username)?;
    record_login(true);
    info!(username, ttl_minutes = state.tokens.ttl().num_minutes(), "token issued");
    Ok(Json(LoginResponse { access_token, token_type: TOKEN_TYPE.to_string() }))
}

/// `POST /predict` — bearer token first, then payload, then inference.
#[instrument(skip_all)]
pub async fn predict(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<AdmissionInput>, JsonRejection>,
) -> Result<Json<PredictResponse>, ServiceError> {
    let mut lifecycle = RequestLifecycle::new();
    let outcome = authorize_and_predict(&state, &headers, payload, &mut lifecycle).await;
    match &outcome {
        Ok(Json(resp)) => {
            record_predict("served");
            debug!(
                username = %resp.username,
                elapsed_us = lifecycle.elapsed().as_micros() as u64,
                phases = ?lifecycle.durations(),
                "prediction served"
            );
        }
        Err(err) => {
            let at = lifecycle.phase();
            record_predict(at.as_str());
            lifecycle.reject(err.to_string())?;
            warn!(phase = ?at, reason = %err, "prediction rejected");
        }
    }
    outcome
}

async fn authorize_and_predict(
    state: &AppState,
    headers: &HeaderMap,
    payload: Result<Json<AdmissionInput>, JsonRejection>,
    lifecycle: &mut RequestLifecycle,
) -> Result<Json<PredictResponse>, ServiceError> {
    let token = bearer_token(headers)?;
    lifecycle.advance(RequestPhase::TokenPresented)?;
    let claims = state.tokens.verify(token)?;
    lifecycle.advance(RequestPhase::TokenVerified)?;

    let Json(input) = payload.map_err(invalid_input)?;
    let features = input.to_features();
    let model = state.model.clone();
    let chance_of_admit = tokio::task::spawn_blocking(move || {
        let started = Instant::now();
        let out = model.predict_one(&features);
        observe_inference(started.elapsed().as_secs_f64());
        out
    })
    .await
    .map_err(|e| ServiceError::Inference(e.to_string()))?
    .map_err(|e| ServiceError::Inference(e.to_string()))?;
    lifecycle.advance(RequestPhase::Predicted)?;

    Ok(Json(PredictResponse { username: claims.sub, chance_of_admit }))
}

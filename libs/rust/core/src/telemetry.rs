//! Prometheus counters for the prediction service, scraped from `/metrics`.
//!
//! Metrics live in the process-wide default registry. Recording before
//! `init_metrics` is a no-op.

use anyhow::Result;
use once_cell::sync::OnceCell;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, TextEncoder};

#[derive(Clone, Debug)]
pub struct PredictionMetrics {
    /// `outcome` = `accepted` | `rejected`.
    pub login_total: IntCounterVec,
    /// `outcome` = `served` or the phase the request was rejected in.
    pub predict_total: IntCounterVec,
    pub inference_latency_seconds: Histogram,
}

static PREDICTION_METRICS: OnceCell<PredictionMetrics> = OnceCell::new();

pub fn init_metrics() -> Result<()> {
    PREDICTION_METRICS.get_or_try_init(|| -> Result<PredictionMetrics> {
        let login_total = IntCounterVec::new(
            Opts::new("admission_login_total", "Login attempts by outcome"),
            &["outcome"],
        )?;
        let predict_total = IntCounterVec::new(
            Opts::new("admission_predict_total", "Predict requests by outcome or rejecting phase"),
            &["outcome"],
        )?;
        let inference_latency_seconds = Histogram::with_opts(
            HistogramOpts::new("admission_inference_latency_seconds", "Model inference latency")
                .buckets(vec![0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05]),
        )?;
        let registry = prometheus::default_registry();
        registry.register(Box::new(login_total.clone()))?;
        registry.register(Box::new(predict_total.clone()))?;
        registry.register(Box::new(inference_latency_seconds.clone()))?;
        Ok(PredictionMetrics { login_total, predict_total, inference_latency_seconds })
    })?;
    Ok(())
}

pub fn prediction_metrics() -> Option<&'static PredictionMetrics> { PREDICTION_METRICS.get() }

pub fn record_login(accepted: bool) {
    if let Some(m) = prediction_metrics() {
        m.login_total.with_label_values(&[if accepted { "accepted" } else { "rejected" }]).inc();
    }
}

pub fn record_predict(outcome: &str) {
    if let Some(m) = prediction_metrics() {
        m.predict_total.with_label_values(&[outcome]).inc();
    }
}

pub fn observe_inference(seconds: f64) {
    if let Some(m) = prediction_metrics() {
        m.inference_latency_seconds.observe(seconds);
    }
}

/// Text exposition of the default registry; `None` until `init_metrics` ran.
pub fn encode_metrics() -> Option<Result<(String, Vec<u8>)>> {
    prediction_metrics()?;
    let encoder = TextEncoder::new();
    let mut buf = Vec::new();
    Some(
        encoder
            .encode(&prometheus::default_registry().gather(), &mut buf)
            .map(|_| (encoder.format_type().to_string(), buf))
            .map_err(Into::into),
    )
}

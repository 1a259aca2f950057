//! Regression evaluation metrics.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MetricsError {
    #[error("cannot evaluate on an empty set")]
    Empty,
    #[error("length mismatch: {truth} targets vs {predicted} predictions")]
    LengthMismatch { truth: usize, predicted: usize },
}

/// Held-out scores recorded alongside a saved model version.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub mse: f64,
    pub r2: f64,
}

fn check(y_true: &ArrayView1<f64>, y_pred: &ArrayView1<f64>) -> Result<(), MetricsError> {
    if y_true.len() != y_pred.len() {
        return Err(MetricsError::LengthMismatch { truth: y_true.len(), predicted: y_pred.len() });
    }
    if y_true.is_empty() { return Err(MetricsError::Empty); }
    Ok(())
}

pub fn mean_squared_error(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64, MetricsError> {
    check(&y_true, &y_pred)?;
    let sse: f64 = y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).powi(2)).sum();
    Ok(sse / y_true.len() as f64)
}

/// Coefficient of determination. A constant target (zero total variance)
/// scores 0.0.
pub fn r2_score(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<f64, MetricsError> {
    check(&y_true, &y_pred)?;
    let mean = y_true.sum() / y_true.len() as f64;
    let ss_res: f64 = y_true.iter().zip(y_pred.iter()).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 { return Ok(0.0); }
    Ok(1.0 - ss_res / ss_tot)
}

pub fn evaluate(y_true: ArrayView1<f64>, y_pred: ArrayView1<f64>) -> Result<Evaluation, MetricsError> {
    Ok(Evaluation { mse: mean_squared_error(y_true, y_pred)?, r2: r2_score(y_true, y_pred)? })
}

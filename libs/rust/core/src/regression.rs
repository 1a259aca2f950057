//! Ordinary least squares linear regression.
//!
//! Fitting centres the features and target, solves the normal equations
//! `(XcᵀXc) β = Xcᵀyc` by Gaussian elimination with partial pivoting and
//! recovers the intercept from the means.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RegressionError {
    #[error("cannot fit on an empty training set")]
    Empty,
    #[error("expected {expected} features, got {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("row count mismatch: {features} feature rows vs {targets} targets")]
    RowMismatch { features: usize, targets: usize },
    #[error("normal equations are singular (collinear or too few rows)")]
    Singular,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub feature_names: Vec<String>,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    pub fn fit(x: ArrayView2<f64>, y: ArrayView1<f64>, feature_names: Vec<String>) -> Result<Self, RegressionError> {
        let (n, p) = x.dim();
        if n == 0 { return Err(RegressionError::Empty); }
        if y.len() != n { return Err(RegressionError::RowMismatch { features: n, targets: y.len() }); }
        if feature_names.len() != p { return Err(RegressionError::DimensionMismatch { expected: p, found: feature_names.len() }); }

        let x_mean = x.mean_axis(Axis(0)).ok_or(RegressionError::Empty)?;
        let y_mean = y.mean().ok_or(RegressionError::Empty)?;
        let xc = &x - &x_mean;
        let yc = &y - y_mean;

        let gram = xc.t().dot(&xc);
        let moment = xc.t().dot(&yc);
        let coef = solve(gram, moment)?;
        let intercept = y_mean - coef.dot(&x_mean);

        Ok(Self { feature_names, coefficients: coef.to_vec(), intercept })
    }

    pub fn n_features(&self) -> usize { self.coefficients.len() }

    pub fn predict_one(&self, features: &[f64]) -> Result<f64, RegressionError> {
        if features.len() != self.n_features() {
            return Err(RegressionError::DimensionMismatch { expected: self.n_features(), found: features.len() });
        }
        Ok(self.intercept + self.coefficients.iter().zip(features).map(|(c, v)| c * v).sum::<f64>())
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>, RegressionError> {
        if x.ncols() != self.n_features() {
            return Err(RegressionError::DimensionMismatch { expected: self.n_features(), found: x.ncols() });
        }
        let coef = ArrayView1::from(&self.coefficients[..]);
        Ok(x.dot(&coef) + self.intercept)
    }
}

fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Result<Array1<f64>, RegressionError> {
    let n = b.len();
    let scale = a.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let tol = f64::EPSILON * scale.max(1.0) * n.max(1) as f64;

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .ok_or(RegressionError::Singular)?;
        if a[[pivot, col]].abs() <= tol {
            return Err(RegressionError::Singular);
        }
        if pivot != col {
            for k in 0..n { a.swap([pivot, k], [col, k]); }
            b.swap(pivot, col);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 { continue; }
            for k in col..n { a[[row, k]] -= factor * a[[col, k]]; }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Ok(x)
}

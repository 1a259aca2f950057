//! Dataset preparation stage: fetch the raw admissions CSV once, drop the
//! identifier column and write the seeded train/test split.

use std::path::{Path, PathBuf};

use admission_core::{train_test_split, DataConfig, DatasetError, Frame};
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("failed to download {url}: HTTP status {status}")]
    Transfer { url: String, status: reqwest::StatusCode },
    #[error("request to {url} failed: {source}")]
    Http { url: String, #[source] source: reqwest::Error },
    #[error("i/o error on {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrepareReport {
    pub downloaded: bool,
    pub raw_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub feature_columns: Vec<String>,
}

/// Downloads `url` to `path` unless the file is already there. A cached file
/// is reused as-is. Returns whether a download happened.
#[instrument(skip_all, fields(url = %url, path = %path.display()))]
pub async fn ensure_raw_data(url: &str, path: &Path) -> Result<bool, PrepareError> {
    if tokio::fs::try_exists(path).await.map_err(|source| PrepareError::Io { path: path.to_path_buf(), source })? {
        info!("raw dataset cached, skipping download");
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|source| PrepareError::Io { path: parent.to_path_buf(), source })?;
    }

    info!("downloading dataset");
    let http_err = |source| PrepareError::Http { url: url.to_string(), source };
    let resp = reqwest::get(url).await.map_err(http_err)?;
    let status = resp.status();
    if !status.is_success() {
        warn!(%status, "dataset download rejected");
        return Err(PrepareError::Transfer { url: url.to_string(), status });
    }
    let body = resp.bytes().await.map_err(http_err)?;

    // Partial transfers must never land at `path`: it is trusted as a cache.
    let partial = path.with_extension("partial");
    tokio::fs::write(&partial, &body).await.map_err(|source| PrepareError::Io { path: partial.clone(), source })?;
    tokio::fs::rename(&partial, path).await.map_err(|source| PrepareError::Io { path: path.to_path_buf(), source })?;
    info!(bytes = body.len(), "dataset downloaded");
    Ok(true)
}

/// Runs the whole stage. Split files in `processed_dir` are overwritten.
pub async fn prepare(cfg: &DataConfig) -> Result<PrepareReport, PrepareError> {
    let downloaded = ensure_raw_data(&cfg.url, &cfg.raw_path).await?;

    let mut frame = Frame::read_csv(&cfg.raw_path)?;
    let raw_rows = frame.len();
    if !frame.drop_column(&cfg.id_column) {
        info!(column = %cfg.id_column, "identifier column absent, nothing to drop");
    }
    let targets = frame.take_column(&cfg.target_column)?;
    let split = train_test_split(&frame, &targets, cfg.test_ratio, cfg.seed)?;
    split.write_to(&cfg.processed_dir)?;

    let report = PrepareReport {
        downloaded,
        raw_rows,
        train_rows: split.x_train.len(),
        test_rows: split.x_test.len(),
        feature_columns: frame.headers().to_vec(),
    };
    info!(
        raw_rows = report.raw_rows,
        train_rows = report.train_rows,
        test_rows = report.test_rows,
        out = %cfg.processed_dir.display(),
        "data preparation complete"
    );
    Ok(report)
}

//! Tabular dataset handling: CSV load/store, column surgery and the seeded
//! train/test split shared by the preparer and the trainer.

use std::path::{Path, PathBuf};

use ndarray::{Array1, Array2};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use thiserror::Error;
use tracing::debug;

pub const X_TRAIN_FILE: &str = "X_train.csv";
pub const X_TEST_FILE: &str = "X_test.csv";
pub const Y_TRAIN_FILE: &str = "y_train.csv";
pub const Y_TEST_FILE: &str = "y_test.csv";

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("i/o error on {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("csv error in {path}: {source}")]
    Csv { path: PathBuf, #[source] source: csv::Error },
    #[error("{path}:{line}: column '{column}' is not numeric: {value:?}")]
    Parse { path: PathBuf, line: u64, column: String, value: String },
    #[error("row {row} has {found} values, expected {expected}")]
    Ragged { row: usize, expected: usize, found: usize },
    #[error("column '{0}' not found")]
    MissingColumn(String),
    #[error("row count mismatch: {features} feature rows vs {targets} target rows")]
    RowMismatch { features: usize, targets: usize },
    #[error("invalid test ratio {0}, expected 0 < ratio < 1")]
    InvalidRatio(f64),
    #[error("dataset has {rows} rows, too few for a train/test split")]
    TooFewRows { rows: usize },
}

/// Numeric table with named columns. Every row has `headers.len()` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    headers: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl Frame {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self, DatasetError> {
        if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != headers.len()) {
            return Err(DatasetError::Ragged { row, expected: headers.len(), found: r.len() });
        }
        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] { &self.headers }
    pub fn rows(&self) -> &[Vec<f64>] { &self.rows }
    pub fn len(&self) -> usize { self.rows.len() }
    pub fn is_empty(&self) -> bool { self.rows.is_empty() }
    pub fn width(&self) -> usize { self.headers.len() }

    /// Exact header match first, then a whitespace-insensitive one
    /// (source files carry headers such as `"LOR "`).
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .or_else(|| self.headers.iter().position(|h| h.trim() == name.trim()))
    }

    /// Removes a column if present. Returns whether anything was removed.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(idx) = self.column_index(name) else { return false };
        self.headers.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
        true
    }

    /// Removes a column and returns it as a single-column frame.
    pub fn take_column(&mut self, name: &str) -> Result<Frame, DatasetError> {
        let idx = self.column_index(name).ok_or_else(|| DatasetError::MissingColumn(name.to_string()))?;
        let header = self.headers.remove(idx);
        let values = self.rows.iter_mut().map(|row| vec![row.remove(idx)]).collect();
        Ok(Frame { headers: vec![header], rows: values })
    }

    pub fn select_rows(&self, indices: &[usize]) -> Frame {
        Frame {
            headers: self.headers.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    pub fn to_array(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.len(), self.width()), |(i, j)| self.rows[i][j])
    }

    /// First column as a vector; used for single-column target frames.
    pub fn first_column(&self) -> Array1<f64> {
        self.rows.iter().map(|r| r.first().copied().unwrap_or(f64::NAN)).collect()
    }

    pub fn read_csv(path: &Path) -> Result<Frame, DatasetError> {
        let file = std::fs::File::open(path).map_err(|source| DatasetError::Io { path: path.to_path_buf(), source })?;
        let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
        let csv_err = |source| DatasetError::Csv { path: path.to_path_buf(), source };
        let headers: Vec<String> = reader.headers().map_err(csv_err)?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let mut row = Vec::with_capacity(headers.len());
            for (cell, column) in record.iter().zip(&headers) {
                let value = cell.trim().parse::<f64>().map_err(|_| DatasetError::Parse {
                    path: path.to_path_buf(),
                    line,
                    column: column.clone(),
                    value: cell.to_string(),
                })?;
                row.push(value);
            }
            rows.push(row);
        }
        debug!(path = %path.display(), rows = rows.len(), columns = headers.len(), "csv loaded");
        Frame::new(headers, rows)
    }

    /// Writes the frame with its header row, overwriting `path`.
    pub fn write_csv(&self, path: &Path) -> Result<(), DatasetError> {
        let csv_err = |source| DatasetError::Csv { path: path.to_path_buf(), source };
        let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
        writer.write_record(&self.headers).map_err(csv_err)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|v| v.to_string())).map_err(csv_err)?;
        }
        writer.flush().map_err(|source| DatasetError::Io { path: path.to_path_buf(), source })
    }
}

/// The four artifacts handed from the preparer to the trainer.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub x_train: Frame,
    pub x_test: Frame,
    pub y_train: Frame,
    pub y_test: Frame,
}

impl Split {
    pub fn write_to(&self, dir: &Path) -> Result<(), DatasetError> {
        std::fs::create_dir_all(dir).map_err(|source| DatasetError::Io { path: dir.to_path_buf(), source })?;
        self.x_train.write_csv(&dir.join(X_TRAIN_FILE))?;
        self.x_test.write_csv(&dir.join(X_TEST_FILE))?;
        self.y_train.write_csv(&dir.join(Y_TRAIN_FILE))?;
        self.y_test.write_csv(&dir.join(Y_TEST_FILE))?;
        Ok(())
    }

    pub fn read_from(dir: &Path) -> Result<Split, DatasetError> {
        let split = Split {
            x_train: Frame::read_csv(&dir.join(X_TRAIN_FILE))?,
            x_test: Frame::read_csv(&dir.join(X_TEST_FILE))?,
            y_train: Frame::read_csv(&dir.join(Y_TRAIN_FILE))?,
            y_test: Frame::read_csv(&dir.join(Y_TEST_FILE))?,
        };
        check_rows(&split.x_train, &split.y_train)?;
        check_rows(&split.x_test, &split.y_test)?;
        Ok(split)
    }
}

fn check_rows(features: &Frame, targets: &Frame) -> Result<(), DatasetError> {
    if features.len() != targets.len() {
        return Err(DatasetError::RowMismatch { features: features.len(), targets: targets.len() });
    }
    Ok(())
}

/// Shuffles row indices with a seeded RNG and puts the first
/// `ceil(n * test_ratio)` rows in the test split.
pub fn train_test_split(features: &Frame, targets: &Frame, test_ratio: f64, seed: u64) -> Result<Split, DatasetError> {
    if !(test_ratio > 0.0 && test_ratio < 1.0) {
        return Err(DatasetError::InvalidRatio(test_ratio));
    }
    check_rows(features, targets)?;
    let n = features.len();
    let n_test = (n as f64 * test_ratio).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(DatasetError::TooFewRows { rows: n });
    }
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    let (test_idx, train_idx) = indices.split_at(n_test);
    Ok(Split {
        x_train: features.select_rows(train_idx),
        x_test: features.select_rows(test_idx),
        y_train: targets.select_rows(train_idx),
        y_test: targets.select_rows(test_idx),
    })
}

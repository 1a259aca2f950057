//! Model Registry for versioned ML model artifacts on the local filesystem.
//!
//! Layout under the registry root:
//!
//! ```text
//! <root>/<name>/v<N>/model.json      serialized LinearModel
//! <root>/<name>/v<N>/manifest.json   ModelVersion (hash, timestamp, metrics)
//! <root>/<name>/latest               newest version number
//! ```
//!
//! Every `register` call creates a new version; nothing is ever deleted.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{info, warn};

use crate::metrics::Evaluation;
use crate::regression::LinearModel;

const MODEL_FILE: &str = "model.json";
const MANIFEST_FILE: &str = "manifest.json";
const LATEST_FILE: &str = "latest";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("i/o error on {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("malformed json in {path}: {source}")]
    Serde { path: PathBuf, #[source] source: serde_json::Error },
    #[error("invalid model name {0:?}")]
    InvalidName(String),
    #[error("no saved versions of model '{0}'")]
    NotFound(String),
    #[error("latest pointer {path} holds {value:?}, expected a version number")]
    CorruptPointer { path: PathBuf, value: String },
    #[error("artifact hash mismatch for {tag}: expected {expected}, got {found}")]
    HashMismatch { tag: String, expected: String, found: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    pub version: u64,
    pub tag: String,
    pub hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metrics: Option<Evaluation>,
}

pub struct ModelRegistry {
    root: PathBuf,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> RegistryError + '_ {
    move |source| RegistryError::Io { path: path.to_path_buf(), source }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

impl ModelRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    pub fn root(&self) -> &Path { &self.root }

    fn family_dir(&self, name: &str) -> Result<PathBuf, RegistryError> {
        if name.is_empty() || name.contains(|c: char| c == '/' || c == '\\') || name == "." || name == ".." {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    fn version_dir(family: &Path, version: u64) -> PathBuf { family.join(format!("v{version}")) }

    /// Version numbers present on disk, ascending.
    fn versions(&self, name: &str) -> Result<Vec<u64>, RegistryError> {
        let family = self.family_dir(name)?;
        let entries = match std::fs::read_dir(&family) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&family)(e)),
        };
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(io_err(&family))?;
            let file_name = entry.file_name();
            let Some(num) = file_name.to_str().and_then(|s| s.strip_prefix('v')).and_then(|s| s.parse::<u64>().ok()) else { continue };
            if entry.path().join(MANIFEST_FILE).is_file() { out.push(num); }
        }
        out.sort_unstable();
        Ok(out)
    }

    /// Persists `model` as the next version of `name` and moves `latest` to it.
    pub fn register(&self, name: &str, model: &LinearModel, metrics: Option<Evaluation>) -> Result<ModelVersion, RegistryError> {
        let family = self.family_dir(name)?;
        let version = self.versions(name)?.last().copied().unwrap_or(0) + 1;
        let dir = Self::version_dir(&family, version);
        std::fs::create_dir_all(&dir).map_err(io_err(&dir))?;

        let model_path = dir.join(MODEL_FILE);
        let bytes = serde_json::to_vec_pretty(model).map_err(|source| RegistryError::Serde { path: model_path.clone(), source })?;
        std::fs::write(&model_path, &bytes).map_err(io_err(&model_path))?;

        let mv = ModelVersion {
            name: name.to_string(),
            version,
            tag: format!("{name}:v{version}"),
            hash: sha256_hex(&bytes),
            created_at: Utc::now(),
            metrics,
        };
        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest = serde_json::to_vec_pretty(&mv).map_err(|source| RegistryError::Serde { path: manifest_path.clone(), source })?;
        std::fs::write(&manifest_path, manifest).map_err(io_err(&manifest_path))?;

        let latest = family.join(LATEST_FILE);
        let tmp = family.join(format!("{LATEST_FILE}.tmp"));
        std::fs::write(&tmp, version.to_string()).map_err(io_err(&tmp))?;
        std::fs::rename(&tmp, &latest).map_err(io_err(&latest))?;

        info!(tag = %mv.tag, hash = %mv.hash, path = %dir.display(), "model registered");
        Ok(mv)
    }

    fn read_manifest(&self, family: &Path, version: u64) -> Result<ModelVersion, RegistryError> {
        let path = Self::version_dir(family, version).join(MANIFEST_FILE);
        let raw = std::fs::read(&path).map_err(io_err(&path))?;
        serde_json::from_slice(&raw).map_err(|source| RegistryError::Serde { path, source })
    }

    /// Resolves the `latest` pointer; falls back to the highest version on
    /// disk when the pointer file is absent.
    pub fn latest(&self, name: &str) -> Result<Option<ModelVersion>, RegistryError> {
        let family = self.family_dir(name)?;
        let pointer = family.join(LATEST_FILE);
        let version = match std::fs::read_to_string(&pointer) {
            Ok(raw) => Some(raw.trim().parse::<u64>().map_err(|_| RegistryError::CorruptPointer { path: pointer.clone(), value: raw.clone() })?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let last = self.versions(name)?.last().copied();
                if last.is_some() { warn!(model = name, "latest pointer missing, using highest version on disk"); }
                last
            }
            Err(e) => return Err(io_err(&pointer)(e)),
        };
        version.map(|v| self.read_manifest(&family, v)).transpose()
    }

    pub fn list(&self, name: &str) -> Result<Vec<ModelVersion>, RegistryError> {
        let family = self.family_dir(name)?;
        self.versions(name)?.into_iter().map(|v| self.read_manifest(&family, v)).collect()
    }

    /// Loads the artifact for `mv`, refusing it if its bytes no longer hash
    /// to the recorded digest.
    pub fn load(&self, mv: &ModelVersion) -> Result<LinearModel, RegistryError> {
        let path = Self::version_dir(&self.family_dir(&mv.name)?, mv.version).join(MODEL_FILE);
        let bytes = std::fs::read(&path).map_err(io_err(&path))?;
        let got = sha256_hex(&bytes);
        if !got.eq_ignore_ascii_case(&mv.hash) {
            return Err(RegistryError::HashMismatch { tag: mv.tag.clone(), expected: mv.hash.clone(), found: got });
        }
        serde_json::from_slice(&bytes).map_err(|source| RegistryError::Serde { path, source })
    }

    pub fn load_latest(&self, name: &str) -> Result<(ModelVersion, LinearModel), RegistryError> {
        let mv = self.latest(name)?.ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        let model = self.load(&mv)?;
        Ok((mv, model))
    }
}

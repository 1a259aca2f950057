//! Layered configuration shared by all pipeline stages.
//!
//! Sources, lowest precedence first: built-in defaults, an optional file named
//! by `ADMISSION_CONFIG_FILE`, then `ADMISSION__SECTION__KEY` environment
//! variables.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const CONFIG_FILE_ENV: &str = "ADMISSION_CONFIG_FILE";
pub const ENV_PREFIX: &str = "ADMISSION";

pub const DEFAULT_DATA_URL: &str = "https://assets-datascientest.s3.eu-west-1.amazonaws.com/MLOPS/bentoml/admission.csv";
/// Signing secret used when none is configured. Only fit for local runs.
pub const DEVELOPMENT_SECRET: &str = "development-secret-change-me";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log_level: String,
    pub data: DataConfig,
    pub model: ModelConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            data: DataConfig::default(),
            model: ModelConfig::default(),
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub url: String,
    pub raw_path: PathBuf,
    pub processed_dir: PathBuf,
    pub id_column: String,
    pub target_column: String,
    pub test_ratio: f64,
    pub seed: u64,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATA_URL.into(),
            raw_path: PathBuf::from("data/raw/admission.csv"),
            processed_dir: PathBuf::from("data/processed"),
            id_column: "Serial No.".into(),
            target_column: "Chance of Admit ".into(),
            test_ratio: 0.2,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub store_dir: PathBuf,
    pub name: String,
}

impl Default for ModelConfig {
    fn default() -> Self { Self { store_dir: PathBuf::from("models"), name: "admission_model".into() } }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self { Self { listen_addr: "0.0.0.0:3000".into() } }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub secret: String,
    pub token_ttl_minutes: i64,
    pub users: Vec<UserCredential>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: DEVELOPMENT_SECRET.into(),
            token_ttl_minutes: 30,
            users: vec![UserCredential { username: "admin".into(), password: "password".into() }],
        }
    }
}

impl AuthConfig {
    pub fn uses_development_secret(&self) -> bool { self.secret == DEVELOPMENT_SECRET }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("secret", &"<redacted>")
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .field("users", &self.users)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct UserCredential {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for UserCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCredential").field("username", &self.username).field("password", &"<redacted>").finish()
    }
}

/// Loads configuration from the file named by `ADMISSION_CONFIG_FILE` (if
/// set) and the environment.
pub fn load_config() -> Result<AppConfig, config::ConfigError> {
    let file = std::env::var(CONFIG_FILE_ENV).ok();
    load_config_with(file.as_deref())
}

pub fn load_config_with(file: Option<&str>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(file) = file {
        builder = builder.add_source(config::File::with_name(file).required(false));
    }
    builder = builder.add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true));
    builder.build()?.try_deserialize()
}

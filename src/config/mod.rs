//! Configuration loading and validation.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that overrides the configured admin password.
pub const ADMIN_PASSWORD_ENV: &str = "ADMIN_PASSWORD";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Maps a logical stage name to the header it appears under in the upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageMapping {
    /// Name shown in reports, e.g. "KEUANGAN"
    pub name: String,

    /// Header in the uploaded sheet, e.g. "SLA KEUANGAN"
    pub column: String,
}

/// Which uploaded columns carry which meaning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    /// Candidate headers for the period column, tried in order
    #[serde(default = "default_period_candidates")]
    pub period: Vec<String>,

    /// Vendor column header
    #[serde(default = "default_vendor_column")]
    pub vendor: String,

    /// Transaction type column header
    #[serde(default = "default_transaction_type_column")]
    pub transaction_type: String,

    /// Explicit stage mappings. When empty, stages are detected with `stage_pattern`.
    #[serde(default)]
    pub stages: Vec<StageMapping>,

    /// Case-insensitive pattern that marks a header as a stage duration column
    #[serde(default = "default_stage_pattern")]
    pub stage_pattern: String,
}

fn default_period_candidates() -> Vec<String> {
    ["Periode", "periode", "Tahun-Bulan", "Bulan"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_vendor_column() -> String {
    "Vendor".to_string()
}

fn default_transaction_type_column() -> String {
    "Jenis Transaksi".to_string()
}

fn default_stage_pattern() -> String {
    r"\bSLA\b".to_string()
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            period: default_period_candidates(),
            vendor: default_vendor_column(),
            transaction_type: default_transaction_type_column(),
            stages: Vec::new(),
            stage_pattern: default_stage_pattern(),
        }
    }
}

/// Upload gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared admin password. Without one the service is read-only.
    #[serde(default)]
    pub admin_password: Option<String>,
}

impl AuthConfig {
    pub fn uploads_enabled(&self) -> bool {
        self.admin_password.as_deref().is_some_and(|p| !p.is_empty())
    }

    /// Check a supplied password against the configured one.
    pub fn check(&self, supplied: &str) -> bool {
        match self.admin_password.as_deref() {
            Some(expected) if !expected.is_empty() => expected == supplied,
            _ => false,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,

    /// Largest accepted upload in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub columns: ColumnConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            server: ServerConfig::default(),
            columns: ColumnConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, otherwise start from defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!("No config file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Apply the `ADMIN_PASSWORD` environment variable, if set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(password) = std::env::var(ADMIN_PASSWORD_ENV) {
            if !password.is_empty() {
                self.auth.admin_password = Some(password);
            }
        }
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::ValidationError(
                "max_upload_bytes must be greater than 0".to_string(),
            ));
        }

        if self.columns.period.iter().all(|c| c.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "At least one period column candidate is required".to_string(),
            ));
        }

        RegexBuilder::new(&self.columns.stage_pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                ConfigError::ValidationError(format!("Invalid stage_pattern: {}", e))
            })?;

        for (i, stage) in self.columns.stages.iter().enumerate() {
            if stage.name.trim().is_empty() || stage.column.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Stage mapping #{} needs both a name and a column",
                    i + 1
                )));
            }
            if self.columns.stages[..i].iter().any(|s| s.name == stage.name) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate stage name: {}",
                    stage.name
                )));
            }
        }

        Ok(())
    }
}

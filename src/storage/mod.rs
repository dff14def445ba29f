//! Local upload cache.
//!
//! The last uploaded table is kept verbatim under the data directory as
//! `last_data.<ext>`. There is one writer (the admin upload) and any number
//! of readers; a new upload replaces the previous file.

pub mod table;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{DatasetFingerprint, RawTable};

pub use table::read_table;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Unsupported table format: {0}")]
    UnsupportedFormat(String),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Invalid table: {0}")]
    InvalidTable(String),
}

/// File formats accepted as uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Parquet,
    Json,
}

impl TableFormat {
    pub const ALL: [TableFormat; 3] = [TableFormat::Csv, TableFormat::Parquet, TableFormat::Json];

    pub fn extension(&self) -> &'static str {
        match self {
            TableFormat::Csv => "csv",
            TableFormat::Parquet => "parquet",
            TableFormat::Json => "json",
        }
    }

    /// Parse a format name such as `"csv"` or `".parquet"`.
    pub fn from_name(name: &str) -> Result<Self, StorageError> {
        match name.trim().trim_start_matches('.').to_lowercase().as_str() {
            "csv" => Ok(TableFormat::Csv),
            "parquet" | "pq" => Ok(TableFormat::Parquet),
            "json" => Ok(TableFormat::Json),
            other => Err(StorageError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, StorageError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| StorageError::UnsupportedFormat(path.display().to_string()))?;
        Self::from_name(ext)
    }
}

impl std::fmt::Display for TableFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// A loaded upload.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub table: RawTable,
    pub format: TableFormat,
    pub fingerprint: DatasetFingerprint,
    pub loaded_at: DateTime<Utc>,
}

impl Dataset {
    /// Parse upload bytes into a dataset.
    pub fn from_bytes(bytes: &[u8], format: TableFormat) -> Result<Self, StorageError> {
        let table = read_table(bytes, format)?;
        Ok(Self {
            table,
            format,
            fingerprint: DatasetFingerprint::of_bytes(bytes),
            loaded_at: Utc::now(),
        })
    }

    /// Read and parse a local file, detecting the format from its extension.
    pub fn from_path(path: &Path) -> Result<Self, StorageError> {
        if !path.exists() {
            return Err(StorageError::PathNotFound(path.to_path_buf()));
        }
        let format = TableFormat::from_path(path)?;
        let bytes = fs::read(path)?;
        Self::from_bytes(&bytes, format)
    }
}

/// Configuration for storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Cache path for an upload of the given format.
    pub fn upload_path(&self, format: TableFormat) -> PathBuf {
        self.data_dir
            .join(format!("last_data.{}", format.extension()))
    }

    /// The cached upload, if any.
    pub fn cached_upload(&self) -> Option<(PathBuf, TableFormat)> {
        TableFormat::ALL
            .iter()
            .map(|f| (self.upload_path(*f), *f))
            .find(|(path, _)| path.exists())
    }

    /// Replace the cache with bytes already parsed into `dataset`.
    ///
    /// The new file is written before cached files of other formats are
    /// removed, so a failed write leaves the previous cache in place.
    pub fn write_upload(&self, bytes: &[u8], dataset: &Dataset) -> Result<PathBuf, StorageError> {
        let format = dataset.format;
        fs::create_dir_all(&self.data_dir)?;

        let path = self.upload_path(format);
        fs::write(&path, bytes)?;

        for other in TableFormat::ALL.iter().filter(|f| **f != format) {
            let stale = self.upload_path(*other);
            if stale.exists() {
                fs::remove_file(&stale)?;
                debug!("Removed stale upload {:?}", stale);
            }
        }
        info!(
            "Cached upload {} ({} rows, {} bytes) at {:?}",
            dataset.fingerprint,
            dataset.table.len(),
            bytes.len(),
            path
        );
        Ok(path)
    }

    /// Load the cached upload. `Ok(None)` when nothing has been uploaded yet.
    pub fn load_cached(&self) -> Result<Option<Dataset>, StorageError> {
        match self.cached_upload() {
            Some((path, format)) => {
                let bytes = fs::read(&path)?;
                let dataset = Dataset::from_bytes(&bytes, format)?;
                debug!("Loaded cached upload {} from {:?}", dataset.fingerprint, path);
                Ok(Some(dataset))
            }
            None => Ok(None),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}

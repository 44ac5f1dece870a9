//! Ingestion configuration
//!
//! File locations and tunables are passed to each component explicitly; the
//! environment only supplies defaults for the binary.

use crate::error::{IngestError, Result};
use crate::features::DEFAULT_DISTANCE_COLUMN;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use trips_common::env;

// ============================================================================
// Defaults
// ============================================================================

/// Default location of the raw trip feed.
pub const DEFAULT_RAW_PATH: &str = "data/raw/train.csv";

/// Default location of the enriched (accepted) file.
pub const DEFAULT_CLEANED_PATH: &str = "data/processed/trips_cleaned.csv";

/// Default location of the reject log.
pub const DEFAULT_REJECT_PATH: &str = "data/logs/cleaning_issues.csv";

/// Rows per multi-row insert.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Largest batch whose bind parameters fit PostgreSQL's 65535 limit (16 per row).
pub const MAX_BATCH_SIZE: usize = 4000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub raw_path: PathBuf,
    pub cleaned_path: PathBuf,
    pub reject_path: PathBuf,

    /// Feed column carrying the trip distance in kilometres
    pub distance_column: String,

    pub batch_size: usize,

    /// Replacement for the embedded schema definition
    pub schema_path: Option<PathBuf>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            raw_path: PathBuf::from(DEFAULT_RAW_PATH),
            cleaned_path: PathBuf::from(DEFAULT_CLEANED_PATH),
            reject_path: PathBuf::from(DEFAULT_REJECT_PATH),
            distance_column: DEFAULT_DISTANCE_COLUMN.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            schema_path: None,
        }
    }
}

impl IngestConfig {
    /// Load from environment (after `.env`) and defaults
    ///
    /// - `TRIPS_RAW_PATH`, `TRIPS_CLEANED_PATH`, `TRIPS_REJECT_PATH`
    /// - `TRIPS_DISTANCE_COLUMN`
    /// - `TRIPS_BATCH_SIZE`
    /// - `TRIPS_SCHEMA_PATH`
    pub fn from_env() -> Result<Self> {
        env::load_dotenv();

        let config = Self {
            raw_path: env::string_or("TRIPS_RAW_PATH", DEFAULT_RAW_PATH).into(),
            cleaned_path: env::string_or("TRIPS_CLEANED_PATH", DEFAULT_CLEANED_PATH).into(),
            reject_path: env::string_or("TRIPS_REJECT_PATH", DEFAULT_REJECT_PATH).into(),
            distance_column: env::string_or("TRIPS_DISTANCE_COLUMN", DEFAULT_DISTANCE_COLUMN),
            batch_size: env::parse_or("TRIPS_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            schema_path: env::optional("TRIPS_SCHEMA_PATH").map(PathBuf::from),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(IngestError::Config("batch_size must be greater than 0".to_string()));
        }
        if self.batch_size > MAX_BATCH_SIZE {
            return Err(IngestError::Config(format!(
                "batch_size {} exceeds the maximum of {}",
                self.batch_size, MAX_BATCH_SIZE
            )));
        }
        if self.distance_column.trim().is_empty() {
            return Err(IngestError::Config("distance_column cannot be empty".to_string()));
        }
        Ok(())
    }
}

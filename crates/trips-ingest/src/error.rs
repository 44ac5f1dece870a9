//! Session-level errors for the ingestion pipeline
//!
//! Per-record validation failures never surface here; they are
//! [`RejectReason`](crate::validator::RejectReason) values routed to the
//! reject log. Everything in [`IngestError`] ends the current pass.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Provisioning step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStep {
    ReadDefinition,
    CreateTable,
    LookupIndex,
    CreateIndex,
}

impl std::fmt::Display for SchemaStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaStep::ReadDefinition => write!(f, "reading schema definition"),
            SchemaStep::CreateTable => write!(f, "creating table"),
            SchemaStep::LookupIndex => write!(f, "looking up index"),
            SchemaStep::CreateIndex => write!(f, "creating index"),
        }
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Schema provisioning failed while {step}: {message}")]
    Schema { step: SchemaStep, message: String },

    #[error(
        "Batch {batch} failed to commit ({committed_batches} earlier batches, \
         {committed_rows} rows already committed): {source}"
    )]
    BatchCommit {
        batch: usize,
        committed_batches: usize,
        committed_rows: u64,
        #[source]
        source: sqlx::Error,
    },

    #[error("Malformed enriched row at line {line}: column '{column}' has value '{value}'")]
    MalformedRow {
        line: u64,
        column: &'static str,
        value: String,
    },

    #[error("Required column '{0}' missing from header")]
    MissingColumn(String),

    #[error("Cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Common(#[from] trips_common::TripsError),
}

impl IngestError {
    pub(crate) fn schema(step: SchemaStep, err: impl std::fmt::Display) -> Self {
        Self::Schema {
            step,
            message: err.to_string(),
        }
    }
}

//! Trips Ingest Library
//!
//! Ingestion pipeline for taxi trip records: validate and enrich a raw CSV
//! feed, keep an audit log of rejects, and load the accepted rows into
//! PostgreSQL in idempotent batches.
//!
//! # Components
//!
//! - [`validator`]: raw row -> typed candidate, or a [`validator::RejectReason`]
//! - [`features`]: speed, fare per km, rush-hour flag
//! - [`sinks`]: enriched file and reject log writers
//! - [`cleaner`]: the single validation/derivation pass
//! - [`schema`]: idempotent table and index provisioning
//! - [`loader`]: batched `INSERT ... ON CONFLICT DO NOTHING`
//! - [`query`]: typed filters and summaries over the loaded table
//!
//! # Example
//!
//! ```no_run
//! use trips_ingest::{config::IngestConfig, db, pipeline};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_env()?;
//!     let stats = pipeline::clean(&config)?;
//!     println!("accepted {} of {}", stats.accepted, stats.records_read);
//!
//!     let pool = db::create_pool(&db::DbConfig::from_env()?).await?;
//!     pipeline::load(&pool, &config).await?;
//!     Ok(())
//! }
//! ```

pub mod cleaner;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod query;
pub mod schema;
pub mod sinks;
pub mod validator;

pub use error::{IngestError, Result};

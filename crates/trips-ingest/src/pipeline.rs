//! Pass orchestration
//!
//! Steps:
//! 1. Clean: raw feed -> enriched file + reject log
//! 2. Provision: table and indexes
//! 3. Load: enriched file -> store, batch by batch
//!
//! Provisioning always precedes loading within a session.

use crate::cleaner::{CleanStats, Cleaner};
use crate::config::IngestConfig;
use crate::error::Result;
use crate::features::FeatureDeriver;
use crate::loader::{BatchLoader, LoadOutcome};
use crate::schema::{ProvisionReport, SchemaProvisioner};
use crate::validator::RecordValidator;
use sqlx::PgPool;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct LoadSession {
    pub provision: ProvisionReport,
    pub outcome: LoadOutcome,
}

/// Run the cleaning pass with the configured file locations.
pub fn clean(config: &IngestConfig) -> Result<CleanStats> {
    let cleaner = Cleaner::new(
        RecordValidator::default(),
        FeatureDeriver::new(config.distance_column.clone()),
    );
    cleaner.run(&config.raw_path, &config.cleaned_path, &config.reject_path)
}

pub async fn provision(db: &PgPool, config: &IngestConfig) -> Result<ProvisionReport> {
    SchemaProvisioner::from_config(db.clone(), config)?
        .provision()
        .await
}

/// Provision, then load the enriched file.
pub async fn load(db: &PgPool, config: &IngestConfig) -> Result<LoadSession> {
    let provision = provision(db, config).await?;

    info!(path = %config.cleaned_path.display(), "Loading trip data");
    let outcome = BatchLoader::with_batch_size(db.clone(), config.batch_size)
        .load(&config.cleaned_path)
        .await?;

    Ok(LoadSession { provision, outcome })
}

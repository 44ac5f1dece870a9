//! Shared helpers for trips-ingest integration tests
//!
//! Store-backed tests start a throwaway PostgreSQL container and need Docker:
//!
//! ```bash
//! cargo test -p trips-ingest -- --ignored --nocapture
//! ```
#![allow(dead_code)]

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::path::{Path, PathBuf};
use std::time::Duration;
use testcontainers::{core::IntoContainerPort, runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::postgres::Postgres;
use tracing::{debug, info};

/// Header of the raw feed used throughout the tests.
pub const FEED_HEADER: &str = "id,vendor_id,pickup_datetime,dropoff_datetime,passenger_count,\
pickup_longitude,pickup_latitude,dropoff_longitude,dropoff_latitude,store_and_fwd_flag,\
trip_duration,trip_distance,fare_amount";

/// PostgreSQL container with a connected pool; dropped with the test.
pub struct TestPostgres {
    _container: ContainerAsync<Postgres>,
    pool: PgPool,
}

impl TestPostgres {
    pub async fn start() -> Result<Self> {
        info!("Starting PostgreSQL test container...");

        let container = Postgres::default()
            .start()
            .await
            .context("Failed to start PostgreSQL container")?;

        let host = container
            .get_host()
            .await
            .context("Failed to get container host")?;
        let port = container
            .get_host_port_ipv4(5432.tcp())
            .await
            .context("Failed to get container port")?;

        let connection_string =
            format!("postgresql://postgres:postgres@{}:{}/postgres", host, port);
        debug!("PostgreSQL connection: {}", connection_string);

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        Ok(Self {
            _container: container,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn trip_count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM trips")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

pub fn init_test_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let _ = fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("info,trips_ingest=debug,sqlx=warn,testcontainers=info")
        }))
        .with_test_writer()
        .try_init();
}

/// One valid feed row with the given id, pickup hour, distance and duration.
pub fn feed_row(id: &str, pickup_hour: u32, distance_km: f64, duration_secs: u32) -> String {
    let dropoff_secs = pickup_hour * 3600 + duration_secs;
    format!(
        "{id},1,2016-03-14 {ph:02}:00:00,2016-03-14 {dh:02}:{dm:02}:{ds:02},1,-73.98,40.76,-73.96,40.77,N,{duration_secs},{distance_km},12.5",
        ph = pickup_hour,
        dh = dropoff_secs / 3600,
        dm = (dropoff_secs % 3600) / 60,
        ds = dropoff_secs % 60,
    )
}

/// Write a feed file under `dir` and return its path.
pub fn write_feed(dir: &Path, name: &str, rows: &[String]) -> Result<PathBuf> {
    let path = dir.join(name);
    let mut content = String::from(FEED_HEADER);
    content.push('\n');
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    std::fs::write(&path, content)?;
    Ok(path)
}

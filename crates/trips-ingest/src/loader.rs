//! Batch loading of the enriched file into the store
//!
//! Rows are re-typed (not re-validated), grouped into fixed-size batches and
//! submitted as one multi-row `INSERT ... ON CONFLICT (id) DO NOTHING` per
//! batch, each in its own transaction. A failed batch leaves earlier batches
//! committed and nothing of its own visible; rerunning is safe because
//! already-stored ids are ignored.

use crate::config::{DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE};
use crate::error::{IngestError, Result};
use crate::models::{columns, Header, TripRecord};
use crate::schema::TRIPS_TABLE;
use crate::validator::parse_timestamp;
use chrono::NaiveDateTime;
use csv::StringRecord;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, instrument, warn};

/// Non-fatal conditions that stop a load before it starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadWarning {
    MissingInput { path: PathBuf },
}

impl std::fmt::Display for LoadWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadWarning::MissingInput { path } => {
                write!(f, "enriched file not found at {}", path.display())
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub rows_read: u64,
    pub rows_inserted: u64,
    /// Rows skipped because their id was already stored
    pub rows_ignored: u64,
    pub batches_committed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Completed(LoadStats),
    Skipped(LoadWarning),
}

/// Interpret boolean-like text: "true", "1" or "yes" in any case.
pub fn parse_flag(text: &str) -> bool {
    matches!(text.to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}

/// Positions of the store columns in an enriched file header.
#[derive(Debug, Clone)]
pub struct EnrichedLayout {
    positions: [Option<usize>; columns::STORE.len()],
}

impl EnrichedLayout {
    /// Monetary columns may be absent; every other store column is required.
    pub fn from_header(header: &Header) -> Result<Self> {
        let mut positions = [None; columns::STORE.len()];
        for (slot, column) in positions.iter_mut().zip(columns::STORE) {
            *slot = header.position(column);
            if slot.is_none() && !is_optional(column) {
                return Err(IngestError::MissingColumn(column.to_string()));
            }
        }
        Ok(Self { positions })
    }

    fn text<'r>(&self, record: &'r StringRecord, column: &'static str) -> Option<&'r str> {
        let idx = columns::STORE.iter().position(|c| *c == column)?;
        self.positions[idx].and_then(|pos| record.get(pos))
    }

    /// Re-type one enriched row.
    pub fn parse(&self, record: &StringRecord) -> Result<TripRecord> {
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row = RowParser {
            layout: self,
            record,
            line,
        };

        Ok(TripRecord {
            id: row.required(columns::ID)?.to_string(),
            vendor_id: row.number(columns::VENDOR_ID)?,
            pickup_datetime: row.timestamp(columns::PICKUP_DATETIME)?,
            dropoff_datetime: row.timestamp(columns::DROPOFF_DATETIME)?,
            passenger_count: row.number(columns::PASSENGER_COUNT)?,
            pickup_longitude: row.number(columns::PICKUP_LONGITUDE)?,
            pickup_latitude: row.number(columns::PICKUP_LATITUDE)?,
            dropoff_longitude: row.number(columns::DROPOFF_LONGITUDE)?,
            dropoff_latitude: row.number(columns::DROPOFF_LATITUDE)?,
            trip_duration: row.number(columns::TRIP_DURATION)?,
            fare_amount: row.number_or_zero(columns::FARE_AMOUNT)?,
            tip_amount: row.number_or_zero(columns::TIP_AMOUNT)?,
            total_amount: row.number_or_zero(columns::TOTAL_AMOUNT)?,
            trip_speed_km_hr: row.number_or_zero(columns::TRIP_SPEED_KM_HR)?,
            fare_per_km: row.number_or_zero(columns::FARE_PER_KM)?,
            is_rush_hour: row.text(columns::IS_RUSH_HOUR).map(parse_flag).unwrap_or(false),
        })
    }
}

fn is_optional(column: &str) -> bool {
    matches!(
        column,
        columns::FARE_AMOUNT | columns::TIP_AMOUNT | columns::TOTAL_AMOUNT
    )
}

struct RowParser<'a> {
    layout: &'a EnrichedLayout,
    record: &'a StringRecord,
    line: u64,
}

impl<'a> RowParser<'a> {
    fn text(&self, column: &'static str) -> Option<&'a str> {
        self.layout.text(self.record, column)
    }

    fn malformed(&self, column: &'static str, value: &str) -> IngestError {
        IngestError::MalformedRow {
            line: self.line,
            column,
            value: value.to_string(),
        }
    }

    fn required(&self, column: &'static str) -> Result<&'a str> {
        self.text(column).ok_or_else(|| self.malformed(column, ""))
    }

    fn number<T: FromStr>(&self, column: &'static str) -> Result<T> {
        let text = self.required(column)?;
        text.trim().parse().map_err(|_| self.malformed(column, text))
    }

    fn number_or_zero(&self, column: &'static str) -> Result<f64> {
        match self.text(column) {
            None => Ok(0.0),
            Some(text) if text.trim().is_empty() => Ok(0.0),
            Some(text) => text.trim().parse().map_err(|_| self.malformed(column, text)),
        }
    }

    fn timestamp(&self, column: &'static str) -> Result<NaiveDateTime> {
        let text = self.required(column)?;
        parse_timestamp(text).ok_or_else(|| self.malformed(column, text))
    }
}

/// Build the multi-row insert for one batch.
pub fn insert_query(batch: &[TripRecord]) -> QueryBuilder<'_, Postgres> {
    let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "INSERT INTO {} ({}) ",
        TRIPS_TABLE,
        columns::STORE.join(", ")
    ));

    query_builder.push_values(batch, |mut b, trip| {
        b.push_bind(&trip.id)
            .push_bind(trip.vendor_id)
            .push_bind(trip.pickup_datetime)
            .push_bind(trip.dropoff_datetime)
            .push_bind(trip.passenger_count)
            .push_bind(trip.pickup_longitude)
            .push_bind(trip.pickup_latitude)
            .push_bind(trip.dropoff_longitude)
            .push_bind(trip.dropoff_latitude)
            .push_bind(trip.trip_duration)
            .push_bind(trip.fare_amount)
            .push_bind(trip.tip_amount)
            .push_bind(trip.total_amount)
            .push_bind(trip.trip_speed_km_hr)
            .push_bind(trip.fare_per_km)
            .push_bind(trip.is_rush_hour);
    });

    query_builder.push(" ON CONFLICT (id) DO NOTHING");
    query_builder
}

pub struct BatchLoader {
    db: PgPool,
    batch_size: usize,
}

impl BatchLoader {
    pub fn new(db: PgPool) -> Self {
        Self::with_batch_size(db, DEFAULT_BATCH_SIZE)
    }

    pub fn with_batch_size(db: PgPool, batch_size: usize) -> Self {
        Self {
            db,
            batch_size: batch_size.clamp(1, MAX_BATCH_SIZE),
        }
    }

    /// Stream the enriched file at `path` into the store.
    ///
    /// A missing file is reported as [`LoadOutcome::Skipped`], not an error;
    /// a zero-byte file completes with nothing loaded.
    #[instrument(skip(self, path), fields(path = %path.display(), batch_size = self.batch_size))]
    pub async fn load(&self, path: &Path) -> Result<LoadOutcome> {
        if !path.exists() {
            let warning = LoadWarning::MissingInput {
                path: path.to_path_buf(),
            };
            warn!(%warning, "Skipping data load");
            return Ok(LoadOutcome::Skipped(warning));
        }

        let mut reader = csv::Reader::from_path(path)?;
        let header = Header::from_record(reader.headers()?);
        if header.is_empty() {
            info!("Enriched file is empty; nothing to load");
            return Ok(LoadOutcome::Completed(LoadStats::default()));
        }
        let layout = EnrichedLayout::from_header(&header)?;

        let mut stats = LoadStats::default();
        let mut batch: Vec<TripRecord> = Vec::with_capacity(self.batch_size);
        let mut record = StringRecord::new();

        while reader.read_record(&mut record)? {
            batch.push(layout.parse(&record)?);
            stats.rows_read += 1;

            if batch.len() >= self.batch_size {
                self.submit(&batch, &mut stats).await?;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.submit(&batch, &mut stats).await?;
        }

        info!(
            rows_read = stats.rows_read,
            rows_inserted = stats.rows_inserted,
            rows_ignored = stats.rows_ignored,
            batches = stats.batches_committed,
            "Load complete"
        );

        Ok(LoadOutcome::Completed(stats))
    }

    async fn submit(&self, batch: &[TripRecord], stats: &mut LoadStats) -> Result<()> {
        let failed = |source: sqlx::Error| IngestError::BatchCommit {
            batch: stats.batches_committed + 1,
            committed_batches: stats.batches_committed,
            committed_rows: stats.rows_inserted,
            source,
        };

        let inserted = async {
            let mut tx = self.db.begin().await?;
            let mut query_builder = insert_query(batch);
            let result = query_builder.build().execute(&mut *tx).await?;
            tx.commit().await?;
            Ok::<u64, sqlx::Error>(result.rows_affected())
        }
        .await
        .map_err(failed)?;

        stats.batches_committed += 1;
        stats.rows_inserted += inserted;
        stats.rows_ignored += batch.len() as u64 - inserted;

        info!(
            batch = stats.batches_committed,
            rows = batch.len(),
            inserted,
            total_read = stats.rows_read,
            "Committed batch"
        );
        Ok(())
    }
}

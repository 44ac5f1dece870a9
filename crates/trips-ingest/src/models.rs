//! Trip record data model
//!
//! A [`RawRecord`] is one untouched feed row viewed through its [`Header`].
//! Validation turns it into a [`TripCandidate`]; feature derivation turns the
//! candidate into a [`TripRecord`], the shape persisted in the `trips` table.

use chrono::NaiveDateTime;
use csv::StringRecord;
use serde::Serialize;
use std::collections::HashMap;

/// Timestamp layout used by the feed, the enriched file and the loader.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column names shared by the feed, the enriched file and the store.
pub mod columns {
    pub const ID: &str = "id";
    pub const VENDOR_ID: &str = "vendor_id";
    pub const PICKUP_DATETIME: &str = "pickup_datetime";
    pub const DROPOFF_DATETIME: &str = "dropoff_datetime";
    pub const PASSENGER_COUNT: &str = "passenger_count";
    pub const PICKUP_LONGITUDE: &str = "pickup_longitude";
    pub const PICKUP_LATITUDE: &str = "pickup_latitude";
    pub const DROPOFF_LONGITUDE: &str = "dropoff_longitude";
    pub const DROPOFF_LATITUDE: &str = "dropoff_latitude";
    pub const TRIP_DURATION: &str = "trip_duration";
    pub const FARE_AMOUNT: &str = "fare_amount";
    pub const TIP_AMOUNT: &str = "tip_amount";
    pub const TOTAL_AMOUNT: &str = "total_amount";
    pub const TRIP_SPEED_KM_HR: &str = "trip_speed_km_hr";
    pub const FARE_PER_KM: &str = "fare_per_km";
    pub const IS_RUSH_HOUR: &str = "is_rush_hour";

    /// Derived columns appended after the feed columns, in order.
    pub const DERIVED: [&str; 3] = [TRIP_SPEED_KM_HR, FARE_PER_KM, IS_RUSH_HOUR];

    /// Store columns in insert order.
    pub const STORE: [&str; 16] = [
        ID,
        VENDOR_ID,
        PICKUP_DATETIME,
        DROPOFF_DATETIME,
        PASSENGER_COUNT,
        PICKUP_LONGITUDE,
        PICKUP_LATITUDE,
        DROPOFF_LONGITUDE,
        DROPOFF_LATITUDE,
        TRIP_DURATION,
        FARE_AMOUNT,
        TIP_AMOUNT,
        TOTAL_AMOUNT,
        TRIP_SPEED_KM_HR,
        FARE_PER_KM,
        IS_RUSH_HOUR,
    ];
}

/// Column names of a delimited file with a name -> position lookup.
#[derive(Debug, Clone)]
pub struct Header {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl Header {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut positions = HashMap::with_capacity(names.len());
        for (idx, name) in names.iter().enumerate() {
            // First occurrence wins for duplicated names
            positions.entry(name.clone()).or_insert(idx);
        }
        Self { names, positions }
    }

    pub fn from_record(record: &StringRecord) -> Self {
        Self::new(record.iter())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Header of the enriched file: these columns followed by the derived ones.
    pub fn enriched(&self) -> Header {
        Header::new(
            self.names
                .iter()
                .map(String::as_str)
                .chain(columns::DERIVED)
                .map(str::to_string),
        )
    }
}

/// One feed row exactly as read.
#[derive(Debug, Clone)]
pub struct RawRecord<'h> {
    header: &'h Header,
    values: StringRecord,
}

impl<'h> RawRecord<'h> {
    pub fn new(header: &'h Header, values: StringRecord) -> Self {
        Self { header, values }
    }

    pub fn values(&self) -> &StringRecord {
        &self.values
    }

    /// Value of a named column; `None` when the column is absent from the
    /// header or the row is too short to carry it.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.header
            .position(name)
            .and_then(|idx| self.values.get(idx))
    }

    /// 1-based line of the row in its source file, when known.
    pub fn line(&self) -> Option<u64> {
        self.values.position().map(|p| p.line())
    }
}

/// Typed fields of a row that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct TripCandidate {
    pub id: String,
    pub vendor_id: i32,
    pub pickup_datetime: NaiveDateTime,
    pub dropoff_datetime: NaiveDateTime,
    pub passenger_count: i32,
    pub pickup_longitude: f64,
    pub pickup_latitude: f64,
    pub dropoff_longitude: f64,
    pub dropoff_latitude: f64,
    pub trip_duration: i32,
    pub fare_amount: f64,
    pub tip_amount: f64,
    pub total_amount: f64,
}

/// Validated and enriched trip, one row of the `trips` table.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct TripRecord {
    pub id: String,
    pub vendor_id: i32,
    pub pickup_datetime: NaiveDateTime,
    pub dropoff_datetime: NaiveDateTime,
    pub passenger_count: i32,
    pub pickup_longitude: f64,
    pub pickup_latitude: f64,
    pub dropoff_longitude: f64,
    pub dropoff_latitude: f64,
    pub trip_duration: i32,
    pub fare_amount: f64,
    pub tip_amount: f64,
    pub total_amount: f64,
    pub trip_speed_km_hr: f64,
    pub fare_per_km: f64,
    pub is_rush_hour: bool,
}

impl TripRecord {
    /// Text form of a typed field, or `None` for columns this record does not
    /// own (those pass through from the raw row).
    pub fn field_text(&self, column: &str) -> Option<String> {
        let text = match column {
            columns::ID => self.id.clone(),
            columns::VENDOR_ID => self.vendor_id.to_string(),
            columns::PICKUP_DATETIME => self.pickup_datetime.format(TIMESTAMP_FORMAT).to_string(),
            columns::DROPOFF_DATETIME => {
                self.dropoff_datetime.format(TIMESTAMP_FORMAT).to_string()
            },
            columns::PASSENGER_COUNT => self.passenger_count.to_string(),
            columns::PICKUP_LONGITUDE => self.pickup_longitude.to_string(),
            columns::PICKUP_LATITUDE => self.pickup_latitude.to_string(),
            columns::DROPOFF_LONGITUDE => self.dropoff_longitude.to_string(),
            columns::DROPOFF_LATITUDE => self.dropoff_latitude.to_string(),
            columns::TRIP_DURATION => self.trip_duration.to_string(),
            columns::FARE_AMOUNT => self.fare_amount.to_string(),
            columns::TIP_AMOUNT => self.tip_amount.to_string(),
            columns::TOTAL_AMOUNT => self.total_amount.to_string(),
            columns::TRIP_SPEED_KM_HR => self.trip_speed_km_hr.to_string(),
            columns::FARE_PER_KM => self.fare_per_km.to_string(),
            columns::IS_RUSH_HOUR => self.is_rush_hour.to_string(),
            _ => return None,
        };
        Some(text)
    }
}

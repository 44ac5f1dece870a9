//! Record validation
//!
//! Converts one [`RawRecord`] into a [`TripCandidate`] or names the first
//! reason it cannot. Conversion runs identity, integers, timestamps, floats,
//! then the trip invariants in a fixed order; the first failure wins.

use crate::models::{columns, RawRecord, TripCandidate, TIMESTAMP_FORMAT};
use chrono::NaiveDateTime;
use std::fmt;
use std::str::FromStr;

/// Why a record was rejected. Kept in memory for statistics and tests; the
/// reject log itself stores only the verbatim row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RejectReason {
    InvalidEncoding,
    MissingField(&'static str),
    InvalidInteger(&'static str),
    InvalidTimestamp(&'static str),
    InvalidFloat(&'static str),
    DropoffNotAfterPickup,
    NoPassengers,
    PickupOutOfBounds,
    DropoffOutOfBounds,
    NonPositiveDuration,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InvalidEncoding => write!(f, "row is not valid UTF-8"),
            RejectReason::MissingField(c) => write!(f, "missing field {}", c),
            RejectReason::InvalidInteger(c) => write!(f, "invalid integer in {}", c),
            RejectReason::InvalidTimestamp(c) => write!(f, "invalid timestamp in {}", c),
            RejectReason::InvalidFloat(c) => write!(f, "invalid number in {}", c),
            RejectReason::DropoffNotAfterPickup => write!(f, "dropoff not after pickup"),
            RejectReason::NoPassengers => write!(f, "passenger count below 1"),
            RejectReason::PickupOutOfBounds => write!(f, "pickup outside bounding box"),
            RejectReason::DropoffOutOfBounds => write!(f, "dropoff outside bounding box"),
            RejectReason::NonPositiveDuration => write!(f, "trip duration not positive"),
        }
    }
}

/// Geographic box with exclusive bounds on every side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_longitude: f64,
    pub max_longitude: f64,
    pub min_latitude: f64,
    pub max_latitude: f64,
}

impl BoundingBox {
    /// Greater New York service area.
    pub const NEW_YORK: BoundingBox = BoundingBox {
        min_longitude: -74.5,
        max_longitude: -72.5,
        min_latitude: 40.0,
        max_latitude: 41.5,
    };

    /// Open-interval containment; NaN coordinates are never inside.
    pub fn contains(&self, longitude: f64, latitude: f64) -> bool {
        self.min_longitude < longitude
            && longitude < self.max_longitude
            && self.min_latitude < latitude
            && latitude < self.max_latitude
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::NEW_YORK
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordValidator {
    bounds: BoundingBox,
}

impl RecordValidator {
    pub fn new(bounds: BoundingBox) -> Self {
        Self { bounds }
    }

    pub fn validate(&self, raw: &RawRecord<'_>) -> Result<TripCandidate, RejectReason> {
        let id = required(raw, columns::ID)?.to_string();

        let vendor_id: i32 = integer(raw, columns::VENDOR_ID)?;
        let passenger_count: i32 = integer(raw, columns::PASSENGER_COUNT)?;
        let trip_duration: i32 = integer(raw, columns::TRIP_DURATION)?;

        let pickup_datetime = timestamp(raw, columns::PICKUP_DATETIME)?;
        let dropoff_datetime = timestamp(raw, columns::DROPOFF_DATETIME)?;

        let pickup_longitude = float(raw, columns::PICKUP_LONGITUDE)?;
        let pickup_latitude = float(raw, columns::PICKUP_LATITUDE)?;
        let dropoff_longitude = float(raw, columns::DROPOFF_LONGITUDE)?;
        let dropoff_latitude = float(raw, columns::DROPOFF_LATITUDE)?;

        if dropoff_datetime <= pickup_datetime {
            return Err(RejectReason::DropoffNotAfterPickup);
        }
        if passenger_count < 1 {
            return Err(RejectReason::NoPassengers);
        }
        if !self.bounds.contains(pickup_longitude, pickup_latitude) {
            return Err(RejectReason::PickupOutOfBounds);
        }
        if !self.bounds.contains(dropoff_longitude, dropoff_latitude) {
            return Err(RejectReason::DropoffOutOfBounds);
        }
        if trip_duration <= 0 {
            return Err(RejectReason::NonPositiveDuration);
        }

        Ok(TripCandidate {
            id,
            vendor_id,
            pickup_datetime,
            dropoff_datetime,
            passenger_count,
            pickup_longitude,
            pickup_latitude,
            dropoff_longitude,
            dropoff_latitude,
            trip_duration,
            fare_amount: money(raw, columns::FARE_AMOUNT)?,
            tip_amount: money(raw, columns::TIP_AMOUNT)?,
            total_amount: money(raw, columns::TOTAL_AMOUNT)?,
        })
    }
}

/// Parse a feed timestamp; the layout is fixed and carries no timezone.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT).ok()
}

fn required<'r>(raw: &'r RawRecord<'_>, column: &'static str) -> Result<&'r str, RejectReason> {
    raw.get(column).ok_or(RejectReason::MissingField(column))
}

fn parsed<T: FromStr>(
    raw: &RawRecord<'_>,
    column: &'static str,
    invalid: fn(&'static str) -> RejectReason,
) -> Result<T, RejectReason> {
    required(raw, column)?
        .trim()
        .parse()
        .map_err(|_| invalid(column))
}

fn integer(raw: &RawRecord<'_>, column: &'static str) -> Result<i32, RejectReason> {
    parsed(raw, column, RejectReason::InvalidInteger)
}

fn float(raw: &RawRecord<'_>, column: &'static str) -> Result<f64, RejectReason> {
    parsed(raw, column, RejectReason::InvalidFloat)
}

fn timestamp(raw: &RawRecord<'_>, column: &'static str) -> Result<NaiveDateTime, RejectReason> {
    parse_timestamp(required(raw, column)?).ok_or(RejectReason::InvalidTimestamp(column))
}

/// Monetary fields are optional: absent or blank means 0.0, anything else
/// must parse.
fn money(raw: &RawRecord<'_>, column: &'static str) -> Result<f64, RejectReason> {
    match raw.get(column).map(str::trim) {
        None | Some("") => Ok(0.0),
        Some(text) => text.parse().map_err(|_| RejectReason::InvalidFloat(column)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Header;
    use csv::StringRecord;

    const HEADER: [&str; 11] = [
        "id",
        "vendor_id",
        "pickup_datetime",
        "dropoff_datetime",
        "passenger_count",
        "pickup_longitude",
        "pickup_latitude",
        "dropoff_longitude",
        "dropoff_latitude",
        "trip_duration",
        "fare_amount",
    ];

    fn valid_row() -> Vec<String> {
        [
            "id2875421",
            "2",
            "2016-03-14 17:24:55",
            "2016-03-14 17:32:30",
            "1",
            "-73.982154",
            "40.767937",
            "-73.964630",
            "40.765602",
            "455",
            "",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn check(row: Vec<String>) -> Result<TripCandidate, RejectReason> {
        let header = Header::new(HEADER);
        let raw = RawRecord::new(&header, StringRecord::from(row));
        RecordValidator::default().validate(&raw)
    }

    fn with(column: &str, value: &str) -> Vec<String> {
        let mut row = valid_row();
        let idx = HEADER.iter().position(|c| *c == column).unwrap();
        row[idx] = value.to_string();
        row
    }

    #[test]
    fn test_valid_row_is_accepted() {
        let trip = check(valid_row()).unwrap();
        assert_eq!(trip.id, "id2875421");
        assert_eq!(trip.vendor_id, 2);
        assert_eq!(trip.trip_duration, 455);
        assert_eq!(trip.fare_amount, 0.0, "blank fare defaults to zero");
        assert_eq!(trip.tip_amount, 0.0, "absent tip defaults to zero");
    }

    #[test]
    fn test_dropoff_must_be_after_pickup() {
        let equal = with("dropoff_datetime", "2016-03-14 17:24:55");
        assert_eq!(check(equal), Err(RejectReason::DropoffNotAfterPickup));

        let earlier = with("dropoff_datetime", "2016-03-14 17:00:00");
        assert_eq!(check(earlier), Err(RejectReason::DropoffNotAfterPickup));
    }

    #[test]
    fn test_passenger_count_lower_bound() {
        assert_eq!(check(with("passenger_count", "0")), Err(RejectReason::NoPassengers));
        assert_eq!(check(with("passenger_count", "-2")), Err(RejectReason::NoPassengers));
        assert!(check(with("passenger_count", "1")).is_ok());
    }

    #[test]
    fn test_pickup_longitude_bounds_are_exclusive() {
        assert_eq!(
            check(with("pickup_longitude", "-74.5")),
            Err(RejectReason::PickupOutOfBounds)
        );
        assert_eq!(
            check(with("pickup_longitude", "-72.5")),
            Err(RejectReason::PickupOutOfBounds)
        );
        assert!(check(with("pickup_longitude", "-74.0")).is_ok());
    }

    #[test]
    fn test_dropoff_latitude_bounds() {
        assert_eq!(
            check(with("dropoff_latitude", "40")),
            Err(RejectReason::DropoffOutOfBounds)
        );
        assert_eq!(
            check(with("dropoff_latitude", "41.5")),
            Err(RejectReason::DropoffOutOfBounds)
        );
        assert_eq!(
            check(with("dropoff_latitude", "NaN")),
            Err(RejectReason::DropoffOutOfBounds)
        );
    }

    #[test]
    fn test_duration_must_be_positive() {
        assert_eq!(check(with("trip_duration", "0")), Err(RejectReason::NonPositiveDuration));
    }

    #[test]
    fn test_conversion_failures_are_rejects() {
        assert_eq!(
            check(with("vendor_id", "two")),
            Err(RejectReason::InvalidInteger("vendor_id"))
        );
        assert_eq!(
            check(with("passenger_count", "1.5")),
            Err(RejectReason::InvalidInteger("passenger_count"))
        );
        assert_eq!(
            check(with("pickup_datetime", "2016-03-14T17:24:55")),
            Err(RejectReason::InvalidTimestamp("pickup_datetime"))
        );
        assert_eq!(
            check(with("pickup_latitude", "north")),
            Err(RejectReason::InvalidFloat("pickup_latitude"))
        );
        assert_eq!(
            check(with("fare_amount", "$12")),
            Err(RejectReason::InvalidFloat("fare_amount"))
        );
    }

    #[test]
    fn test_integer_conversion_precedes_invariants() {
        // Both a bad vendor and an inverted time range: the conversion is reported
        let mut row = with("vendor_id", "x");
        row[3] = "2016-03-14 17:00:00".to_string();
        assert_eq!(check(row), Err(RejectReason::InvalidInteger("vendor_id")));
    }

    #[test]
    fn test_missing_column_is_reject() {
        let header = Header::new(["id", "vendor_id"]);
        let raw = RawRecord::new(&header, StringRecord::from(vec!["id1", "1"]));
        assert_eq!(
            RecordValidator::default().validate(&raw),
            Err(RejectReason::MissingField("passenger_count"))
        );
    }
}

//! Derived trip features

use crate::models::{RawRecord, TripCandidate, TripRecord};
use chrono::Timelike;

/// Column holding the trip distance in kilometres when the feed does not say otherwise.
pub const DEFAULT_DISTANCE_COLUMN: &str = "trip_distance";

/// Pickup hours counted as rush hour: [7, 10) and [17, 20).
const RUSH_HOURS: [std::ops::Range<u32>; 2] = [7..10, 17..20];

/// Computes speed, fare-per-km and the rush-hour flag for accepted records.
#[derive(Debug, Clone)]
pub struct FeatureDeriver {
    distance_column: String,
}

impl Default for FeatureDeriver {
    fn default() -> Self {
        Self::new(DEFAULT_DISTANCE_COLUMN)
    }
}

impl FeatureDeriver {
    pub fn new(distance_column: impl Into<String>) -> Self {
        Self {
            distance_column: distance_column.into(),
        }
    }

    /// Distance in km, read from the raw row without validation.
    /// Absent or unparsable values count as 0.0.
    pub fn distance_km(&self, raw: &RawRecord<'_>) -> f64 {
        raw.get(&self.distance_column)
            .and_then(|text| text.trim().parse::<f64>().ok())
            .unwrap_or(0.0)
    }

    pub fn derive(&self, candidate: TripCandidate, raw: &RawRecord<'_>) -> TripRecord {
        let distance_km = self.distance_km(raw);
        let trip_speed_km_hr = trip_speed_km_hr(distance_km, candidate.trip_duration);
        let fare_per_km = fare_per_km(candidate.fare_amount, distance_km);
        let is_rush_hour = is_rush_hour(candidate.pickup_datetime.hour());

        TripRecord {
            id: candidate.id,
            vendor_id: candidate.vendor_id,
            pickup_datetime: candidate.pickup_datetime,
            dropoff_datetime: candidate.dropoff_datetime,
            passenger_count: candidate.passenger_count,
            pickup_longitude: candidate.pickup_longitude,
            pickup_latitude: candidate.pickup_latitude,
            dropoff_longitude: candidate.dropoff_longitude,
            dropoff_latitude: candidate.dropoff_latitude,
            trip_duration: candidate.trip_duration,
            fare_amount: candidate.fare_amount,
            tip_amount: candidate.tip_amount,
            total_amount: candidate.total_amount,
            trip_speed_km_hr,
            fare_per_km,
            is_rush_hour,
        }
    }
}

/// km/h, or 0.0 unless both distance and duration are positive.
pub fn trip_speed_km_hr(distance_km: f64, trip_duration_secs: i32) -> f64 {
    let duration_hr = f64::from(trip_duration_secs) / 3600.0;
    if distance_km > 0.0 && duration_hr > 0.0 {
        distance_km / duration_hr
    } else {
        0.0
    }
}

pub fn fare_per_km(fare_amount: f64, distance_km: f64) -> f64 {
    if distance_km > 0.0 {
        fare_amount / distance_km
    } else {
        0.0
    }
}

/// Uses the recorded pickup hour as-is; no timezone conversion.
pub fn is_rush_hour(pickup_hour: u32) -> bool {
    RUSH_HOURS.iter().any(|window| window.contains(&pickup_hour))
}

//! Typed read queries over the trips table
//!
//! Every filter value is a bind parameter and the sort column comes from a
//! closed enum, so no caller-supplied text is ever spliced into SQL.

use crate::error::Result;
use crate::models::TripRecord;
use crate::schema::TRIPS_TABLE;
use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::str::FromStr;

pub const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortColumn {
    #[default]
    PickupDatetime,
    TripDuration,
    FareAmount,
    TripSpeed,
}

impl SortColumn {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortColumn::PickupDatetime => "pickup_datetime",
            SortColumn::TripDuration => "trip_duration",
            SortColumn::FareAmount => "fare_amount",
            SortColumn::TripSpeed => "trip_speed_km_hr",
        }
    }

    /// Unknown names fall back to the default column.
    pub fn parse_lenient(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }
}

impl FromStr for SortColumn {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pickup_datetime" => Ok(SortColumn::PickupDatetime),
            "trip_duration" => Ok(SortColumn::TripDuration),
            "fare_amount" => Ok(SortColumn::FareAmount),
            "trip_speed_km_hr" => Ok(SortColumn::TripSpeed),
            other => Err(format!("Unsupported sort column: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// Case-insensitive; anything other than `desc` is ascending.
    pub fn parse_lenient(text: &str) -> Self {
        if text.eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }
}

/// Optional predicates shared by listing and summary queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripFilter {
    pub vendor_id: Option<i32>,
    pub passenger_count: Option<i32>,
    pub is_rush_hour: Option<bool>,
    pub min_fare: Option<f64>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    /// Substring of the trip id or the pickup timestamp text
    pub search: Option<String>,
}

impl TripFilter {
    pub fn push_where(&self, query_builder: &mut QueryBuilder<'_, Postgres>) {
        query_builder.push(" WHERE TRUE");

        if let Some(vendor_id) = self.vendor_id {
            query_builder.push(" AND vendor_id = ").push_bind(vendor_id);
        }
        if let Some(passenger_count) = self.passenger_count {
            query_builder
                .push(" AND passenger_count = ")
                .push_bind(passenger_count);
        }
        if let Some(is_rush_hour) = self.is_rush_hour {
            query_builder.push(" AND is_rush_hour = ").push_bind(is_rush_hour);
        }
        if let Some(min_fare) = self.min_fare {
            query_builder
                .push(" AND (fare_amount >= ")
                .push_bind(min_fare)
                .push(" OR fare_amount IS NULL)");
        }
        if let Some(start) = self.start {
            query_builder.push(" AND pickup_datetime >= ").push_bind(start);
        }
        if let Some(end) = self.end {
            query_builder.push(" AND pickup_datetime <= ").push_bind(end);
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search);
            query_builder
                .push(" AND (id LIKE ")
                .push_bind(pattern.clone())
                .push(" OR CAST(pickup_datetime AS TEXT) LIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }
}

/// Filtered, sorted, paginated listing.
#[derive(Debug, Clone, PartialEq)]
pub struct TripQuery {
    pub filter: TripFilter,
    pub sort_by: SortColumn,
    pub sort_dir: SortDirection,
    pub limit: i64,
    pub offset: i64,
}

impl Default for TripQuery {
    fn default() -> Self {
        Self {
            filter: TripFilter::default(),
            sort_by: SortColumn::default(),
            sort_dir: SortDirection::default(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl TripQuery {
    pub fn build(&self) -> QueryBuilder<'_, Postgres> {
        let mut query_builder = QueryBuilder::new(format!("SELECT * FROM {}", TRIPS_TABLE));
        self.filter.push_where(&mut query_builder);
        query_builder
            .push(" ORDER BY ")
            .push(self.sort_by.as_sql())
            .push(" ")
            .push(self.sort_dir.as_sql())
            .push(" LIMIT ")
            .push_bind(self.limit.max(0))
            .push(" OFFSET ")
            .push_bind(self.offset.max(0));
        query_builder
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TripSummary {
    pub trip_count: i64,
    pub avg_duration: f64,
    pub avg_speed: f64,
    pub avg_fare: f64,
}

pub fn summary_query(filter: &TripFilter) -> QueryBuilder<'_, Postgres> {
    let mut query_builder = QueryBuilder::new(format!(
        "SELECT COUNT(*) AS trip_count, \
         AVG(trip_duration)::DOUBLE PRECISION AS avg_duration, \
         AVG(trip_speed_km_hr) AS avg_speed, \
         AVG(fare_amount) AS avg_fare \
         FROM {}",
        TRIPS_TABLE
    ));
    filter.push_where(&mut query_builder);
    query_builder
}

pub async fn fetch_trips(db: &PgPool, query: &TripQuery) -> Result<Vec<TripRecord>> {
    let mut query_builder = query.build();
    let trips = query_builder
        .build_query_as::<TripRecord>()
        .fetch_all(db)
        .await?;
    Ok(trips)
}

/// Aggregates over the filtered rows; zeros when nothing matches.
pub async fn fetch_summary(db: &PgPool, filter: &TripFilter) -> Result<TripSummary> {
    let mut query_builder = summary_query(filter);
    let (trip_count, avg_duration, avg_speed, avg_fare): (
        i64,
        Option<f64>,
        Option<f64>,
        Option<f64>,
    ) = query_builder.build_query_as().fetch_one(db).await?;

    Ok(TripSummary {
        trip_count,
        avg_duration: avg_duration.unwrap_or(0.0),
        avg_speed: avg_speed.unwrap_or(0.0),
        avg_fare: avg_fare.unwrap_or(0.0),
    })
}

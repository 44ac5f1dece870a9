//! Append-only CSV sinks for one cleaning pass
//!
//! [`RejectSink`] keeps the audit trail: rejected rows field-for-field as read,
//! under the feed header. [`AcceptedSink`] writes the enriched file: feed
//! columns followed by the derived columns.

use crate::error::{IngestError, Result};
use crate::models::{columns, Header, RawRecord, TripRecord};
use csv::{ByteRecord, Writer, WriterBuilder};
use std::fs::File;
use std::io::Write;
use std::path::Path;

fn create_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| IngestError::Open {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    File::create(path).map_err(|source| IngestError::Open {
        path: path.to_path_buf(),
        source,
    })
}

fn csv_writer<W: Write>(inner: W) -> Writer<W> {
    // Rejected rows may be ragged; they are written as they came
    WriterBuilder::new().flexible(true).from_writer(inner)
}

pub struct RejectSink<W: Write> {
    writer: Writer<W>,
    written: u64,
}

impl RejectSink<File> {
    pub fn create(path: &Path, header: &Header) -> Result<Self> {
        Self::from_writer(create_file(path)?, header)
    }
}

impl<W: Write> RejectSink<W> {
    pub fn from_writer(inner: W, header: &Header) -> Result<Self> {
        let mut writer = csv_writer(inner);
        writer.write_record(header.names())?;
        Ok(Self { writer, written: 0 })
    }

    pub fn write(&mut self, raw: &RawRecord<'_>) -> Result<()> {
        self.writer.write_record(raw.values())?;
        self.written += 1;
        Ok(())
    }

    /// Write a row that could not be decoded as text.
    pub fn write_bytes(&mut self, values: &ByteRecord) -> Result<()> {
        self.writer.write_byte_record(values)?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush and hand back the underlying writer.
    pub fn finish(self) -> Result<W> {
        self.writer.into_inner().map_err(|err| {
            IngestError::Io(std::io::Error::new(err.error().kind(), err.to_string()))
        })
    }
}

pub struct AcceptedSink<W: Write> {
    writer: Writer<W>,
    feed_columns: Vec<String>,
    written: u64,
}

impl AcceptedSink<File> {
    pub fn create(path: &Path, feed_header: &Header) -> Result<Self> {
        Self::from_writer(create_file(path)?, feed_header)
    }
}

impl<W: Write> AcceptedSink<W> {
    pub fn from_writer(inner: W, feed_header: &Header) -> Result<Self> {
        let mut writer = csv_writer(inner);
        writer.write_record(feed_header.enriched().names())?;
        Ok(Self {
            writer,
            feed_columns: feed_header.names().to_vec(),
            written: 0,
        })
    }

    /// Write typed values for the columns the record owns, raw text for the
    /// rest, then the derived columns.
    pub fn write(&mut self, trip: &TripRecord, raw: &RawRecord<'_>) -> Result<()> {
        let mut row: Vec<String> = Vec::with_capacity(self.feed_columns.len() + 3);
        for column in &self.feed_columns {
            let value = trip
                .field_text(column)
                .or_else(|| raw.get(column).map(str::to_string))
                .unwrap_or_default();
            row.push(value);
        }
        for column in columns::DERIVED {
            row.push(trip.field_text(column).unwrap_or_default());
        }

        self.writer.write_record(&row)?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn finish(self) -> Result<W> {
        self.writer.into_inner().map_err(|err| {
            IngestError::Io(std::io::Error::new(err.error().kind(), err.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureDeriver;
    use crate::validator::RecordValidator;
    use csv::StringRecord;

    fn header() -> Header {
        Header::new([
            "id",
            "vendor_id",
            "pickup_datetime",
            "dropoff_datetime",
            "passenger_count",
            "pickup_longitude",
            "pickup_latitude",
            "dropoff_longitude",
            "dropoff_latitude",
            "store_and_fwd_flag",
            "trip_duration",
            "trip_distance",
        ])
    }

    #[test]
    fn test_reject_sink_writes_rows_verbatim() {
        let header = header();
        let mut sink = RejectSink::from_writer(Vec::new(), &header).unwrap();
        let raw = RawRecord::new(
            &header,
            StringRecord::from(vec!["id1", " 2 ", "not a date", "", "0"]),
        );
        sink.write(&raw).unwrap();
        assert_eq!(sink.written(), 1);

        let out = String::from_utf8(sink.finish().unwrap()).unwrap();
        let mut lines = out.lines();
        assert!(lines.next().unwrap().starts_with("id,vendor_id,pickup_datetime"));
        assert_eq!(lines.next().unwrap(), "id1, 2 ,not a date,,0");
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_reject_sink_keeps_fields_not_quoting() {
        let header = Header::new(["id", "vendor_id", "passenger_count"]);
        let feed = "id,vendor_id,passenger_count\n\"id1\",\"1\",\"0\"\n";
        let mut reader = csv::Reader::from_reader(feed.as_bytes());
        let values = reader.records().next().unwrap().unwrap();

        let mut sink = RejectSink::from_writer(Vec::new(), &header).unwrap();
        sink.write(&RawRecord::new(&header, values)).unwrap();

        let out = String::from_utf8(sink.finish().unwrap()).unwrap();
        assert_eq!(out.lines().nth(1), Some("id1,1,0"));
    }

    #[test]
    fn test_accepted_sink_keeps_passthrough_and_appends_derived() {
        let header = header();
        let raw = RawRecord::new(
            &header,
            StringRecord::from(vec![
                "id7",
                "1",
                "2016-06-12 08:15:00",
                "2016-06-12 08:45:00",
                "2",
                "-73.99",
                "40.75",
                "-73.95",
                "40.78",
                "N",
                "1800",
                "10",
            ]),
        );
        let candidate = RecordValidator::default().validate(&raw).unwrap();
        let trip = FeatureDeriver::default().derive(candidate, &raw);

        let mut sink = AcceptedSink::from_writer(Vec::new(), &header).unwrap();
        sink.write(&trip, &raw).unwrap();
        let out = String::from_utf8(sink.finish().unwrap()).unwrap();

        let mut reader = csv::Reader::from_reader(out.as_bytes());
        let names: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(names.len(), 15);
        assert_eq!(&names[12..], &["trip_speed_km_hr", "fare_per_km", "is_rush_hour"]);

        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[9], "N", "unowned column passes through");
        assert_eq!(&row[11], "10");
        assert_eq!(row[12].parse::<f64>().unwrap(), 20.0);
        assert_eq!(row[13].parse::<f64>().unwrap(), 0.0);
        assert_eq!(&row[14], "true");
    }
}

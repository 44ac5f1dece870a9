//! Validation and enrichment pass
//!
//! Reads the raw feed once, in order, and routes every record to exactly one
//! of the two sinks. Rejects are not errors: they are counted by reason and
//! written verbatim to the reject log.

use crate::error::{IngestError, Result};
use crate::features::FeatureDeriver;
use crate::models::{Header, RawRecord};
use crate::sinks::{AcceptedSink, RejectSink};
use crate::validator::{RecordValidator, RejectReason};
use csv::{ByteRecord, ReaderBuilder, StringRecord};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Outcome of one cleaning pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanStats {
    pub records_read: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub reasons: BTreeMap<RejectReason, u64>,
}

impl CleanStats {
    fn record_reject(&mut self, reason: RejectReason) {
        self.rejected += 1;
        *self.reasons.entry(reason).or_insert(0) += 1;
    }

    /// Rejections for one reason
    pub fn rejected_for(&self, reason: RejectReason) -> u64 {
        self.reasons.get(&reason).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Cleaner {
    validator: RecordValidator,
    deriver: FeatureDeriver,
}

impl Cleaner {
    pub fn new(validator: RecordValidator, deriver: FeatureDeriver) -> Self {
        Self { validator, deriver }
    }

    /// Clean the feed at `raw_path`, writing the enriched file and the reject log.
    ///
    /// The input is opened before either output is created, so a missing feed
    /// leaves previous outputs untouched.
    #[instrument(skip(self), fields(raw = %raw_path.display()))]
    pub fn run(&self, raw_path: &Path, cleaned_path: &Path, reject_path: &Path) -> Result<CleanStats> {
        let input = File::open(raw_path).map_err(|source| IngestError::Open {
            path: raw_path.to_path_buf(),
            source,
        })?;

        let mut reader = ReaderBuilder::new().flexible(true).from_reader(input);
        let header = Header::from_record(reader.headers()?);
        let accepted = AcceptedSink::create(cleaned_path, &header)?;
        let rejects = RejectSink::create(reject_path, &header)?;

        let stats = self.pass(&mut reader, &header, accepted, rejects)?;

        info!(
            records_read = stats.records_read,
            accepted = stats.accepted,
            rejected = stats.rejected,
            cleaned = %cleaned_path.display(),
            rejects = %reject_path.display(),
            "Cleaning pass complete"
        );
        for (reason, count) in &stats.reasons {
            info!(reason = %reason, count, "Rejected records");
        }

        Ok(stats)
    }

    /// Clean from arbitrary reader/writers; used by [`Cleaner::run`] and tests.
    pub fn clean<R, A, J>(&self, input: R, accepted: A, rejects: J) -> Result<(CleanStats, A, J)>
    where
        R: Read,
        A: Write,
        J: Write,
    {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(input);
        let header = Header::from_record(reader.headers()?);
        let accepted = AcceptedSink::from_writer(accepted, &header)?;
        let rejects = RejectSink::from_writer(rejects, &header)?;

        let mut stats = CleanStats::default();
        let (accepted, rejects) =
            self.route_all(&mut reader, &header, accepted, rejects, &mut stats)?;
        Ok((stats, accepted.finish()?, rejects.finish()?))
    }

    fn pass<R: Read, A: Write, J: Write>(
        &self,
        reader: &mut csv::Reader<R>,
        header: &Header,
        accepted: AcceptedSink<A>,
        rejects: RejectSink<J>,
    ) -> Result<CleanStats> {
        let mut stats = CleanStats::default();
        let (accepted, rejects) = self.route_all(reader, header, accepted, rejects, &mut stats)?;
        accepted.finish()?;
        rejects.finish()?;
        Ok(stats)
    }

    fn route_all<R: Read, A: Write, J: Write>(
        &self,
        reader: &mut csv::Reader<R>,
        header: &Header,
        mut accepted: AcceptedSink<A>,
        mut rejects: RejectSink<J>,
        stats: &mut CleanStats,
    ) -> Result<(AcceptedSink<A>, RejectSink<J>)> {
        let mut bytes = ByteRecord::new();
        while reader.read_byte_record(&mut bytes)? {
            stats.records_read += 1;

            let values = match StringRecord::from_byte_record(bytes.clone()) {
                Ok(values) => values,
                Err(_) => {
                    let line = bytes.position().map(|p| p.line());
                    debug!(?line, reason = %RejectReason::InvalidEncoding, "Rejected record");
                    rejects.write_bytes(&bytes)?;
                    stats.record_reject(RejectReason::InvalidEncoding);
                    continue;
                },
            };
            let raw = RawRecord::new(header, values);

            match self.validator.validate(&raw) {
                Ok(candidate) => {
                    let trip = self.deriver.derive(candidate, &raw);
                    accepted.write(&trip, &raw)?;
                    stats.accepted += 1;
                },
                Err(reason) => {
                    debug!(line = ?raw.line(), id = ?raw.get("id"), %reason, "Rejected record");
                    rejects.write(&raw)?;
                    stats.record_reject(reason);
                },
            }
        }

        Ok((accepted, rejects))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = "\
id,vendor_id,pickup_datetime,dropoff_datetime,passenger_count,pickup_longitude,pickup_latitude,dropoff_longitude,dropoff_latitude,store_and_fwd_flag,trip_duration,trip_distance
id1,2,2016-03-14 17:24:55,2016-03-14 17:00:00,1,-73.98,40.76,-73.96,40.76,N,455,3.1
id2,1,2016-06-12 00:43:35,2016-06-12 01:13:35,1,-73.98,40.73,-73.99,40.72,N,1800,10
id3,2,2016-01-19 11:35:24,2016-01-19 12:10:48,0,-73.97,40.76,-74.00,40.71,N,2124,6.0
";

    #[test]
    fn test_three_row_feed_routes_one_accept_two_rejects() {
        let (stats, accepted, rejects) = Cleaner::default()
            .clean(FEED.as_bytes(), Vec::new(), Vec::new())
            .unwrap();

        assert_eq!(stats.records_read, 3);
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.rejected, 2);
        assert_eq!(stats.rejected_for(RejectReason::DropoffNotAfterPickup), 1);
        assert_eq!(stats.rejected_for(RejectReason::NoPassengers), 1);

        let accepted = String::from_utf8(accepted).unwrap();
        let mut reader = csv::Reader::from_reader(accepted.as_bytes());
        let rows: Vec<StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(&rows[0][0], "id2");
        assert_eq!(rows[0][12].parse::<f64>().unwrap(), 20.0);
        assert_eq!(&rows[0][14], "false");

        let rejects = String::from_utf8(rejects).unwrap();
        let lines: Vec<&str> = rejects.lines().collect();
        assert_eq!(lines.len(), 3, "header plus two rejects");
        assert_eq!(lines[0], FEED.lines().next().unwrap());
        assert_eq!(lines[1], FEED.lines().nth(1).unwrap(), "reject kept verbatim");
        assert_eq!(lines[2], FEED.lines().nth(3).unwrap());
    }

    #[test]
    fn test_undecodable_row_is_rejected_and_pass_continues() {
        let mut lines = FEED.lines();
        let header = lines.next().unwrap();
        let valid = lines.nth(1).unwrap();

        let renamed = valid.replacen("id2", "id4", 1);
        let (before, after) = renamed.split_once(",N,").unwrap();
        let mut bad_bytes = before.as_bytes().to_vec();
        bad_bytes.extend_from_slice(b",\xff,");
        bad_bytes.extend_from_slice(after.as_bytes());

        let mut feed: Vec<u8> = Vec::new();
        for line in [header.as_bytes(), valid.as_bytes(), bad_bytes.as_slice()] {
            feed.extend_from_slice(line);
            feed.push(b'\n');
        }
        feed.extend_from_slice(valid.replacen("id2", "id5", 1).as_bytes());
        feed.push(b'\n');

        let (stats, accepted, rejects) = Cleaner::default()
            .clean(feed.as_slice(), Vec::new(), Vec::new())
            .unwrap();

        assert_eq!(stats.records_read, 3);
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.rejected_for(RejectReason::InvalidEncoding), 1);

        let accepted = String::from_utf8(accepted).unwrap();
        let ids: Vec<&str> = accepted.lines().skip(1).map(|l| &l[..3]).collect();
        assert_eq!(ids, vec!["id2", "id5"]);

        let reject_row = rejects.split(|b| *b == b'\n').nth(1).unwrap();
        assert_eq!(reject_row, bad_bytes.as_slice(), "undecodable row kept as read");
    }

    #[test]
    fn test_short_rows_are_rejected_not_fatal() {
        let feed = "id,vendor_id,pickup_datetime\nid1,1\n";
        let (stats, _, rejects) = Cleaner::default()
            .clean(feed.as_bytes(), Vec::new(), Vec::new())
            .unwrap();

        assert_eq!(stats.rejected, 1);
        assert_eq!(String::from_utf8(rejects).unwrap().lines().nth(1), Some("id1,1"));
    }
}

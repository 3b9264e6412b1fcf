//! Reporting of cycle outcomes and matched vehicles.
//!
//! Supports human-oriented log lines and newline-delimited JSON.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::cycle::CycleReport;
use crate::filter::VehicleMatch;

/// Receives one status per cycle plus one record per matched vehicle.
pub trait Reporter {
    fn cycle(&mut self, report: &CycleReport);

    fn vehicle(&mut self, found: &VehicleMatch);
}

impl<R: Reporter + ?Sized> Reporter for Box<R> {
    fn cycle(&mut self, report: &CycleReport) {
        (**self).cycle(report)
    }

    fn vehicle(&mut self, found: &VehicleMatch) {
        (**self).vehicle(found)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Log lines on stderr
    #[default]
    Log,
    /// One JSON object per line on stdout
    Json,
}

pub fn reporter_for(format: OutputFormat) -> Box<dyn Reporter> {
    match format {
        OutputFormat::Log => Box::new(LogReporter),
        OutputFormat::Json => Box::new(JsonReporter::stdout()),
    }
}

/// Reports through `tracing`.
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn cycle(&mut self, report: &CycleReport) {
        match report {
            CycleReport::Matched {
                route_id,
                matches,
                tally,
                feed_timestamp,
            } => info!(
                route_id = %route_id,
                matches,
                entities = tally.entities,
                vehicles = tally.vehicles,
                feed_timestamp,
                "Found {matches} vehicle(s) on route {route_id} this cycle"
            ),
            CycleReport::Disconnected => warn!("Network disconnected, fetch skipped"),
            CycleReport::FetchFailed {
                status: Some(status),
                reason,
            } => warn!(status, %reason, "Feed request failed"),
            CycleReport::FetchFailed {
                status: None,
                reason,
            } => warn!(%reason, "Feed request failed"),
            CycleReport::DecodeFailed { reason } => error!(%reason, "Feed decoding failed"),
        }
    }

    fn vehicle(&mut self, found: &VehicleMatch) {
        info!(
            entity_id = %found.entity_id,
            vehicle_id = found.vehicle_id.as_deref().unwrap_or("-"),
            latitude = found.position.map(|p| p.latitude),
            longitude = found.position.map(|p| p.longitude),
            "Vehicle on route"
        );
    }
}

#[derive(Serialize)]
struct Line<'a, T> {
    time: DateTime<Utc>,
    kind: &'static str,
    #[serde(flatten)]
    record: &'a T,
}

/// Writes newline-delimited JSON records.
pub struct JsonReporter<W> {
    out: W,
}

impl JsonReporter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit<T: Serialize>(&mut self, kind: &'static str, record: &T) {
        let line = Line {
            time: Utc::now(),
            kind,
            record,
        };
        if let Err(e) = self.write_line(&line) {
            error!(error = %e, kind, "Failed to write JSON record");
        }
    }

    fn write_line<T: Serialize>(&mut self, line: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, line)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn cycle(&mut self, report: &CycleReport) {
        self.emit("cycle", report);
    }

    fn vehicle(&mut self, found: &VehicleMatch) {
        self.emit("vehicle", found);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Coordinates;
    use crate::stats::FeedTally;
    use serde_json::Value;

    fn lines(reporter: JsonReporter<Vec<u8>>) -> Vec<Value> {
        let out = String::from_utf8(reporter.into_inner()).unwrap();
        out.lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_log_reporter_does_not_panic() {
        let mut reporter = LogReporter;
        reporter.cycle(&CycleReport::Disconnected);
        reporter.cycle(&CycleReport::FetchFailed {
            status: Some(503),
            reason: "Service Unavailable".to_string(),
        });
        reporter.vehicle(&VehicleMatch {
            entity_id: "e".to_string(),
            vehicle_id: None,
            position: None,
        });
    }

    #[test]
    fn test_json_cycle_record() {
        let mut reporter = JsonReporter::new(Vec::new());
        reporter.cycle(&CycleReport::Matched {
            route_id: "25".to_string(),
            matches: 2,
            tally: FeedTally {
                entities: 3,
                matched: 2,
                ..Default::default()
            },
            feed_timestamp: Some(1_700_000_000),
        });
        reporter.cycle(&CycleReport::Disconnected);

        let lines = lines(reporter);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["kind"], "cycle");
        assert_eq!(lines[0]["status"], "matched");
        assert_eq!(lines[0]["matches"], 2);
        assert_eq!(lines[0]["tally"]["entities"], 3);
        assert!(lines[0]["time"].is_string());
        assert_eq!(lines[1]["status"], "disconnected");
    }

    #[test]
    fn test_json_vehicle_record() {
        let mut reporter = JsonReporter::new(Vec::new());
        reporter.vehicle(&VehicleMatch {
            entity_id: "e1".to_string(),
            vehicle_id: Some("9401".to_string()),
            position: Some(Coordinates {
                latitude: 49.5,
                longitude: -123.25,
            }),
        });

        let lines = lines(reporter);
        assert_eq!(lines[0]["kind"], "vehicle");
        assert_eq!(lines[0]["vehicle_id"], "9401");
        assert_eq!(lines[0]["position"]["latitude"], 49.5);
        assert_eq!(lines[0]["position"]["longitude"], -123.25);
    }

    #[test]
    fn test_json_failure_records() {
        let mut reporter = JsonReporter::new(Vec::new());
        reporter.cycle(&CycleReport::FetchFailed {
            status: Some(503),
            reason: "Service Unavailable".to_string(),
        });
        reporter.cycle(&CycleReport::DecodeFailed {
            reason: "stream ended".to_string(),
        });

        let lines = lines(reporter);
        assert_eq!(lines[0]["status"], "fetch_failed");
        assert_eq!(lines[0]["status_code"], 503);
        assert_eq!(lines[1]["status"], "decode_failed");
        assert_eq!(lines[1]["reason"], "stream ended");
    }
}

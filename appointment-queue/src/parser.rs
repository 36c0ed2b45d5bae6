use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Utc};
use csv::{Reader, StringRecord};
use serde::Deserialize;

use crate::lifecycle::BookingRequest;

/// One raw row of an event log:
/// `action,appointment,patient,hospital,department,title,time,status`
#[derive(Debug, Deserialize)]
struct EventRow {
    action: String,
    appointment: Option<u64>,
    patient: Option<u64>,
    hospital: Option<u64>,
    department: Option<u64>,
    title: Option<String>,
    time: Option<String>,
    status: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ReplayEvent {
    Book {
        line: u64,
        request: BookingRequest,
    },
    Status {
        line: u64,
        appointment_id: u64,
        hospital_id: u64,
        status: String,
    },
}

impl ReplayEvent {
    pub fn line(&self) -> u64 {
        match self {
            ReplayEvent::Book { line, .. } | ReplayEvent::Status { line, .. } => *line,
        }
    }
}

/// A row that could not be parsed or applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIssue {
    pub line: u64,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct EventLog {
    pub events: Vec<ReplayEvent>,
    pub rejected: Vec<RowIssue>,
}

/// Blank time cells stay missing; anything else must be RFC 3339.
fn parse_time(value: Option<String>) -> Result<Option<DateTime<Utc>>, String> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| format!("invalid time '{}': {}", raw, e)),
    }
}

fn parse_row(record: &StringRecord, headers: &StringRecord, line: u64) -> Result<ReplayEvent, String> {
    let row: EventRow = record
        .deserialize(Some(headers))
        .map_err(|e| e.to_string())?;

    match row.action.trim().to_lowercase().as_str() {
        "book" => Ok(ReplayEvent::Book {
            line,
            request: BookingRequest {
                patient_id: row.patient,
                hospital_id: row.hospital,
                department_id: row.department,
                title: row.title,
                time: parse_time(row.time)?,
            },
        }),
        "status" => {
            let appointment_id = row.appointment.ok_or("status event without appointment id")?;
            let hospital_id = row.hospital.ok_or("status event without hospital id")?;
            let status = row
                .status
                .filter(|s| !s.trim().is_empty())
                .ok_or("status event without status")?;
            Ok(ReplayEvent::Status { line, appointment_id, hospital_id, status })
        }
        other => Err(format!("unknown action '{}'", other)),
    }
}

/// Reads an event log. Bad rows are collected in `rejected` instead of
/// aborting the load.
pub fn read_events<R: Read>(input: R) -> Result<EventLog, csv::Error> {
    let mut reader = Reader::from_reader(input);
    let headers = reader.headers()?.clone();
    let mut log = EventLog::default();

    for (idx, result) in reader.records().enumerate() {
        // header is line 1
        let line = idx as u64 + 2;
        let parsed = result
            .map_err(|e| e.to_string())
            .and_then(|record| parse_row(&record, &headers, line));
        match parsed {
            Ok(event) => log.events.push(event),
            Err(message) => log.rejected.push(RowIssue { line, message }),
        }
    }

    Ok(log)
}

pub fn load_events<P: AsRef<Path>>(path: P) -> Result<EventLog, csv::Error> {
    let file = std::fs::File::open(path)?;
    read_events(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOG: &str = "\
action,appointment,patient,hospital,department,title,time,status
book,,5,1,10,Checkup,2026-10-20T09:00:00Z,
book,,6,1,10,X-ray,,
status,1,,1,,,,Confirmed
teleport,,,,,,,
status,2,,1,,,,
book,,7,1,10,Scan,yesterday,
";

    #[test]
    fn parses_book_and_status_rows() {
        let log = read_events(LOG.as_bytes()).unwrap();
        assert_eq!(log.events.len(), 3);

        match &log.events[0] {
            ReplayEvent::Book { line, request } => {
                assert_eq!(*line, 2);
                assert_eq!(request.patient_id, Some(5));
                assert!(request.time.is_some());
            }
            other => panic!("unexpected event {:?}", other),
        }
        // a blank time is left for booking validation to reject
        match &log.events[1] {
            ReplayEvent::Book { request, .. } => assert!(request.time.is_none()),
            other => panic!("unexpected event {:?}", other),
        }
        match &log.events[2] {
            ReplayEvent::Status { appointment_id, hospital_id, status, .. } => {
                assert_eq!((*appointment_id, *hospital_id), (1, 1));
                assert_eq!(status, "Confirmed");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn bad_rows_are_reported_with_line_numbers() {
        let log = read_events(LOG.as_bytes()).unwrap();
        let lines: Vec<u64> = log.rejected.iter().map(|r| r.line).collect();
        assert_eq!(lines, vec![5, 6, 7]);
        assert!(log.rejected[0].message.contains("unknown action"));
        assert!(log.rejected[2].message.contains("invalid time"));
    }
}

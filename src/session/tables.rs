//! Tabular views of a record for inspection

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};

use super::types::{Payload, RecordedSample, SessionRecord, SESSION_START_EVENT};
use crate::types::{CoordinateSpace, PointerEventKind};
use crate::value::Value;

/// Epoch numbers above this are milliseconds (2000-01-01 in ms)
const MILLIS_THRESHOLD: f64 = 946_684_800_000.0;

const EVENT_DETAIL_WIDTH: usize = 100;
const SAMPLE_VALUE_WIDTH: usize = 50;

/// One structured event
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
    pub relative_time: f64,
    pub stream_name: String,
    pub event_type: String,
    /// Wall-clock time from the event's own `timestamp` field
    pub wall_clock: Option<DateTime<Utc>>,
    /// The event's `data` field, or null
    pub data: Value,
}

impl EventRow {
    pub fn is_session_start(&self) -> bool {
        self.event_type == SESSION_START_EVENT
    }

    /// Short human-readable summary of the payload
    pub fn details(&self) -> String {
        if self.is_session_start() {
            return "Session began".to_string();
        }
        truncate(&self.data.encode(), EVENT_DETAIL_WIDTH)
    }
}

/// One row of the sample table
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRow {
    pub relative_time: f64,
    pub stream_name: String,
    pub channel: String,
    pub value: String,
}

/// Structured events with a `type`, sorted by relative time
pub fn event_rows(record: &SessionRecord) -> Vec<EventRow> {
    let mut rows: Vec<EventRow> = record
        .samples
        .iter()
        .filter(|s| s.stream.kind.is_event())
        .filter_map(|sample| {
            let Payload::Event(value) = sample.payload() else {
                return None;
            };
            let event_type = value.event_type()?.to_string();
            Some(EventRow {
                relative_time: sample.relative_time,
                stream_name: sample.stream.name.clone(),
                event_type,
                wall_clock: value.get("timestamp").and_then(parse_wall_clock),
                data: value.get("data").cloned().unwrap_or_default(),
            })
        })
        .collect();
    rows.sort_by(|a, b| a.relative_time.total_cmp(&b.relative_time));
    rows
}

/// First `limit` samples in arrival order
pub fn sample_rows(record: &SessionRecord, limit: usize) -> Vec<SampleRow> {
    record.samples.iter().take(limit).map(sample_row).collect()
}

/// Table row for one sample
pub fn sample_row(sample: &RecordedSample) -> SampleRow {
    let (channel, value) = if sample.stream.is_pointer() {
        let value = match sample.data.as_numeric() {
            Some(values) if values.len() >= 2 => describe_pointer(sample, values),
            _ => truncate(&sample.data.to_json().to_string(), SAMPLE_VALUE_WIDTH),
        };
        ("Pointer".to_string(), value)
    } else {
        match sample.payload() {
            Payload::Event(value) => (
                "Event".to_string(),
                truncate(&value.encode(), SAMPLE_VALUE_WIDTH),
            ),
            Payload::Numeric(values) => match values.first() {
                Some(first) => ("Ch 0".to_string(), first.to_string()),
                None => ("N/A".to_string(), "N/A".to_string()),
            },
            Payload::Raw(values) => match values.first() {
                Some(first) => ("Ch 0".to_string(), truncate(first, SAMPLE_VALUE_WIDTH)),
                None => ("N/A".to_string(), "N/A".to_string()),
            },
        }
    };

    SampleRow {
        relative_time: sample.relative_time,
        stream_name: sample.stream.name.clone(),
        channel,
        value,
    }
}

fn describe_pointer(sample: &RecordedSample, values: &[f64]) -> String {
    let (x, y) = (values[0], values[1]);
    let kind = match values.get(2) {
        Some(code) => PointerEventKind::from_code(*code)
            .map(|k| k.label().to_string())
            .unwrap_or_else(|| format!("unknown({})", code)),
        None => PointerEventKind::Position.label().to_string(),
    };
    let space = match sample.stream.coordinate_space() {
        Some(CoordinateSpace::Absolute) => CoordinateSpace::Absolute,
        _ => CoordinateSpace::classify(x, y),
    };
    match space {
        CoordinateSpace::Normalized => format!("({:.3}, {:.3}) - {}", x, y, kind),
        CoordinateSpace::Absolute => format!("({:.0}, {:.0}) - {}", x, y, kind),
    }
}

/// Parse an event timestamp: ISO-8601 text, or epoch seconds/milliseconds
pub fn parse_wall_clock(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
                return Some(parsed.with_timezone(&Utc));
            }
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        }
        Value::Number(n) if n.is_finite() && *n > 0.0 => {
            let millis = if *n > MILLIS_THRESHOLD { *n } else { *n * 1000.0 };
            Utc.timestamp_millis_opt(millis.round() as i64).single()
        }
        _ => None,
    }
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

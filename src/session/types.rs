//! Session data types

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{ChannelData, PointerEventKind, StreamDescriptor, WindowReference};
use crate::value::Value;

/// Event type the screen-capture collaborator emits when video starts
pub const VIDEO_START_EVENT: &str = "video_start";

/// Event type marking the start of a capture session
pub const SESSION_START_EVENT: &str = "session_start";

/// Event type requesting the end of a capture session
pub const SESSION_END_EVENT: &str = "session_end";

/// Lifecycle state of the session recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderState {
    /// No recording started yet
    #[default]
    Idle,
    /// Inlets are open and ticks append samples
    Recording,
    /// Inlets released; the record is final
    Stopped,
}

impl RecorderState {
    pub fn is_recording(&self) -> bool {
        matches!(self, RecorderState::Recording)
    }

    /// Display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            RecorderState::Idle => "Idle",
            RecorderState::Recording => "Recording",
            RecorderState::Stopped => "Stopped",
        }
    }
}

/// Decoded view of a recorded sample's channel values
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Structured event decoded from JSON text
    Event(Value),
    Numeric(Vec<f64>),
    /// Text that did not decode as JSON
    Raw(Vec<String>),
}

impl Payload {
    /// Decode channel values. A single text channel holding JSON becomes an
    /// event; other text stays raw.
    pub fn decode(data: &ChannelData) -> Self {
        match data {
            ChannelData::Numeric(values) => Payload::Numeric(values.clone()),
            ChannelData::Text(values) => match values.as_slice() {
                [single] => match Value::parse(single) {
                    Ok(value) => Payload::Event(value),
                    Err(_) => Payload::Raw(values.clone()),
                },
                _ => Payload::Raw(values.clone()),
            },
        }
    }

    /// Payload as persisted in the `data` field
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Payload::Event(value) => serde_json::Value::from(value.clone()),
            Payload::Numeric(values) => ChannelData::Numeric(values.clone()).to_json(),
            Payload::Raw(values) => ChannelData::Text(values.clone()).to_json(),
        }
    }

    /// The event's `type` field, for structured events
    pub fn event_type(&self) -> Option<&str> {
        match self {
            Payload::Event(value) => value.event_type(),
            _ => None,
        }
    }
}

/// One sample as captured by the recorder
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSample {
    /// Producer-clock timestamp
    pub timestamp: f64,
    /// `timestamp - session_start_timestamp`
    pub relative_time: f64,
    /// Position of the stream in [`SessionRecord::streams`]
    pub stream_index: usize,
    pub stream: Arc<StreamDescriptor>,
    /// Raw channel values
    pub data: ChannelData,
    /// `local_clock - producer_clock` measured at pull time; `None` when unknown
    pub clock_offset: Option<f64>,
    /// Local clock reading when the sample was pulled
    pub local_time_when_recorded: Option<f64>,
}

impl RecordedSample {
    pub fn stream_name(&self) -> &str {
        &self.stream.name
    }

    /// Decoded payload
    pub fn payload(&self) -> Payload {
        Payload::decode(&self.data)
    }

    /// Relative time moved into the local clock domain.
    ///
    /// `None` when the offset is unknown; such samples take no part in
    /// cross-device alignment.
    pub fn aligned_relative_time(&self) -> Option<f64> {
        self.clock_offset.map(|offset| self.relative_time + offset)
    }

    /// Pointer position, for pointer samples or events carrying `mouse_position`
    pub fn position(&self) -> Option<(f64, f64)> {
        match &self.data {
            ChannelData::Numeric(values) if values.len() >= 2 => Some((values[0], values[1])),
            ChannelData::Numeric(_) => None,
            ChannelData::Text(_) => {
                let Payload::Event(value) = self.payload() else {
                    return None;
                };
                match value.get("mouse_position")? {
                    Value::List(items) if items.len() >= 2 => {
                        Some((items[0].as_f64()?, items[1].as_f64()?))
                    }
                    _ => None,
                }
            }
        }
    }

    /// Pointer event kind carried in the third channel
    pub fn pointer_kind(&self) -> Option<PointerEventKind> {
        if !self.stream.is_pointer() {
            return None;
        }
        self.data
            .as_numeric()
            .and_then(|values| values.get(2))
            .and_then(|code| PointerEventKind::from_code(*code))
    }
}

/// Everything captured in one session
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionRecord {
    pub session_id: String,
    pub streams: Vec<Arc<StreamDescriptor>>,
    /// Local clock reading at recording start
    pub session_start_timestamp: f64,
    /// Samples in arrival order
    pub samples: Vec<RecordedSample>,
    /// When the session was recorded
    pub recorded_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Reference window pointer positions were normalized against
    pub capture_reference: Option<WindowReference>,
}

impl SessionRecord {
    pub fn new(session_id: impl Into<String>, session_start_timestamp: f64) -> Self {
        Self {
            session_id: session_id.into(),
            session_start_timestamp,
            recorded_at: Some(chrono::Utc::now()),
            ..Default::default()
        }
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest relative time, never negative
    pub fn duration(&self) -> f64 {
        self.samples
            .iter()
            .map(|s| s.relative_time)
            .filter(|t| t.is_finite())
            .fold(0.0, f64::max)
    }

    /// Index of the first stream with this name
    pub fn stream_index(&self, name: &str) -> Option<usize> {
        self.streams.iter().position(|s| s.name == name)
    }

    /// Samples of one stream, in arrival order
    pub fn stream_samples<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a RecordedSample> + 'a {
        self.samples.iter().filter(move |s| s.stream_name() == name)
    }

    /// Per-stream sample counts, in stream order
    pub fn counts_by_stream(&self) -> Vec<(String, usize)> {
        let mut counts = vec![0usize; self.streams.len()];
        for sample in &self.samples {
            if let Some(count) = counts.get_mut(sample.stream_index) {
                *count += 1;
            }
        }
        self.streams
            .iter()
            .zip(counts)
            .map(|(s, c)| (s.name.clone(), c))
            .collect()
    }

    /// Relative time of the first `video_start` event, if any
    pub fn video_anchor(&self) -> Option<f64> {
        self.samples
            .iter()
            .filter(|s| s.stream.kind.is_event())
            .find(|s| s.payload().event_type() == Some(VIDEO_START_EVENT))
            .map(|s| s.relative_time)
    }
}

/// Synchronization note written alongside every record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncInfo {
    pub sync_method: String,
    pub clock_offset_type: String,
    pub note: String,
}

impl Default for SyncInfo {
    fn default() -> Self {
        Self {
            sync_method: "LSL_local_clock".to_string(),
            clock_offset_type: "offset between local and remote device clocks (seconds)"
                .to_string(),
            note: "Use clock_offset from each sample for post-hoc synchronization with external devices"
                .to_string(),
        }
    }
}

/// Counters kept by the recorder while recording
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub ticks: u64,
    pub samples_recorded: u64,
    pub pull_failures: u64,
    pub out_of_order_dropped: u64,
    pub streams_lost: u64,
}

//! Core data types for syncscope
//!
//! This module contains the fundamental data structures shared by the
//! transport, producers, recorder and playback engine.
//!
//! # Main Types
//!
//! - [`StreamDescriptor`] - Identity and shape of an announced stream
//! - [`StreamKind`] - Event, Sample or External Device stream variant
//! - [`ChannelData`] - One sample's channel values (numeric or text)
//! - [`Sample`] - Channel values stamped in the producer's clock domain
//! - [`WindowReference`] - Reference window used for coordinate normalization
//! - [`PointerEventKind`] - Encoded pointer event code carried by pointer streams
//!
//! # Stream identity
//!
//! A stream is identified by the pair `(name, source_id)`. The recorder keys
//! its inlets by the descriptor's position in the resolved set, so two
//! streams sharing a name from different sources are both recorded.

use serde::{Deserialize, Serialize};

/// Content type used by event streams
pub const EVENT_CONTENT_TYPE: &str = "Markers";

/// Content type used by pointer streams
pub const POINTER_CONTENT_TYPE: &str = "Mouse";

/// Channel labels of a pointer stream, in channel order
pub const POINTER_CHANNEL_LABELS: [&str; 3] = ["pointer_x", "pointer_y", "event_kind"];

/// Coordinate space a pointer stream's positions are expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateSpace {
    /// Fractions of the reference window, in [0,1]
    Normalized,
    /// Raw pixel coordinates
    #[default]
    Absolute,
}

impl CoordinateSpace {
    /// Classify a single point: normalized if both axes lie in [0,1]
    pub fn classify(x: f64, y: f64) -> Self {
        if (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y) {
            CoordinateSpace::Normalized
        } else {
            CoordinateSpace::Absolute
        }
    }
}

/// Variant of a stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum StreamKind {
    /// Irregular single-channel text stream of structured events
    Event,
    /// Regular numeric stream produced in-process
    Sample {
        #[serde(default)]
        channel_labels: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        coordinate_space: Option<CoordinateSpace>,
    },
    /// Regular numeric stream fed by an acquisition device
    External { device: String },
}

impl StreamKind {
    /// Display name for the kind
    pub fn display_name(&self) -> &'static str {
        match self {
            StreamKind::Event => "Event",
            StreamKind::Sample { .. } => "Sample",
            StreamKind::External { .. } => "External Device",
        }
    }

    /// Whether this kind carries structured events
    pub fn is_event(&self) -> bool {
        matches!(self, StreamKind::Event)
    }
}

/// Identity and shape of an announced stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub name: String,
    pub kind: StreamKind,
    /// Free-form content type label ("Markers", "Mouse", "EmotiBit", ...)
    pub content_type: String,
    pub channel_count: usize,
    /// Nominal sampling rate in Hz (0 = irregular)
    pub nominal_rate: f64,
    pub source_id: String,
}

impl StreamDescriptor {
    /// Descriptor for a single-channel irregular event stream
    pub fn event(name: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: StreamKind::Event,
            content_type: EVENT_CONTENT_TYPE.to_string(),
            channel_count: 1,
            nominal_rate: 0.0,
            source_id: source_id.into(),
        }
    }

    /// Descriptor for a regular numeric stream with labeled channels
    pub fn sample(
        name: impl Into<String>,
        content_type: impl Into<String>,
        channel_labels: Vec<String>,
        nominal_rate: f64,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            channel_count: channel_labels.len(),
            kind: StreamKind::Sample {
                channel_labels,
                coordinate_space: None,
            },
            content_type: content_type.into(),
            nominal_rate,
            source_id: source_id.into(),
        }
    }

    /// Descriptor for a 3-channel pointer stream
    pub fn pointer(
        name: impl Into<String>,
        nominal_rate: f64,
        space: CoordinateSpace,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: StreamKind::Sample {
                channel_labels: POINTER_CHANNEL_LABELS.iter().map(|s| s.to_string()).collect(),
                coordinate_space: Some(space),
            },
            content_type: POINTER_CONTENT_TYPE.to_string(),
            channel_count: POINTER_CHANNEL_LABELS.len(),
            nominal_rate,
            source_id: source_id.into(),
        }
    }

    /// Descriptor for an acquisition device stream
    pub fn external(
        name: impl Into<String>,
        device: impl Into<String>,
        content_type: impl Into<String>,
        channel_count: usize,
        nominal_rate: f64,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: StreamKind::External {
                device: device.into(),
            },
            content_type: content_type.into(),
            channel_count,
            nominal_rate,
            source_id: source_id.into(),
        }
    }

    /// Whether the stream has no nominal rate
    pub fn is_irregular(&self) -> bool {
        self.nominal_rate <= 0.0
    }

    /// Whether this is a pointer stream
    pub fn is_pointer(&self) -> bool {
        self.content_type == POINTER_CONTENT_TYPE && self.channel_count >= 2
    }

    /// Declared coordinate space, if the stream declares one
    pub fn coordinate_space(&self) -> Option<CoordinateSpace> {
        match &self.kind {
            StreamKind::Sample {
                coordinate_space, ..
            } => *coordinate_space,
            _ => None,
        }
    }

    /// Label of a channel, falling back to `ch<index>`
    pub fn channel_label(&self, index: usize) -> String {
        if let StreamKind::Sample { channel_labels, .. } = &self.kind {
            if let Some(label) = channel_labels.get(index) {
                return label.clone();
            }
        }
        format!("ch{index}")
    }

    /// Whether two descriptors name the same stream
    pub fn same_identity(&self, other: &StreamDescriptor) -> bool {
        self.name == other.name && self.source_id == other.source_id
    }
}

/// One sample's channel values
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelData {
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl ChannelData {
    /// Number of channels carried
    pub fn len(&self) -> usize {
        match self {
            ChannelData::Numeric(values) => values.len(),
            ChannelData::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric values, if this is a numeric sample
    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            ChannelData::Numeric(values) => Some(values),
            ChannelData::Text(_) => None,
        }
    }

    /// Raw values as JSON, as persisted in `raw_data`
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ChannelData::Numeric(values) => serde_json::Value::Array(
                values
                    .iter()
                    .map(|v| {
                        serde_json::Number::from_f64(*v)
                            .map(serde_json::Value::Number)
                            .unwrap_or(serde_json::Value::Null)
                    })
                    .collect(),
            ),
            ChannelData::Text(values) => serde_json::Value::Array(
                values
                    .iter()
                    .map(|s| serde_json::Value::String(s.clone()))
                    .collect(),
            ),
        }
    }

    /// Rebuild channel values from a persisted JSON array.
    ///
    /// Arrays of numbers become numeric data; anything else becomes text,
    /// with non-string elements re-encoded as JSON.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Array(items)
                if !items.is_empty() && items.iter().all(|v| v.is_number() || v.is_null()) =>
            {
                ChannelData::Numeric(
                    items
                        .iter()
                        .map(|v| v.as_f64().unwrap_or(f64::NAN))
                        .collect(),
                )
            }
            serde_json::Value::Array(items) => ChannelData::Text(
                items
                    .iter()
                    .map(|v| match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            serde_json::Value::String(s) => ChannelData::Text(vec![s.clone()]),
            other => ChannelData::Text(vec![other.to_string()]),
        }
    }

    /// [`from_json`](Self::from_json) for a known stream kind; an empty
    /// array stays numeric on streams that carry numeric channels
    pub fn from_json_for(value: &serde_json::Value, kind: &StreamKind) -> Self {
        match value {
            serde_json::Value::Array(items) if items.is_empty() && !kind.is_event() => {
                ChannelData::Numeric(Vec::new())
            }
            _ => Self::from_json(value),
        }
    }
}

/// Channel values stamped in the producer's clock domain
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: f64,
    pub data: ChannelData,
}

impl Sample {
    pub fn new(timestamp: f64, data: ChannelData) -> Self {
        Self { timestamp, data }
    }
}

/// Pointer event code carried in a pointer stream's third channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointerEventKind {
    Position,
    Press,
    Release,
    Move,
    Scroll,
}

impl PointerEventKind {
    /// Numeric code written into the stream
    pub fn code(&self) -> f64 {
        match self {
            PointerEventKind::Position => 0.0,
            PointerEventKind::Press => 1.0,
            PointerEventKind::Release => 2.0,
            PointerEventKind::Move => 3.0,
            PointerEventKind::Scroll => 4.0,
        }
    }

    /// Decode a channel value back into an event kind
    pub fn from_code(code: f64) -> Option<Self> {
        if !code.is_finite() {
            return None;
        }
        match code.round() as i64 {
            0 => Some(PointerEventKind::Position),
            1 => Some(PointerEventKind::Press),
            2 => Some(PointerEventKind::Release),
            3 => Some(PointerEventKind::Move),
            4 => Some(PointerEventKind::Scroll),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PointerEventKind::Position => "position",
            PointerEventKind::Press => "press",
            PointerEventKind::Release => "release",
            PointerEventKind::Move => "move",
            PointerEventKind::Scroll => "scroll",
        }
    }
}

impl std::fmt::Display for PointerEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Reference window used for coordinate normalization
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowReference {
    pub width: f64,
    pub height: f64,
}

impl WindowReference {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Both dimensions are finite and positive
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

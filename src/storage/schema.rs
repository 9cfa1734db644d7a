//! On-disk record layout
//!
//! ```json
//! {
//!   "schema_version": 3,
//!   "session_id": "...",
//!   "stream_info": [{"name", "type", "channel_count", "source_id", "session_id",
//!                    "nominal_srate", "kind"}],
//!   "session_start_time": 1234.5,
//!   "total_samples": 2,
//!   "lsl_samples": [{"timestamp", "relative_time", "stream_name", "stream_index",
//!                    "source_id", "stream_type", "data", "raw_data", "clock_offset",
//!                    "local_time_when_recorded"}],
//!   "synchronization_info": {"sync_method", "clock_offset_type", "note"},
//!   "recorded_at": "2024-01-01T00:00:00Z",
//!   "capture_reference": {"width", "height"},
//!   "error": "only present in degraded records"
//! }
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::session::{RecordedSample, SyncInfo};
use crate::types::{StreamDescriptor, StreamKind, WindowReference};

/// Top-level record document, generic over the sample entry type so the
/// loader can parse entries one at a time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordFile<S> {
    #[serde(default)]
    pub schema_version: u32,
    pub session_id: String,
    #[serde(default)]
    pub stream_info: Vec<StreamInfoEntry>,
    #[serde(default)]
    pub session_start_time: Option<f64>,
    #[serde(default)]
    pub total_samples: usize,
    #[serde(default = "Vec::new")]
    pub lsl_samples: Vec<S>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synchronization_info: Option<SyncInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_reference: Option<WindowReference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One entry of `stream_info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfoEntry {
    pub name: String,
    #[serde(rename = "type", default)]
    pub content_type: String,
    #[serde(default)]
    pub channel_count: usize,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub nominal_srate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<StreamKind>,
}

impl StreamInfoEntry {
    pub fn from_descriptor(descriptor: &StreamDescriptor, session_id: &str) -> Self {
        Self {
            name: descriptor.name.clone(),
            content_type: descriptor.content_type.clone(),
            channel_count: descriptor.channel_count,
            source_id: descriptor.source_id.clone(),
            session_id: session_id.to_string(),
            nominal_srate: descriptor.nominal_rate,
            kind: Some(descriptor.kind.clone()),
        }
    }

    pub fn into_descriptor(self) -> StreamDescriptor {
        let kind = self
            .kind
            .unwrap_or_else(|| infer_kind(&self.content_type, self.channel_count));
        StreamDescriptor {
            name: self.name,
            kind,
            content_type: self.content_type,
            channel_count: self.channel_count,
            nominal_rate: self.nominal_srate,
            source_id: self.source_id,
        }
    }
}

/// Best-effort stream kind for records that predate the `kind` field
pub fn infer_kind(content_type: &str, channel_count: usize) -> StreamKind {
    if content_type.eq_ignore_ascii_case(crate::types::EVENT_CONTENT_TYPE) && channel_count <= 1 {
        StreamKind::Event
    } else if content_type == crate::types::POINTER_CONTENT_TYPE {
        StreamKind::Sample {
            channel_labels: crate::types::POINTER_CHANNEL_LABELS
                .iter()
                .take(channel_count)
                .map(|s| s.to_string())
                .collect(),
            coordinate_space: None,
        }
    } else {
        StreamKind::Sample {
            channel_labels: Vec::new(),
            coordinate_space: None,
        }
    }
}

/// One entry of `lsl_samples`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleEntry {
    pub timestamp: f64,
    pub relative_time: f64,
    pub stream_name: String,
    /// Position in `stream_info`; absent before schema v3
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(default)]
    pub stream_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_data: Option<serde_json::Value>,
    #[serde(default)]
    pub clock_offset: Option<f64>,
    #[serde(default)]
    pub local_time_when_recorded: Option<f64>,
}

impl SampleEntry {
    /// Position of this entry's stream in `streams`.
    ///
    /// The stored index wins when it names a stream of the same name, then
    /// `(name, source_id)`, then the first stream with the name.
    pub fn resolve_stream(&self, streams: &[Arc<StreamDescriptor>]) -> Option<usize> {
        if let Some(index) = self.stream_index {
            if streams.get(index).is_some_and(|s| s.name == self.stream_name) {
                return Some(index);
            }
        }
        if let Some(source_id) = &self.source_id {
            let found = streams
                .iter()
                .position(|s| s.name == self.stream_name && &s.source_id == source_id);
            if found.is_some() {
                return found;
            }
        }
        streams.iter().position(|s| s.name == self.stream_name)
    }

    pub fn from_sample(sample: &RecordedSample) -> Self {
        Self {
            timestamp: sample.timestamp,
            relative_time: sample.relative_time,
            stream_name: sample.stream.name.clone(),
            stream_index: Some(sample.stream_index),
            source_id: Some(sample.stream.source_id.clone()),
            stream_type: sample.stream.content_type.clone(),
            data: sample.payload().to_json(),
            raw_data: Some(sample.data.to_json()),
            clock_offset: sample.clock_offset,
            local_time_when_recorded: sample.local_time_when_recorded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_kind() {
        assert_eq!(infer_kind("Markers", 1), StreamKind::Event);
        assert!(matches!(
            infer_kind("Mouse", 3),
            StreamKind::Sample { ref channel_labels, .. } if channel_labels.len() == 3
        ));
        assert!(matches!(infer_kind("EmotiBit", 16), StreamKind::Sample { .. }));
    }

    #[test]
    fn test_resolve_stream_prefers_identity() {
        let streams = vec![
            Arc::new(StreamDescriptor::event("Bridge", "s1")),
            Arc::new(StreamDescriptor::event("Bridge", "s2")),
        ];
        let mut entry: SampleEntry = serde_json::from_value(serde_json::json!({
            "timestamp": 1.0, "relative_time": 0.0, "stream_name": "Bridge"
        }))
        .unwrap();
        assert_eq!(entry.resolve_stream(&streams), Some(0));

        entry.source_id = Some("s2".to_string());
        assert_eq!(entry.resolve_stream(&streams), Some(1));

        // A stale index falls back to the identity lookup
        entry.stream_index = Some(7);
        assert_eq!(entry.resolve_stream(&streams), Some(1));
        entry.stream_index = Some(1);
        entry.source_id = None;
        assert_eq!(entry.resolve_stream(&streams), Some(1));
    }

    #[test]
    fn test_stream_info_uses_type_key() {
        let entry = StreamInfoEntry::from_descriptor(&StreamDescriptor::event("E", "src"), "abc");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "Markers");
        assert_eq!(json["session_id"], "abc");
        assert_eq!(entry.into_descriptor(), StreamDescriptor::event("E", "src"));
    }
}

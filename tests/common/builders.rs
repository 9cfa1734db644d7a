//! Test data builders for creating test objects

use std::sync::Arc;

use syncscope::session::{RecordedSample, SessionRecord};
use syncscope::types::{ChannelData, CoordinateSpace, StreamDescriptor};
use syncscope::Value;

/// Builder for session records with hand-placed samples
pub struct RecordBuilder {
    record: SessionRecord,
}

impl RecordBuilder {
    pub fn new(session_id: &str) -> Self {
        Self {
            record: SessionRecord::new(session_id, 1000.0),
        }
    }

    pub fn start_time(mut self, start: f64) -> Self {
        self.record.session_start_timestamp = start;
        self
    }

    /// Add a stream
    pub fn stream(mut self, descriptor: StreamDescriptor) -> Self {
        self.record.streams.push(Arc::new(descriptor));
        self
    }

    /// Append a sample to the named stream at `relative_time`
    pub fn sample(mut self, stream: &str, relative_time: f64, data: ChannelData) -> Self {
        let stream_index = self
            .record
            .stream_index(stream)
            .unwrap_or_else(|| panic!("unknown stream '{}'", stream));
        let descriptor = Arc::clone(&self.record.streams[stream_index]);
        self.record.samples.push(RecordedSample {
            timestamp: self.record.session_start_timestamp + relative_time,
            relative_time,
            stream_index,
            stream: descriptor,
            data,
            clock_offset: Some(0.0),
            local_time_when_recorded: Some(self.record.session_start_timestamp + relative_time),
        });
        self
    }

    pub fn numeric(self, stream: &str, relative_time: f64, values: &[f64]) -> Self {
        self.sample(stream, relative_time, ChannelData::Numeric(values.to_vec()))
    }

    pub fn event(self, stream: &str, relative_time: f64, payload: Value) -> Self {
        self.sample(stream, relative_time, ChannelData::Text(vec![payload.encode()]))
    }

    pub fn build(self) -> SessionRecord {
        self.record
    }
}

/// Normalized pointer stream descriptor
pub fn pointer_stream(name: &str) -> StreamDescriptor {
    StreamDescriptor::pointer(name, 10.0, CoordinateSpace::Normalized, "test")
}

/// Structured event stream descriptor
pub fn event_stream(name: &str) -> StreamDescriptor {
    StreamDescriptor::event(name, "test")
}

/// Regular numeric stream with `channels` channels
pub fn signal_stream(name: &str, channels: usize, rate: f64) -> StreamDescriptor {
    let labels = (0..channels).map(|i| format!("ch{}", i)).collect();
    StreamDescriptor::sample(name, "EEG", labels, rate, "test")
}

/// `{"type": event_type}` payload
pub fn typed_event(event_type: &str) -> Value {
    Value::from([("type", Value::from(event_type))])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = RecordBuilder::new("test")
            .stream(pointer_stream("mouse"))
            .numeric("mouse", 0.5, &[0.1, 0.2, 0.0])
            .build();

        assert_eq!(record.samples.len(), 1);
        assert_eq!(record.samples[0].timestamp, 1000.5);
        assert_eq!(record.samples[0].stream_name(), "mouse");
    }
}

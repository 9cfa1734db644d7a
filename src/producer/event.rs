//! Event producer

use crate::error::Result;
use crate::transport::{Outlet, Transport};
use crate::types::{ChannelData, StreamDescriptor};
use crate::value::Value;

/// Publishes structured events as JSON text on a single-channel stream
pub struct EventProducer {
    outlet: Box<dyn Outlet>,
    emitted: u64,
}

impl EventProducer {
    /// Announce an event stream on `transport`
    pub fn new(
        transport: &dyn Transport,
        name: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Result<Self> {
        let outlet = transport.create_outlet(StreamDescriptor::event(name, source_id), None)?;
        Ok(Self::from_outlet(outlet))
    }

    pub fn from_outlet(outlet: Box<dyn Outlet>) -> Self {
        Self { outlet, emitted: 0 }
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        self.outlet.descriptor()
    }

    /// Number of events published
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Publish a payload, stamped with the producer clock.
    ///
    /// Map payloads without a `timestamp` field get a wall-clock ISO-8601 one.
    pub fn emit(&mut self, mut payload: Value) -> Result<()> {
        if payload.is_map() && payload.get("timestamp").is_none() {
            payload.insert("timestamp", Value::String(chrono::Local::now().to_rfc3339()));
        }
        self.outlet.push(ChannelData::Text(vec![payload.encode()]))?;
        self.emitted += 1;
        Ok(())
    }

    /// Publish `{"type": event_type, "data": data}`
    pub fn emit_event(&mut self, event_type: &str, data: Value) -> Result<()> {
        self.emit(Value::from([
            ("type", Value::from(event_type)),
            ("data", data),
        ]))
    }
}

impl std::fmt::Debug for EventProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventProducer")
            .field("stream", &self.outlet.descriptor().name)
            .field("emitted", &self.emitted)
            .finish()
    }
}

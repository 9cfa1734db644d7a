//! Sample producer for regular numeric streams

use crate::clock::SharedClock;
use crate::error::{Result, SyncError};
use crate::transport::{Outlet, Transport};
use crate::types::{ChannelData, Sample, StreamDescriptor};

/// Publishes fixed-width numeric samples
pub struct SampleProducer {
    outlet: Box<dyn Outlet>,
}

impl SampleProducer {
    /// Announce `descriptor` on `transport`, optionally in another clock domain
    pub fn new(
        transport: &dyn Transport,
        descriptor: StreamDescriptor,
        clock: Option<SharedClock>,
    ) -> Result<Self> {
        Ok(Self::from_outlet(transport.create_outlet(descriptor, clock)?))
    }

    pub fn from_outlet(outlet: Box<dyn Outlet>) -> Self {
        Self { outlet }
    }

    pub fn descriptor(&self) -> &StreamDescriptor {
        self.outlet.descriptor()
    }

    /// Samples dropped by the transport because a consumer fell behind
    pub fn dropped(&self) -> u64 {
        self.outlet.dropped()
    }

    fn check_width(&self, values: &[f64]) -> Result<()> {
        let expected = self.outlet.descriptor().channel_count;
        if values.len() != expected {
            return Err(SyncError::ChannelMismatch {
                stream: self.outlet.descriptor().name.clone(),
                expected,
                actual: values.len(),
            });
        }
        Ok(())
    }

    /// Publish one sample stamped with the producer clock
    pub fn emit(&self, values: &[f64]) -> Result<()> {
        self.check_width(values)?;
        self.outlet.push(ChannelData::Numeric(values.to_vec()))
    }

    /// Publish one sample with an explicit producer-clock timestamp
    pub fn emit_at(&self, timestamp: f64, values: &[f64]) -> Result<()> {
        self.check_width(values)?;
        self.outlet
            .push_sample(Sample::new(timestamp, ChannelData::Numeric(values.to_vec())))
    }
}

//! Stream transport
//!
//! A transport carries timestamped samples from producers to the recorder.
//! Producers announce streams through an [`Outlet`]; the recorder discovers
//! them with a [`StreamResolver`] and reads them through an [`Inlet`].
//!
//! # Delivery
//!
//! Delivery is at-most-once. Each inlet has a bounded queue; when a consumer
//! falls behind, new samples for that inlet are dropped and counted on the
//! outlet. Samples from one outlet arrive at an inlet in push order.
//!
//! # Clock domains
//!
//! An outlet stamps samples on its own clock. [`Inlet::time_correction`]
//! returns `local_clock - producer_clock`, measured at the time of the call,
//! so adding it to a sample timestamp moves that timestamp into the local
//! synchronization domain.

mod local;
mod resolver;

pub use local::LocalTransport;
pub use resolver::{filter_streams, StreamResolver};

use std::time::Duration;

use crate::clock::SharedClock;
use crate::error::Result;
use crate::types::{ChannelData, Sample, StreamDescriptor};

/// Default per-inlet queue capacity
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// Discovery and connection endpoint
pub trait Transport: Send + Sync {
    /// Current time on the local synchronization clock
    fn local_clock(&self) -> f64;

    /// Snapshot of announced streams.
    ///
    /// Returns as soon as at least one stream is announced, or after
    /// `wait_budget` with whatever is announced (possibly nothing).
    fn resolve(&self, wait_budget: Duration) -> Vec<StreamDescriptor>;

    /// Open a reading endpoint for an announced stream
    fn open_inlet(&self, descriptor: &StreamDescriptor) -> Result<Box<dyn Inlet>>;

    /// Announce a stream. `clock` overrides the transport clock for
    /// producers living in another clock domain.
    fn create_outlet(
        &self,
        descriptor: StreamDescriptor,
        clock: Option<SharedClock>,
    ) -> Result<Box<dyn Outlet>>;
}

/// Writing endpoint of a stream
pub trait Outlet: Send {
    fn descriptor(&self) -> &StreamDescriptor;

    /// Stamp `data` with the outlet clock and publish it
    fn push(&self, data: ChannelData) -> Result<()>;

    /// Publish a sample with an explicit timestamp
    fn push_sample(&self, sample: Sample) -> Result<()>;

    /// Samples dropped because a consumer queue was full
    fn dropped(&self) -> u64;
}

/// Reading endpoint of a stream
pub trait Inlet: Send {
    fn descriptor(&self) -> &StreamDescriptor;

    /// Non-blocking pull; `Ok(None)` when nothing is pending
    fn pull_sample(&mut self) -> Result<Option<Sample>>;

    /// `local_clock - producer_clock` in seconds, measured now
    fn time_correction(&mut self) -> Result<f64>;

    /// Release the inlet; later pulls fail
    fn close(&mut self);
}

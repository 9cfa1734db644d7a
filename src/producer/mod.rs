//! Stream producers
//!
//! Producers publish samples into a [`Transport`](crate::transport::Transport):
//!
//! - [`EventProducer`] - irregular single-channel structured events
//! - [`EventBridge`] - non-blocking queue from embedded content into an event producer
//! - [`SampleProducer`] - regular numeric streams from in-process sources
//! - [`PointerProducer`] - pointer position/kind samples, optionally normalized
//! - [`ExternalDeviceProducer`] - worker thread relaying an [`AcquisitionDevice`]
//! - [`SimulatedDevice`] - synthetic acquisition device driven by [`SignalPattern`]s

mod bridge;
mod device;
mod event;
mod pointer;
mod sample;
mod simulated;

pub use bridge::{parse_bridge_message, BridgeMessage, BridgeReport, BridgeSender, EventBridge};
pub use device::{AcquisitionDevice, DeviceStats, ExternalDeviceProducer};
pub use event::EventProducer;
pub use pointer::PointerProducer;
pub use sample::SampleProducer;
pub use simulated::{SignalPattern, SimulatedDevice, XorShift};

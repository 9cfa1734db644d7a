//! In-process transport
//!
//! Streams live in a shared registry guarded by a `parking_lot` mutex. Each
//! inlet owns a bounded crossbeam channel fed by the outlet, so every queue
//! has exactly one writer and one reader.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use parking_lot::{Condvar, Mutex};

use super::{Inlet, Outlet, Transport, DEFAULT_QUEUE_CAPACITY};
use crate::clock::{MonotonicClock, SharedClock};
use crate::error::{Result, SyncError};
use crate::types::{ChannelData, Sample, StreamDescriptor};

#[derive(Debug, Default)]
struct Registry {
    streams: Mutex<Vec<Arc<StreamChannel>>>,
    announced: Condvar,
}

#[derive(Debug)]
struct StreamChannel {
    descriptor: StreamDescriptor,
    clock: SharedClock,
    subscribers: Mutex<Vec<Sender<Sample>>>,
    open: AtomicBool,
    dropped: AtomicU64,
}

/// Transport connecting producers and recorders inside one process
#[derive(Debug, Clone)]
pub struct LocalTransport {
    registry: Arc<Registry>,
    clock: SharedClock,
    queue_capacity: usize,
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalTransport {
    /// Create a transport on the process monotonic clock
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::shared())
    }

    /// Create a transport on a specific local clock
    pub fn with_clock(clock: SharedClock) -> Self {
        Self {
            registry: Arc::new(Registry::default()),
            clock,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Set the per-inlet queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// The local synchronization clock
    pub fn clock(&self) -> SharedClock {
        Arc::clone(&self.clock)
    }

    /// Number of currently announced streams
    pub fn stream_count(&self) -> usize {
        self.registry.streams.lock().len()
    }
}

impl Transport for LocalTransport {
    fn local_clock(&self) -> f64 {
        self.clock.now()
    }

    fn resolve(&self, wait_budget: Duration) -> Vec<StreamDescriptor> {
        let deadline = Instant::now().checked_add(wait_budget);
        let mut streams = self.registry.streams.lock();
        while streams.is_empty() {
            match deadline {
                Some(deadline) => {
                    if self
                        .registry
                        .announced
                        .wait_until(&mut streams, deadline)
                        .timed_out()
                    {
                        break;
                    }
                }
                None => self.registry.announced.wait(&mut streams),
            }
        }
        streams.iter().map(|c| c.descriptor.clone()).collect()
    }

    fn open_inlet(&self, descriptor: &StreamDescriptor) -> Result<Box<dyn Inlet>> {
        let channel = self
            .registry
            .streams
            .lock()
            .iter()
            .find(|c| c.descriptor.same_identity(descriptor))
            .cloned()
            .ok_or_else(|| SyncError::StreamClosed(descriptor.name.clone()))?;

        let (tx, rx) = bounded(self.queue_capacity);
        channel.subscribers.lock().push(tx);

        Ok(Box::new(LocalInlet {
            descriptor: channel.descriptor.clone(),
            channel,
            rx: Some(rx),
            local: Arc::clone(&self.clock),
        }))
    }

    fn create_outlet(
        &self,
        descriptor: StreamDescriptor,
        clock: Option<SharedClock>,
    ) -> Result<Box<dyn Outlet>> {
        let mut streams = self.registry.streams.lock();
        if streams
            .iter()
            .any(|c| c.descriptor.same_identity(&descriptor))
        {
            return Err(SyncError::DuplicateStream {
                name: descriptor.name,
                source_id: descriptor.source_id,
            });
        }

        let channel = Arc::new(StreamChannel {
            descriptor,
            clock: clock.unwrap_or_else(|| Arc::clone(&self.clock)),
            subscribers: Mutex::new(Vec::new()),
            open: AtomicBool::new(true),
            dropped: AtomicU64::new(0),
        });
        streams.push(Arc::clone(&channel));
        drop(streams);
        self.registry.announced.notify_all();

        tracing::debug!(
            "Announced stream '{}' ({})",
            channel.descriptor.name,
            channel.descriptor.content_type
        );

        Ok(Box::new(LocalOutlet {
            channel,
            registry: Arc::clone(&self.registry),
        }))
    }
}

struct LocalOutlet {
    channel: Arc<StreamChannel>,
    registry: Arc<Registry>,
}

impl Outlet for LocalOutlet {
    fn descriptor(&self) -> &StreamDescriptor {
        &self.channel.descriptor
    }

    fn push(&self, data: ChannelData) -> Result<()> {
        self.push_sample(Sample::new(self.channel.clock.now(), data))
    }

    fn push_sample(&self, sample: Sample) -> Result<()> {
        let mut subscribers = self.channel.subscribers.lock();
        subscribers.retain(|tx| match tx.try_send(sample.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.channel.dropped.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        Ok(())
    }

    fn dropped(&self) -> u64 {
        self.channel.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for LocalOutlet {
    fn drop(&mut self) {
        self.channel.open.store(false, Ordering::Release);
        self.channel.subscribers.lock().clear();
        self.registry
            .streams
            .lock()
            .retain(|c| !Arc::ptr_eq(c, &self.channel));
        tracing::debug!("Withdrew stream '{}'", self.channel.descriptor.name);
    }
}

struct LocalInlet {
    descriptor: StreamDescriptor,
    channel: Arc<StreamChannel>,
    rx: Option<Receiver<Sample>>,
    local: SharedClock,
}

impl Inlet for LocalInlet {
    fn descriptor(&self) -> &StreamDescriptor {
        &self.descriptor
    }

    fn pull_sample(&mut self) -> Result<Option<Sample>> {
        let Some(rx) = self.rx.as_ref() else {
            return Err(SyncError::StreamClosed(self.descriptor.name.clone()));
        };
        match rx.try_recv() {
            Ok(sample) => Ok(Some(sample)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(SyncError::StreamClosed(self.descriptor.name.clone()))
            }
        }
    }

    fn time_correction(&mut self) -> Result<f64> {
        if self.rx.is_none() || !self.channel.open.load(Ordering::Acquire) {
            return Err(SyncError::StreamClosed(self.descriptor.name.clone()));
        }
        Ok(self.local.now() - self.channel.clock.now())
    }

    fn close(&mut self) {
        self.rx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, OffsetClock};

    fn manual_transport(start: f64) -> (LocalTransport, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        (LocalTransport::with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_resolve_empty_waits_budget() {
        let transport = LocalTransport::new();
        let started = Instant::now();
        let streams = transport.resolve(Duration::from_millis(30));
        assert!(streams.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_resolve_returns_announced() {
        let (transport, _) = manual_transport(0.0);
        let _outlet = transport
            .create_outlet(StreamDescriptor::event("Events", "s1"), None)
            .unwrap();
        let streams = transport.resolve(Duration::from_secs(5));
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].name, "Events");
    }

    #[test]
    fn test_resolve_wakes_on_announcement() {
        let transport = LocalTransport::new();
        let producer = transport.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer
                .create_outlet(StreamDescriptor::event("Late", "s1"), None)
                .unwrap()
        });
        let streams = transport.resolve(Duration::from_secs(5));
        let _outlet = handle.join().unwrap();
        assert_eq!(streams.len(), 1);
    }

    #[test]
    fn test_duplicate_outlet_rejected() {
        let (transport, _) = manual_transport(0.0);
        let _a = transport
            .create_outlet(StreamDescriptor::event("Events", "s1"), None)
            .unwrap();
        let err = transport
            .create_outlet(StreamDescriptor::event("Events", "s1"), None)
            .err()
            .unwrap();
        assert!(matches!(err, SyncError::DuplicateStream { .. }));
    }

    #[test]
    fn test_push_pull_in_order() {
        let (transport, clock) = manual_transport(5.0);
        let outlet = transport
            .create_outlet(StreamDescriptor::event("Events", "s1"), None)
            .unwrap();
        let mut inlet = transport.open_inlet(outlet.descriptor()).unwrap();

        assert!(inlet.pull_sample().unwrap().is_none());
        outlet.push(ChannelData::Text(vec!["a".into()])).unwrap();
        clock.advance(1.0);
        outlet.push(ChannelData::Text(vec!["b".into()])).unwrap();

        let first = inlet.pull_sample().unwrap().unwrap();
        let second = inlet.pull_sample().unwrap().unwrap();
        assert_eq!(first.timestamp, 5.0);
        assert_eq!(second.timestamp, 6.0);
        assert_eq!(second.data, ChannelData::Text(vec!["b".into()]));
    }

    #[test]
    fn test_full_queue_drops() {
        let (transport, _) = manual_transport(0.0);
        let transport = transport.with_queue_capacity(2);
        let outlet = transport
            .create_outlet(StreamDescriptor::event("Events", "s1"), None)
            .unwrap();
        let mut inlet = transport.open_inlet(outlet.descriptor()).unwrap();
        for i in 0..5 {
            outlet.push(ChannelData::Text(vec![i.to_string()])).unwrap();
        }
        assert_eq!(outlet.dropped(), 3);
        assert_eq!(
            inlet.pull_sample().unwrap().unwrap().data,
            ChannelData::Text(vec!["0".into()])
        );
    }

    #[test]
    fn test_dropped_outlet_drains_then_closes() {
        let (transport, _) = manual_transport(0.0);
        let outlet = transport
            .create_outlet(StreamDescriptor::event("Events", "s1"), None)
            .unwrap();
        let mut inlet = transport.open_inlet(outlet.descriptor()).unwrap();
        outlet.push(ChannelData::Text(vec!["last".into()])).unwrap();
        drop(outlet);

        assert_eq!(transport.stream_count(), 0);
        assert!(inlet.pull_sample().unwrap().is_some());
        assert!(matches!(
            inlet.pull_sample(),
            Err(SyncError::StreamClosed(_))
        ));
        assert!(inlet.time_correction().is_err());
    }

    #[test]
    fn test_time_correction_across_domains() {
        let (transport, clock) = manual_transport(100.0);
        let device_clock = Arc::new(OffsetClock::new(clock.clone(), -40.0));
        let outlet = transport
            .create_outlet(
                StreamDescriptor::external("Device", "sim", "EEG", 4, 250.0, "dev"),
                Some(device_clock),
            )
            .unwrap();
        let mut inlet = transport.open_inlet(outlet.descriptor()).unwrap();
        outlet.push(ChannelData::Numeric(vec![0.0; 4])).unwrap();

        let sample = inlet.pull_sample().unwrap().unwrap();
        let offset = inlet.time_correction().unwrap();
        assert_eq!(sample.timestamp, 60.0);
        assert_eq!(offset, 40.0);
        assert_eq!(sample.timestamp + offset, 100.0);
    }

    #[test]
    fn test_closed_inlet_fails_pull() {
        let (transport, _) = manual_transport(0.0);
        let outlet = transport
            .create_outlet(StreamDescriptor::event("Events", "s1"), None)
            .unwrap();
        let mut inlet = transport.open_inlet(outlet.descriptor()).unwrap();
        inlet.close();
        assert!(inlet.pull_sample().is_err());
        // Outlet prunes the disconnected queue without failing
        outlet.push(ChannelData::Text(vec!["x".into()])).unwrap();
        assert_eq!(outlet.dropped(), 0);
    }
}

//! External device producer
//!
//! Relays samples from an [`AcquisitionDevice`] into a transport stream on a
//! dedicated worker thread.
//!
//! # Lifecycle
//!
//! 1. [`ExternalDeviceProducer::start`] prepares the device on the calling
//!    thread, so a missing device surfaces as a typed error.
//! 2. The worker starts the device stream, waits for the warm-up period and
//!    measures the channel count from the first rows. If the device returns
//!    nothing, the device-declared count or the configured fallback is used.
//! 3. The worker announces the stream and relays rows until stopped. Rows of
//!    the wrong width are skipped.
//! 4. [`ExternalDeviceProducer::stop`] clears the running flag and waits for
//!    the worker up to a timeout. A worker that does not finish in time is
//!    detached with a warning.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::clock::SharedClock;
use crate::config::DeviceSettings;
use crate::error::{Result, SyncError};
use crate::transport::{Outlet, Transport};
use crate::types::{ChannelData, StreamDescriptor};

/// Sleep slice used while waiting out the warm-up period
const WARMUP_SLICE: Duration = Duration::from_millis(5);

/// A hardware or simulated acquisition device
///
/// Methods are called from the worker thread, except [`prepare`](Self::prepare)
/// which runs on the thread that starts the producer.
pub trait AcquisitionDevice: Send {
    /// Device name, recorded in the stream kind
    fn name(&self) -> &str;

    /// Nominal sampling rate in Hz
    fn nominal_rate(&self) -> f64;

    /// Channel count the device declares, if known before streaming
    fn channel_count(&self) -> Option<usize> {
        None
    }

    /// Clock domain the device stamps samples in; `None` uses the transport clock
    fn clock(&self) -> Option<SharedClock> {
        None
    }

    /// Connect to the device
    fn prepare(&mut self) -> Result<()>;

    /// Begin buffering samples
    fn start_stream(&mut self) -> Result<()>;

    /// Take all buffered rows, one row per sample
    fn read_available(&mut self) -> Result<Vec<Vec<f64>>>;

    /// Stop buffering samples
    fn stop_stream(&mut self) -> Result<()> {
        Ok(())
    }

    /// Disconnect and free resources
    fn release(&mut self) {}
}

/// Counters shared between the producer handle and its worker
#[derive(Debug, Default)]
pub struct DeviceStats {
    pub rows_pushed: AtomicU64,
    pub rows_skipped: AtomicU64,
    pub read_errors: AtomicU64,
    pub channel_count: AtomicUsize,
    pub stream_announced: AtomicBool,
}

impl DeviceStats {
    pub fn rows_pushed(&self) -> u64 {
        self.rows_pushed.load(Ordering::Relaxed)
    }

    pub fn rows_skipped(&self) -> u64 {
        self.rows_skipped.load(Ordering::Relaxed)
    }

    pub fn read_errors(&self) -> u64 {
        self.read_errors.load(Ordering::Relaxed)
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count.load(Ordering::Relaxed)
    }

    pub fn stream_announced(&self) -> bool {
        self.stream_announced.load(Ordering::Acquire)
    }
}

/// Handle to a running device worker
pub struct ExternalDeviceProducer {
    device_name: String,
    running: Arc<AtomicBool>,
    stats: Arc<DeviceStats>,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
    join_timeout: Duration,
}

impl ExternalDeviceProducer {
    /// Prepare `device` and spawn its worker
    pub fn start(
        transport: Arc<dyn Transport>,
        mut device: Box<dyn AcquisitionDevice>,
        settings: DeviceSettings,
        source_id: impl Into<String>,
    ) -> Result<Self> {
        let device_name = device.name().to_string();
        device.prepare().map_err(|e| {
            tracing::error!("Failed to prepare device '{}': {}", device_name, e);
            e.with_context(format!("Device '{}' unavailable", device_name))
        })?;

        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(DeviceStats::default());
        let (done_tx, done_rx) = bounded(1);
        let join_timeout = settings.join_timeout();

        let worker = DeviceWorker {
            transport,
            device,
            settings,
            source_id: source_id.into(),
            running: Arc::clone(&running),
            stats: Arc::clone(&stats),
            done_tx,
        };

        let handle = std::thread::Builder::new()
            .name(format!("device-{}", device_name))
            .spawn(move || worker.run())
            .map_err(|e| SyncError::Device(format!("Failed to spawn device worker: {}", e)))?;

        Ok(Self {
            device_name,
            running,
            stats,
            done_rx,
            handle: Some(handle),
            join_timeout,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Whether the worker has not been asked to stop
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.handle.is_some()
    }

    pub fn stats(&self) -> &DeviceStats {
        &self.stats
    }

    /// Stop with the configured join timeout
    pub fn stop(&mut self) -> bool {
        self.stop_with_timeout(self.join_timeout)
    }

    /// Signal the worker and wait up to `timeout` for it to finish.
    ///
    /// Returns true if the worker finished. Calling this more than once is
    /// harmless.
    pub fn stop_with_timeout(&mut self, timeout: Duration) -> bool {
        self.running.store(false, Ordering::SeqCst);
        let Some(handle) = self.handle.take() else {
            return true;
        };

        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    tracing::error!("Device worker '{}' panicked", self.device_name);
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    "Device worker '{}' did not stop within {:?}, detaching",
                    self.device_name,
                    timeout
                );
                false
            }
        }
    }
}

impl Drop for ExternalDeviceProducer {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

impl std::fmt::Debug for ExternalDeviceProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExternalDeviceProducer")
            .field("device", &self.device_name)
            .field("running", &self.is_running())
            .field("rows_pushed", &self.stats.rows_pushed())
            .finish()
    }
}

struct DeviceWorker {
    transport: Arc<dyn Transport>,
    device: Box<dyn AcquisitionDevice>,
    settings: DeviceSettings,
    source_id: String,
    running: Arc<AtomicBool>,
    stats: Arc<DeviceStats>,
    done_tx: Sender<()>,
}

impl DeviceWorker {
    fn run(mut self) {
        tracing::info!("Device worker '{}' started", self.device.name());

        match self.device.start_stream() {
            Ok(()) => self.stream(),
            Err(e) => tracing::error!("Failed to start device stream: {}", e),
        }

        if let Err(e) = self.device.stop_stream() {
            tracing::warn!("Failed to stop device stream: {}", e);
        }
        self.device.release();
        tracing::info!(
            "Device worker '{}' stopped after {} row(s)",
            self.device.name(),
            self.stats.rows_pushed()
        );
        let _ = self.done_tx.send(());
    }

    fn stream(&mut self) {
        self.sleep_while_running(Duration::from_millis(self.settings.warmup_ms));
        if !self.running.load(Ordering::SeqCst) {
            return;
        }

        let warmup_rows = self.read_rows();
        let channel_count = warmup_rows
            .first()
            .map(Vec::len)
            .filter(|n| *n > 0)
            .or_else(|| self.device.channel_count())
            .unwrap_or(self.settings.fallback_channels);
        self.stats
            .channel_count
            .store(channel_count, Ordering::Relaxed);

        let descriptor = StreamDescriptor::external(
            self.settings.stream_name.clone(),
            self.device.name(),
            self.settings.content_type.clone(),
            channel_count,
            self.device.nominal_rate(),
            self.source_id.clone(),
        );
        let outlet = match self.transport.create_outlet(descriptor, self.device.clock()) {
            Ok(outlet) => outlet,
            Err(e) => {
                tracing::error!("Failed to announce device stream: {}", e);
                return;
            }
        };
        self.stats.stream_announced.store(true, Ordering::Release);
        tracing::info!(
            "Device stream '{}' announced with {} channel(s)",
            outlet.descriptor().name,
            channel_count
        );

        self.relay(outlet.as_ref(), warmup_rows);
        let idle = Duration::from_millis(self.settings.idle_sleep_ms);
        while self.running.load(Ordering::SeqCst) {
            let rows = self.read_rows();
            if rows.is_empty() {
                std::thread::sleep(idle);
            } else {
                self.relay(outlet.as_ref(), rows);
            }
        }
    }

    fn read_rows(&mut self) -> Vec<Vec<f64>> {
        match self.device.read_available() {
            Ok(rows) => rows,
            Err(e) => {
                self.stats.read_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Device read failed: {}", e);
                Vec::new()
            }
        }
    }

    fn relay(&self, outlet: &dyn Outlet, rows: Vec<Vec<f64>>) {
        let expected = outlet.descriptor().channel_count;
        for row in rows {
            if row.len() != expected {
                self.stats.rows_skipped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    "Skipping row with {} channel(s), expected {}",
                    row.len(),
                    expected
                );
                continue;
            }
            if let Err(e) = outlet.push(ChannelData::Numeric(row)) {
                tracing::debug!("Failed to push device row: {}", e);
                continue;
            }
            self.stats.rows_pushed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn sleep_while_running(&self, total: Duration) {
        let deadline = Instant::now() + total;
        while self.running.load(Ordering::SeqCst) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(WARMUP_SLICE.min(deadline - now));
        }
    }
}

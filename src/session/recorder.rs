//! Session recorder for capturing multi-stream sessions
//!
//! The recorder resolves streams, opens one inlet per stream and, on each
//! [`SessionRecorder::tick`], drains whatever is pending from every inlet
//! without blocking. It owns no timer; the caller drives ticks at the
//! configured interval.

use std::sync::Arc;
use std::time::Duration;

use crate::config::RecorderSettings;
use crate::error::{Result, SyncError};
use crate::transport::{Inlet, StreamResolver, Transport};
use crate::types::{StreamDescriptor, WindowReference};

use super::types::{RecordedSample, RecorderState, RecorderStats, SessionRecord};

/// Outcome of [`SessionRecorder::start`]
#[derive(Debug, Default)]
pub struct StartReport {
    /// Streams with an open inlet, in record order
    pub streams: Vec<String>,
    /// Streams that resolved but could not be opened
    pub failed_to_open: Vec<String>,
    /// Non-fatal condition, e.g. nothing was discovered
    pub warning: Option<SyncError>,
}

/// Outcome of one [`SessionRecorder::tick`]
#[derive(Debug, Default)]
pub struct TickReport {
    pub pulled: usize,
    pub out_of_order: usize,
    /// Per-stream failures; other streams were still drained
    pub failures: Vec<SyncError>,
}

struct InletSlot {
    inlet: Box<dyn Inlet>,
    stream_index: usize,
    descriptor: Arc<StreamDescriptor>,
    last_relative: Option<f64>,
    last_offset: Option<f64>,
    lost: bool,
}

/// Records samples from every resolved stream into a [`SessionRecord`]
pub struct SessionRecorder {
    state: RecorderState,
    session_id: String,
    transport: Arc<dyn Transport>,
    resolver: StreamResolver,
    settings: RecorderSettings,
    inlets: Vec<InletSlot>,
    record: SessionRecord,
    capture_reference: Option<WindowReference>,
    stats: RecorderStats,
}

impl std::fmt::Debug for SessionRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecorder")
            .field("state", &self.state.display_name())
            .field("session_id", &self.session_id)
            .field("inlets", &self.inlets.len())
            .field("samples", &self.record.samples.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl SessionRecorder {
    /// Create a recorder with default settings
    pub fn new(session_id: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self::with_settings(session_id, transport, RecorderSettings::default())
    }

    pub fn with_settings(
        session_id: impl Into<String>,
        transport: Arc<dyn Transport>,
        settings: RecorderSettings,
    ) -> Self {
        let session_id = session_id.into();
        Self {
            state: RecorderState::Idle,
            resolver: StreamResolver::new(Arc::clone(&transport)),
            transport,
            settings,
            inlets: Vec::new(),
            record: SessionRecord::new(session_id.clone(), 0.0),
            session_id,
            capture_reference: None,
            stats: RecorderStats::default(),
        }
    }

    /// Get current state
    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Check if recording
    pub fn is_recording(&self) -> bool {
        self.state.is_recording()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn stats(&self) -> RecorderStats {
        self.stats
    }

    /// Get the current record
    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    /// Seconds since recording started on the local clock; 0 when not recording
    pub fn elapsed(&self) -> f64 {
        if self.state.is_recording() {
            self.transport.local_clock() - self.record.session_start_timestamp
        } else {
            0.0
        }
    }

    /// Reference window pointer producers normalize against; stored in the record
    pub fn set_capture_reference(&mut self, reference: Option<WindowReference>) {
        self.capture_reference = reference;
        self.record.capture_reference = reference;
    }

    /// Start recording using the configured filters and resolve budget
    pub fn start_default(&mut self) -> Result<StartReport> {
        let filters = self.settings.stream_filters.clone();
        let wait = Duration::from_millis(self.settings.resolve_wait_ms);
        self.start(&filters, wait)
    }

    /// Resolve streams matching `filters` and open one inlet per stream.
    ///
    /// Discovering nothing is not an error: recording proceeds with zero
    /// inlets and the report carries [`SyncError::DiscoveryEmpty`].
    pub fn start<S: AsRef<str>>(
        &mut self,
        filters: &[S],
        wait_budget: Duration,
    ) -> Result<StartReport> {
        match self.state {
            RecorderState::Idle => {}
            RecorderState::Recording => {
                return Err(SyncError::InvalidState(format!(
                    "session '{}' is already recording",
                    self.session_id
                )));
            }
            RecorderState::Stopped => {
                return Err(SyncError::InvalidState(format!(
                    "session '{}' has stopped; start a new recorder",
                    self.session_id
                )));
            }
        }

        let resolved = self.resolver.resolve_filtered(filters, wait_budget);
        let mut report = StartReport::default();
        let mut record = SessionRecord::new(self.session_id.clone(), 0.0);
        record.capture_reference = self.capture_reference;
        self.inlets.clear();

        for descriptor in resolved {
            match self.transport.open_inlet(&descriptor) {
                Ok(inlet) => {
                    let descriptor = Arc::new(descriptor);
                    report.streams.push(descriptor.name.clone());
                    self.inlets.push(InletSlot {
                        inlet,
                        stream_index: record.streams.len(),
                        descriptor: Arc::clone(&descriptor),
                        last_relative: None,
                        last_offset: None,
                        lost: false,
                    });
                    record.streams.push(descriptor);
                }
                Err(e) => {
                    tracing::warn!("Could not open inlet for '{}': {}", descriptor.name, e);
                    report.failed_to_open.push(descriptor.name);
                }
            }
        }

        record.session_start_timestamp = self.transport.local_clock();
        self.record = record;
        self.stats = RecorderStats::default();
        self.state = RecorderState::Recording;

        if self.inlets.is_empty() {
            tracing::info!(
                "No streams discovered for session '{}', recording with zero inlets",
                self.session_id
            );
            report.warning = Some(SyncError::DiscoveryEmpty(wait_budget));
        } else {
            tracing::info!(
                "Recording session '{}' from {} stream(s): {}",
                self.session_id,
                self.inlets.len(),
                report.streams.join(", ")
            );
        }

        Ok(report)
    }

    /// Drain pending samples from every inlet without blocking.
    ///
    /// A failing inlet is reported and skipped; the others are still drained.
    /// A sample whose relative time would move backwards within its stream
    /// is dropped.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        if !self.state.is_recording() {
            return report;
        }
        self.stats.ticks += 1;

        let start = self.record.session_start_timestamp;
        let max_pulls = self.settings.max_pulls_per_tick.max(1);

        for slot in self.inlets.iter_mut().filter(|slot| !slot.lost) {
            for _ in 0..max_pulls {
                let sample = match slot.inlet.pull_sample() {
                    Ok(Some(sample)) => sample,
                    Ok(None) => break,
                    Err(e) => {
                        if matches!(e, SyncError::StreamClosed(_)) {
                            slot.lost = true;
                            self.stats.streams_lost += 1;
                            tracing::info!("Stream '{}' went away", slot.descriptor.name);
                        } else {
                            self.stats.pull_failures += 1;
                            tracing::debug!("Pull failed on '{}': {}", slot.descriptor.name, e);
                        }
                        report.failures.push(SyncError::PullFailure {
                            stream: slot.descriptor.name.clone(),
                            message: e.to_string(),
                        });
                        break;
                    }
                };

                let relative_time = sample.timestamp - start;
                if slot.last_relative.is_some_and(|last| relative_time < last) {
                    report.out_of_order += 1;
                    self.stats.out_of_order_dropped += 1;
                    tracing::debug!(
                        "Dropping out-of-order sample on '{}' at {:.6}",
                        slot.descriptor.name,
                        relative_time
                    );
                    continue;
                }

                let clock_offset = slot.inlet.time_correction().ok().or(slot.last_offset);
                slot.last_offset = clock_offset;
                slot.last_relative = Some(relative_time);

                self.record.samples.push(RecordedSample {
                    timestamp: sample.timestamp,
                    relative_time,
                    stream_index: slot.stream_index,
                    stream: Arc::clone(&slot.descriptor),
                    data: sample.data,
                    clock_offset,
                    local_time_when_recorded: Some(self.transport.local_clock()),
                });
                report.pulled += 1;
            }
        }

        self.stats.samples_recorded += report.pulled as u64;
        report
    }

    /// Release all inlets. Calling this more than once has no further effect.
    pub fn stop(&mut self) {
        if self.state != RecorderState::Recording {
            return;
        }
        for slot in &mut self.inlets {
            slot.inlet.close();
        }
        self.inlets.clear();
        self.state = RecorderState::Stopped;
        tracing::info!(
            "Stopped session '{}' with {} sample(s)",
            self.session_id,
            self.record.samples.len()
        );
    }

    /// Stop if needed and hand over the record.
    ///
    /// A recorder that never started stays idle; otherwise it is stopped for
    /// good and only an empty record remains behind.
    pub fn take_record(&mut self) -> SessionRecord {
        self.stop();
        let fresh = SessionRecord::new(self.session_id.clone(), 0.0);
        std::mem::replace(&mut self.record, fresh)
    }
}

//! Capture session orchestration
//!
//! [`CaptureSession`] owns the producers this process publishes (the event
//! stream fed by the bridge and the pointer stream) together with the
//! recorder that subscribes to them and to any other announced stream.
//! The caller drives [`CaptureSession::tick`] at the recorder tick interval.

use std::path::Path;
use std::sync::Arc;

use crate::config::{ProducerSettings, SyncConfig};
use crate::error::{Result, ResultExt};
use crate::producer::{BridgeReport, BridgeSender, EventBridge, EventProducer, PointerProducer};
use crate::storage::{RecordSink, SaveReport};
use crate::transport::Transport;
use crate::types::{PointerEventKind, WindowReference};
use crate::value::Value;

use super::recorder::{SessionRecorder, StartReport, TickReport};
use super::types::{SessionRecord, SESSION_END_EVENT, SESSION_START_EVENT, VIDEO_START_EVENT};

/// Result of one [`CaptureSession::tick`]
#[derive(Debug, Default)]
pub struct CaptureTick {
    pub bridge: BridgeReport,
    pub recorded: TickReport,
}

/// A running capture: producers, bridge and recorder for one session
pub struct CaptureSession {
    session_id: String,
    events: EventProducer,
    pointer: PointerProducer,
    bridge: EventBridge,
    recorder: SessionRecorder,
    sink: RecordSink,
    record_file: String,
    end_requested: bool,
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("session_id", &self.session_id)
            .field("recorder", &self.recorder)
            .field("end_requested", &self.end_requested)
            .finish()
    }
}

impl CaptureSession {
    /// Announce this session's streams, start recording and emit the
    /// `session_start` marker
    pub fn start(
        session_id: impl Into<String>,
        transport: Arc<dyn Transport>,
        config: &SyncConfig,
    ) -> Result<(Self, StartReport)> {
        let session_id = session_id.into();
        let source_id = ProducerSettings::source_id(&session_id);

        let events = EventProducer::new(
            transport.as_ref(),
            config.producers.event_stream_name.clone(),
            source_id.clone(),
        )
        .context("Failed to announce event stream")?;
        let pointer = PointerProducer::new(transport.as_ref(), &config.producers, source_id)
            .context("Failed to announce pointer stream")?;

        let mut recorder =
            SessionRecorder::with_settings(session_id.clone(), transport, config.recorder.clone());
        recorder.set_capture_reference(config.producers.capture_reference);
        let report = recorder.start_default()?;

        let mut session = Self {
            session_id,
            events,
            pointer,
            bridge: EventBridge::new(config.producers.bridge_capacity),
            recorder,
            sink: RecordSink::new(&config.storage),
            record_file: config.storage.record_file_name.clone(),
            end_requested: false,
        };
        let marker = Value::from([("session_id", Value::from(session.session_id.as_str()))]);
        session.events.emit_event(SESSION_START_EVENT, marker)?;
        Ok((session, report))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn recorder(&self) -> &SessionRecorder {
        &self.recorder
    }

    pub fn record(&self) -> &SessionRecord {
        self.recorder.record()
    }

    /// Handle for the embedded-content side to post messages
    pub fn bridge_sender(&self) -> BridgeSender {
        self.bridge.sender()
    }

    /// Whether a `session_end` message arrived through the bridge
    pub fn end_requested(&self) -> bool {
        self.end_requested
    }

    /// Record a pointer position; returns the published coordinates
    pub fn pointer(&mut self, x: f64, y: f64, kind: PointerEventKind) -> Result<(f64, f64)> {
        self.pointer.emit(x, y, kind)
    }

    /// Update the capture window size used for pointer normalization
    pub fn set_capture_reference(&mut self, reference: Option<WindowReference>) {
        self.pointer.set_reference(reference);
        self.recorder.set_capture_reference(reference);
    }

    /// Emit an application event on this session's event stream
    pub fn emit_event(&mut self, event_type: &str, data: Value) -> Result<()> {
        self.events.emit_event(event_type, data)
    }

    /// Mark the first video frame on the session timeline
    pub fn video_started(&mut self, fps: f64) -> Result<()> {
        self.events
            .emit_event(VIDEO_START_EVENT, Value::from([("fps", Value::from(fps))]))
    }

    /// Forward bridge messages, then drain every inlet
    pub fn tick(&mut self) -> CaptureTick {
        let bridge = self.bridge.pump(&mut self.events);
        if bridge.session_end_requested {
            self.end_requested = true;
        }
        CaptureTick {
            bridge,
            recorded: self.recorder.tick(),
        }
    }

    /// Emit `session_end`, drain what is pending, stop and save the record
    /// under `<out_dir>/<session_id>/`
    pub fn finish(mut self, out_dir: impl AsRef<Path>) -> Result<(SessionRecord, SaveReport)> {
        self.bridge.pump(&mut self.events);
        if let Err(e) = self.events.emit_event(SESSION_END_EVENT, Value::map()) {
            tracing::warn!("Could not emit session end marker: {}", e);
        }
        while self.recorder.tick().pulled > 0 {}
        self.recorder.stop();

        let record = self.recorder.take_record();
        let path = RecordSink::record_path(out_dir, &self.session_id, &self.record_file);
        let report = self.sink.save(&record, path)?;
        Ok((record, report))
    }
}

//! Integration tests for the recording workflow
//!
//! These tests validate capture end to end:
//! - Producers publishing into a transport
//! - Recorder discovery, filtering and per-tick draining
//! - Per-stream failure isolation and clock offsets
//! - Persisting and reloading the record

mod common;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use common::assert_float_eq;
use common::builders::{event_stream, signal_stream};
use common::mock_helpers::{scripted_inlet, transport_with, PullScript};
use parking_lot::Mutex;
use proptest::prelude::*;
use tempfile::tempdir;

use syncscope::clock::{ManualClock, OffsetClock, SharedClock};
use syncscope::error::SyncError;
use syncscope::producer::{EventProducer, SampleProducer};
use syncscope::session::{RecorderState, SessionRecorder};
use syncscope::storage::RecordSink;
use syncscope::transport::{Inlet, LocalTransport, Outlet, Transport};
use syncscope::types::{ChannelData, Sample, StreamDescriptor};
use syncscope::Value;

fn manual_transport(start: f64) -> (Arc<LocalTransport>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start));
    (Arc::new(LocalTransport::with_clock(clock.clone())), clock)
}

#[test]
fn test_record_save_and_reload() {
    let (transport, clock) = manual_transport(500.0);
    let mut events = EventProducer::new(transport.as_ref(), "App", "s1").unwrap();
    let signal = SampleProducer::new(transport.as_ref(), signal_stream("EEG", 2, 100.0), None).unwrap();

    let mut recorder = SessionRecorder::new("workflow", transport.clone());
    let report = recorder.start_default().unwrap();
    assert_eq!(report.streams, vec!["App".to_string(), "EEG".to_string()]);
    assert!(report.warning.is_none());

    clock.advance(0.25);
    events
        .emit_event("click", Value::from([("id", Value::from("start"))]))
        .unwrap();
    signal.emit(&[1.0, 2.0]).unwrap();
    clock.advance(0.25);
    signal.emit(&[3.0, 4.0]).unwrap();

    let tick = recorder.tick();
    assert_eq!(tick.pulled, 3);
    assert!(tick.failures.is_empty());

    let record = recorder.take_record();
    assert_eq!(recorder.state(), RecorderState::Stopped);
    assert_eq!(record.session_start_timestamp, 500.0);

    let eeg: Vec<f64> = record.stream_samples("EEG").map(|s| s.relative_time).collect();
    assert_eq!(eeg, vec![0.25, 0.5]);
    assert!(record.samples.iter().all(|s| s.clock_offset == Some(0.0)));

    let dir = tempdir().unwrap();
    let path = RecordSink::record_path(dir.path(), "workflow", "lsl_recorded_data.json");
    let saved = RecordSink::default().save(&record, &path).unwrap();
    assert_eq!(saved.samples_written, 3);

    let loaded = RecordSink::load(&path).unwrap();
    assert_eq!(loaded.record, record);
    assert_eq!(loaded.skipped_samples, 0);
}

#[test]
fn test_stream_filters_limit_inlets() {
    let (transport, _clock) = manual_transport(0.0);
    let _eeg = SampleProducer::new(transport.as_ref(), signal_stream("EEG_Left", 1, 10.0), None).unwrap();
    let _other = SampleProducer::new(transport.as_ref(), signal_stream("Gaze", 1, 10.0), None).unwrap();

    let mut recorder = SessionRecorder::new("filtered", transport);
    let report = recorder.start(&["eeg", "  "], common::test_timeout()).unwrap();
    assert_eq!(report.streams, vec!["EEG_Left".to_string()]);
}

#[test]
fn test_empty_session_still_produces_a_record() {
    let (transport, _clock) = manual_transport(0.0);
    let mut recorder = SessionRecorder::new("empty", transport);
    let report = recorder.start(&["missing"], Duration::from_millis(20)).unwrap();
    assert!(matches!(report.warning, Some(SyncError::DiscoveryEmpty(_))));

    assert_eq!(recorder.tick().pulled, 0);
    recorder.stop();
    recorder.stop();

    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.json");
    RecordSink::default().save(recorder.record(), &path).unwrap();
    let loaded = RecordSink::load(&path).unwrap();
    assert_eq!(loaded.record.session_id, "empty");
    assert!(loaded.record.streams.is_empty());
    assert!(loaded.record.samples.is_empty());
}

#[test]
fn test_device_clock_offset_aligns_streams() {
    let (transport, clock) = manual_transport(100.0);
    let device_clock: SharedClock = Arc::new(OffsetClock::new(clock.clone(), 2.0));
    let device =
        SampleProducer::new(transport.as_ref(), signal_stream("Device", 1, 50.0), Some(device_clock))
            .unwrap();
    let local = SampleProducer::new(transport.as_ref(), signal_stream("Local", 1, 50.0), None).unwrap();

    let mut recorder = SessionRecorder::new("offsets", transport);
    recorder.start_default().unwrap();

    clock.advance(1.0);
    device.emit(&[1.0]).unwrap();
    local.emit(&[1.0]).unwrap();
    recorder.tick();

    let record = recorder.record();
    let device_sample = record.stream_samples("Device").next().unwrap();
    let local_sample = record.stream_samples("Local").next().unwrap();

    assert_float_eq(device_sample.clock_offset.unwrap(), -2.0, 1e-9);
    assert_float_eq(device_sample.relative_time, 3.0, 1e-9);
    assert_float_eq(
        device_sample.aligned_relative_time().unwrap(),
        local_sample.aligned_relative_time().unwrap(),
        1e-9,
    );
}

#[test]
fn test_pull_failures_are_isolated() {
    let flaky = signal_stream("Flaky", 1, 10.0);
    let steady = signal_stream("Steady", 1, 10.0);
    let closing = event_stream("Closing");

    let sample = |t: f64| Ok(Some(Sample::new(t, ChannelData::Numeric(vec![t]))));
    let mut scripts: HashMap<String, PullScript> = HashMap::new();
    scripts.insert(
        "Flaky".into(),
        Arc::new(Mutex::new(VecDeque::from(vec![
            Err(SyncError::Transport("glitch".into())),
            sample(10.5),
        ]))),
    );
    scripts.insert(
        "Steady".into(),
        Arc::new(Mutex::new(VecDeque::from(vec![
            sample(10.2),
            sample(10.8),
            sample(10.6),
        ]))),
    );
    scripts.insert(
        "Closing".into(),
        Arc::new(Mutex::new(VecDeque::from(vec![Err(SyncError::StreamClosed(
            "Closing".into(),
        ))]))),
    );

    let mut transport = transport_with(vec![flaky, steady, closing], 10.0);
    transport.expect_open_inlet().returning(move |descriptor| {
        let script = scripts.get(&descriptor.name).cloned().unwrap_or_default();
        Ok(Box::new(scripted_inlet(descriptor.clone(), script, 0.0)) as Box<dyn Inlet>)
    });

    let mut recorder = SessionRecorder::new("isolated", Arc::new(transport));
    recorder.start_default().unwrap();

    let first = recorder.tick();
    assert_eq!(first.failures.len(), 2);
    assert!(first
        .failures
        .iter()
        .all(|e| matches!(e, SyncError::PullFailure { .. })));
    assert_eq!(first.pulled, 2);
    assert_eq!(first.out_of_order, 1);

    let second = recorder.tick();
    assert!(second.failures.is_empty());
    assert_eq!(second.pulled, 1);

    let stats = recorder.stats();
    assert_eq!(stats.pull_failures, 1);
    assert_eq!(stats.streams_lost, 1);
    assert_eq!(stats.out_of_order_dropped, 1);
    assert_eq!(stats.samples_recorded, 3);

    let steady_times: Vec<f64> = recorder
        .record()
        .stream_samples("Steady")
        .map(|s| s.relative_time)
        .collect();
    assert_eq!(steady_times.len(), 2);
    assert!(steady_times.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_restart_while_recording_is_rejected() {
    let (transport, _clock) = manual_transport(0.0);
    let mut recorder = SessionRecorder::new("twice", transport);
    recorder.start(&["x"], Duration::from_millis(5)).unwrap();
    assert!(matches!(
        recorder.start(&["x"], Duration::from_millis(5)),
        Err(SyncError::InvalidState(_))
    ));
}

#[test]
fn test_same_name_streams_survive_reload() {
    let (transport, clock) = manual_transport(50.0);
    let mut left = EventProducer::new(transport.as_ref(), "BridgeEvents", "s1").unwrap();
    let mut right = EventProducer::new(transport.as_ref(), "BridgeEvents", "s2").unwrap();

    let mut recorder = SessionRecorder::new("twins", transport.clone());
    recorder.start_default().unwrap();
    clock.advance(0.5);
    left.emit_event("click", Value::map()).unwrap();
    right.emit_event("click", Value::map()).unwrap();
    assert_eq!(recorder.tick().pulled, 2);

    let record = recorder.take_record();
    assert_eq!(record.streams.len(), 2);

    let mut buf = Vec::new();
    RecordSink::default().write(&record, &mut buf).unwrap();
    let loaded = RecordSink::read(buf.as_slice()).unwrap();
    assert_eq!(loaded.record, record);

    let mut sources: Vec<&str> = loaded
        .record
        .samples
        .iter()
        .map(|s| {
            assert_eq!(loaded.record.streams[s.stream_index], s.stream);
            s.stream.source_id.as_str()
        })
        .collect();
    sources.sort_unstable();
    assert_eq!(sources, vec!["s1", "s2"]);
}

proptest! {
    #[test]
    fn prop_relative_time_never_decreases_per_stream(
        pushes in prop::collection::vec((any::<bool>(), -10.0f64..100.0, any::<bool>()), 1..120),
    ) {
        let (transport, _clock) = manual_transport(0.0);
        let outlets: Vec<Box<dyn Outlet>> = ["A", "B"]
            .iter()
            .map(|name| {
                transport
                    .create_outlet(StreamDescriptor::event(*name, "mono"), None)
                    .unwrap()
            })
            .collect();

        let mut recorder = SessionRecorder::new("mono", transport.clone());
        recorder.start_default().unwrap();

        let total = pushes.len() as u64;
        for (second, t, tick) in pushes {
            let data = ChannelData::Text(vec![t.to_string()]);
            outlets[usize::from(second)]
                .push_sample(Sample::new(t, data))
                .unwrap();
            if tick {
                recorder.tick();
            }
        }
        while recorder.tick().pulled > 0 {}

        for name in ["A", "B"] {
            let times: Vec<f64> = recorder
                .record()
                .stream_samples(name)
                .map(|s| s.relative_time)
                .collect();
            prop_assert!(times.windows(2).all(|w| w[0] <= w[1]), "{}: {:?}", name, times);
        }
        let stats = recorder.stats();
        prop_assert_eq!(stats.samples_recorded + stats.out_of_order_dropped, total);
    }
}

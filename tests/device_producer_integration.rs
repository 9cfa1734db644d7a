//! Integration tests for the external device path
//!
//! A simulated acquisition device runs on its worker thread and is recorded
//! through the local transport like any other stream.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{assert_float_eq, wait_until};

use syncscope::clock::{MonotonicClock, OffsetClock, SharedClock};
use syncscope::config::DeviceSettings;
use syncscope::producer::{ExternalDeviceProducer, SignalPattern, SimulatedDevice};
use syncscope::session::SessionRecorder;
use syncscope::types::{ChannelData, StreamKind};
use syncscope::{LocalTransport, SyncError};

fn fast_settings() -> DeviceSettings {
    DeviceSettings {
        stream_name: "SimDevice".to_string(),
        warmup_ms: 0,
        idle_sleep_ms: 1,
        join_timeout_ms: 2000,
        ..DeviceSettings::default()
    }
}

#[test]
fn test_device_stream_is_recorded_with_offset() {
    let transport = Arc::new(LocalTransport::new());
    let device_clock: SharedClock = Arc::new(OffsetClock::new(MonotonicClock::shared(), 1.5));
    let device = SimulatedDevice::new(
        "sim",
        200.0,
        vec![SignalPattern::Constant(1.0), SignalPattern::Constant(2.0)],
    )
    .with_clock(device_clock);

    let mut producer =
        ExternalDeviceProducer::start(transport.clone(), Box::new(device), fast_settings(), "dev_1")
            .unwrap();
    assert!(wait_until(Duration::from_secs(2), || producer
        .stats()
        .stream_announced()));
    assert_eq!(producer.stats().channel_count(), 2);

    let mut recorder = SessionRecorder::new("device", transport.clone());
    let report = recorder.start_default().unwrap();
    assert_eq!(report.streams, vec!["SimDevice".to_string()]);

    assert!(wait_until(Duration::from_secs(2), || {
        recorder.tick();
        recorder.stats().samples_recorded >= 5
    }));

    let record = recorder.record();
    assert_eq!(
        record.streams[0].kind,
        StreamKind::External {
            device: "sim".to_string()
        }
    );
    let first = record.stream_samples("SimDevice").next().unwrap();
    assert_eq!(first.data, ChannelData::Numeric(vec![1.0, 2.0]));
    assert_float_eq(first.clock_offset.unwrap(), -1.5, 0.01);
    assert!(first.aligned_relative_time().unwrap() < first.relative_time);

    assert!(producer.stop_with_timeout(Duration::from_secs(2)));
    assert!(!producer.is_running());
    assert_eq!(transport.stream_count(), 0);

    // Remaining samples drain, then the stream is reported lost
    assert!(wait_until(Duration::from_secs(2), || {
        recorder.tick();
        recorder.stats().streams_lost == 1
    }));
    assert!(producer.stop());
}

#[test]
fn test_unavailable_device_fails_to_start() {
    let transport = Arc::new(LocalTransport::new());
    let err = ExternalDeviceProducer::start(
        transport.clone(),
        Box::new(SimulatedDevice::unavailable("ghost")),
        fast_settings(),
        "dev_2",
    )
    .err()
    .unwrap();

    assert!(matches!(err.root(), SyncError::Device(_)));
    assert!(err.to_string().contains("ghost"));
    assert_eq!(transport.stream_count(), 0);
}

#[test]
fn test_rows_follow_the_nominal_rate() {
    let transport = Arc::new(LocalTransport::new());
    let device = SimulatedDevice::new(
        "ramp",
        500.0,
        vec![SignalPattern::Sine {
            frequency: 2.0,
            amplitude: 1.0,
            offset: 0.0,
        }],
    );
    let mut producer =
        ExternalDeviceProducer::start(transport, Box::new(device), fast_settings(), "dev_3").unwrap();

    assert!(wait_until(Duration::from_secs(2), || producer
        .stats()
        .rows_pushed()
        >= 50));
    assert_eq!(producer.stats().rows_skipped(), 0);
    assert_eq!(producer.stats().read_errors(), 0);
    assert!(producer.stop());
}

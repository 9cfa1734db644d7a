//! Test to verify test infrastructure works correctly

mod common;

use common::builders::{event_stream, pointer_stream, typed_event, RecordBuilder};
use common::mock_helpers::{scripted_inlet, transport_with};
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use syncscope::transport::{Inlet, Transport};
use syncscope::types::{ChannelData, Sample};

#[test]
fn test_infrastructure_setup() {
    let record = RecordBuilder::new("infra")
        .stream(event_stream("events"))
        .stream(pointer_stream("mouse"))
        .event("events", 0.0, typed_event("session_start"))
        .numeric("mouse", 0.1, &[0.5, 0.5, 0.0])
        .build();

    assert_eq!(record.streams.len(), 2);
    assert_eq!(record.samples[1].stream_index, 1);
    assert_eq!(
        record.samples[0].payload().event_type(),
        Some("session_start")
    );
}

#[test]
fn test_mock_transport_and_inlet() {
    let transport = transport_with(vec![event_stream("events")], 42.0);
    assert_eq!(transport.local_clock(), 42.0);
    assert_eq!(transport.resolve(common::test_timeout()).len(), 1);

    let script = Arc::new(Mutex::new(VecDeque::from(vec![Ok(Some(Sample::new(
        1.0,
        ChannelData::Numeric(vec![1.0]),
    )))])));
    let mut inlet = scripted_inlet(event_stream("events"), Arc::clone(&script), 0.5);
    assert!(inlet.pull_sample().unwrap().is_some());
    assert!(inlet.pull_sample().unwrap().is_none());
    assert_eq!(inlet.time_correction().unwrap(), 0.5);
    assert_eq!(inlet.descriptor().name, "events");
    assert!(script.lock().is_empty());
}

#[test]
fn test_float_comparison() {
    common::assert_float_eq(1.0, 1.0000001, 0.001);
}

#[test]
#[should_panic]
fn test_float_comparison_fails() {
    common::assert_float_eq(1.0, 2.0, 0.001);
}

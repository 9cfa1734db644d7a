//! Mock construction helpers

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use mockall::mock;
use parking_lot::Mutex;

use syncscope::clock::SharedClock;
use syncscope::error::Result;
use syncscope::transport::{Inlet, Outlet, Transport};
use syncscope::types::{Sample, StreamDescriptor};

mock! {
    pub TestTransport {}

    impl Transport for TestTransport {
        fn local_clock(&self) -> f64;
        fn resolve(&self, wait_budget: Duration) -> Vec<StreamDescriptor>;
        fn open_inlet(&self, descriptor: &StreamDescriptor) -> Result<Box<dyn Inlet>>;
        fn create_outlet(
            &self,
            descriptor: StreamDescriptor,
            clock: Option<SharedClock>,
        ) -> Result<Box<dyn Outlet>>;
    }
}

mock! {
    pub TestInlet {}

    impl Inlet for TestInlet {
        fn descriptor(&self) -> &StreamDescriptor;
        fn pull_sample(&mut self) -> Result<Option<Sample>>;
        fn time_correction(&mut self) -> Result<f64>;
        fn close(&mut self);
    }
}

/// Scripted pull results, shared so a test can inspect what is left
pub type PullScript = Arc<Mutex<VecDeque<Result<Option<Sample>>>>>;

/// Inlet that replays `script`, then reports nothing pending
pub fn scripted_inlet(descriptor: StreamDescriptor, script: PullScript, offset: f64) -> MockTestInlet {
    let mut inlet = MockTestInlet::new();
    inlet.expect_descriptor().return_const(descriptor);
    inlet
        .expect_pull_sample()
        .returning(move || script.lock().pop_front().unwrap_or(Ok(None)));
    inlet.expect_time_correction().returning(move || Ok(offset));
    inlet.expect_close().return_const(());
    inlet
}

/// Transport announcing `streams` with a fixed local clock reading
pub fn transport_with(streams: Vec<StreamDescriptor>, now: f64) -> MockTestTransport {
    let mut transport = MockTestTransport::new();
    transport.expect_local_clock().return_const(now);
    transport
        .expect_resolve()
        .returning(move |_| streams.clone());
    transport
}

//! Synchronization clocks
//!
//! Every timestamp in syncscope is seconds as `f64` on some clock. The
//! recorder reads the local synchronization clock; producers stamp samples on
//! their own clock, which may belong to a different domain (a device with its
//! own oscillator). Inlets measure the offset between the two domains.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Monotonic clock in seconds
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time in seconds
    fn now(&self) -> f64;
}

/// Shared clock handle
pub type SharedClock = Arc<dyn Clock>;

static PROCESS_EPOCH: OnceLock<Instant> = OnceLock::new();

/// Seconds since the process-wide synchronization epoch
pub fn local_clock() -> f64 {
    PROCESS_EPOCH.get_or_init(Instant::now).elapsed().as_secs_f64()
}

/// The process-wide monotonic synchronization clock
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicClock;

impl MonotonicClock {
    pub fn shared() -> SharedClock {
        Arc::new(MonotonicClock)
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        local_clock()
    }
}

/// A clock in a foreign domain: `base + offset`
///
/// The offset is adjustable at runtime so drift can be simulated.
#[derive(Debug)]
pub struct OffsetClock {
    base: SharedClock,
    offset_bits: AtomicU64,
}

impl OffsetClock {
    pub fn new(base: SharedClock, offset: f64) -> Self {
        Self {
            base,
            offset_bits: AtomicU64::new(offset.to_bits()),
        }
    }

    pub fn offset(&self) -> f64 {
        f64::from_bits(self.offset_bits.load(Ordering::Acquire))
    }

    pub fn set_offset(&self, offset: f64) {
        self.offset_bits.store(offset.to_bits(), Ordering::Release);
    }
}

impl Clock for OffsetClock {
    fn now(&self) -> f64 {
        self.base.now() + self.offset()
    }
}

/// Manually driven clock for tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            bits: AtomicU64::new(start.to_bits()),
        }
    }

    pub fn set(&self, time: f64) {
        self.bits.store(time.to_bits(), Ordering::Release);
    }

    pub fn advance(&self, delta: f64) {
        let mut current = self.bits.load(Ordering::Acquire);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match self.bits.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

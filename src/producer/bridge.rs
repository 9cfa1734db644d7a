//! Bridge from embedded content into the event stream
//!
//! Embedded content (a web view, a plugin) posts raw strings through a
//! [`BridgeSender`] from any thread. The owning loop calls
//! [`EventBridge::pump`] each tick to forward structured events to an
//! [`EventProducer`]. Posting never blocks; a full queue drops the message.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use super::EventProducer;
use crate::session::SESSION_END_EVENT;
use crate::value::Value;

/// Default bridge queue capacity
pub const DEFAULT_BRIDGE_CAPACITY: usize = 1024;

/// A parsed bridge message
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeMessage {
    /// JSON object with a `type` field, normalized to carry `timestamp` and `data`
    Event(Value),
    /// Anything else
    Plain(String),
}

/// Parse a raw bridge message.
///
/// Objects with a `type` field become events with a `timestamp` (added if
/// absent) and a `data` object (empty if absent).
pub fn parse_bridge_message(raw: &str) -> BridgeMessage {
    match Value::parse(raw) {
        Ok(mut value) if value.event_type().is_some() => {
            if value.get("timestamp").is_none() {
                value.insert("timestamp", Value::String(chrono::Local::now().to_rfc3339()));
            }
            if value.get("data").is_none() {
                value.insert("data", Value::map());
            }
            BridgeMessage::Event(value)
        }
        _ => BridgeMessage::Plain(raw.to_string()),
    }
}

/// Cloneable posting handle for embedded content
#[derive(Debug, Clone)]
pub struct BridgeSender {
    tx: Sender<String>,
    dropped: Arc<AtomicU64>,
}

impl BridgeSender {
    /// Post a message; returns false if it was dropped
    pub fn post(&self, message: impl Into<String>) -> bool {
        match self.tx.try_send(message.into()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Bridge queue full, dropping message");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Result of one [`EventBridge::pump`]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BridgeReport {
    pub forwarded: usize,
    pub plain: usize,
    pub failed: usize,
    /// A `session_end` event arrived; it is not forwarded
    pub session_end_requested: bool,
}

/// Receiving side of the bridge
#[derive(Debug)]
pub struct EventBridge {
    tx: Sender<String>,
    rx: Receiver<String>,
    dropped: Arc<AtomicU64>,
}

impl Default for EventBridge {
    fn default() -> Self {
        Self::new(DEFAULT_BRIDGE_CAPACITY)
    }
}

impl EventBridge {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self {
            tx,
            rx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Handle for the embedded-content side
    pub fn sender(&self) -> BridgeSender {
        BridgeSender {
            tx: self.tx.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }

    /// Messages waiting to be pumped
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Messages dropped because the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Drain all pending messages without blocking
    pub fn drain(&self) -> Vec<BridgeMessage> {
        self.rx
            .try_iter()
            .map(|raw| parse_bridge_message(&raw))
            .collect()
    }

    /// Forward pending structured events to `producer`
    pub fn pump(&self, producer: &mut EventProducer) -> BridgeReport {
        let mut report = BridgeReport::default();
        for message in self.drain() {
            match message {
                BridgeMessage::Event(value) if value.event_type() == Some(SESSION_END_EVENT) => {
                    tracing::info!("Session end requested through bridge");
                    report.session_end_requested = true;
                }
                BridgeMessage::Event(value) => match producer.emit(value) {
                    Ok(()) => report.forwarded += 1,
                    Err(e) => {
                        tracing::warn!("Failed to forward bridge event: {}", e);
                        report.failed += 1;
                    }
                },
                BridgeMessage::Plain(text) => {
                    tracing::debug!("Bridge message: {}", text);
                    report.plain += 1;
                }
            }
        }
        report
    }
}

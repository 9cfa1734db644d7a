//! Per-component settings
//!
//! Each component reads its own section of [`super::SyncConfig`]. Every field
//! has a serde default so partial TOML files load cleanly.
//!
//! # Main Types
//!
//! - [`RecorderSettings`] - Tick interval, resolve budget, stream filters
//! - [`ProducerSettings`] - Stream names and pointer sampling
//! - [`DeviceSettings`] - External device worker behaviour
//! - [`TransportSettings`] - Inlet queue sizing
//! - [`PlaybackSettings`] - Trail window, fps fallback, speed bounds
//! - [`StorageSettings`] - Record file naming and formatting

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::WindowReference;

/// Default recorder tick interval (50 Hz)
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 20;

/// Default resolve budget
pub const DEFAULT_RESOLVE_WAIT_MS: u64 = 2000;

/// Default pointer sampling period (10 Hz)
pub const DEFAULT_POINTER_PERIOD_MS: u64 = 100;

/// Default join timeout for device workers
pub const DEFAULT_JOIN_TIMEOUT_MS: u64 = 5000;

/// Channel count used when a device cannot report one
pub const DEFAULT_FALLBACK_CHANNELS: usize = 16;

/// Default record file name
pub const DEFAULT_RECORD_FILE: &str = "lsl_recorded_data.json";

fn default_tick_interval_ms() -> u64 {
    DEFAULT_TICK_INTERVAL_MS
}

fn default_resolve_wait_ms() -> u64 {
    DEFAULT_RESOLVE_WAIT_MS
}

fn default_max_pulls() -> usize {
    256
}

/// Session recorder settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderSettings {
    /// Interval between recorder ticks
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// How long `start` waits for the first stream announcement
    #[serde(default = "default_resolve_wait_ms")]
    pub resolve_wait_ms: u64,

    /// Case-insensitive stream name filters (empty = all)
    #[serde(default)]
    pub stream_filters: Vec<String>,

    /// Upper bound on samples pulled from one inlet per tick
    #[serde(default = "default_max_pulls")]
    pub max_pulls_per_tick: usize,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            resolve_wait_ms: DEFAULT_RESOLVE_WAIT_MS,
            stream_filters: Vec::new(),
            max_pulls_per_tick: default_max_pulls(),
        }
    }
}

impl RecorderSettings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn resolve_wait(&self) -> Duration {
        Duration::from_millis(self.resolve_wait_ms)
    }
}

fn default_event_stream() -> String {
    "SyncScope_BridgeEvents".to_string()
}

fn default_pointer_stream() -> String {
    "SyncScope_PointerTracking".to_string()
}

fn default_pointer_period_ms() -> u64 {
    DEFAULT_POINTER_PERIOD_MS
}

fn default_true() -> bool {
    true
}

fn default_bridge_capacity() -> usize {
    1024
}

/// In-process producer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerSettings {
    #[serde(default = "default_event_stream")]
    pub event_stream_name: String,

    #[serde(default = "default_pointer_stream")]
    pub pointer_stream_name: String,

    /// Pointer sampling period
    #[serde(default = "default_pointer_period_ms")]
    pub pointer_period_ms: u64,

    /// Normalize pointer positions against the capture reference
    #[serde(default = "default_true")]
    pub normalize_pointer: bool,

    /// Capacity of the embedded-content bridge queue
    #[serde(default = "default_bridge_capacity")]
    pub bridge_capacity: usize,

    /// Capture window used as the normalization reference
    #[serde(default)]
    pub capture_reference: Option<WindowReference>,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            event_stream_name: default_event_stream(),
            pointer_stream_name: default_pointer_stream(),
            pointer_period_ms: DEFAULT_POINTER_PERIOD_MS,
            normalize_pointer: true,
            bridge_capacity: default_bridge_capacity(),
            capture_reference: None,
        }
    }
}

impl ProducerSettings {
    /// Nominal pointer rate in Hz
    pub fn pointer_rate(&self) -> f64 {
        1000.0 / self.pointer_period_ms.max(1) as f64
    }

    /// Source id shared by producers of one session
    pub fn source_id(session_id: &str) -> String {
        format!("session_{session_id}")
    }
}

fn default_device_stream() -> String {
    "ExternalDevice".to_string()
}

fn default_device_content_type() -> String {
    "Biosignal".to_string()
}

fn default_fallback_channels() -> usize {
    DEFAULT_FALLBACK_CHANNELS
}

fn default_warmup_ms() -> u64 {
    200
}

fn default_idle_sleep_ms() -> u64 {
    10
}

fn default_join_timeout_ms() -> u64 {
    DEFAULT_JOIN_TIMEOUT_MS
}

/// External device producer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(default = "default_device_stream")]
    pub stream_name: String,

    #[serde(default = "default_device_content_type")]
    pub content_type: String,

    /// Channel count used when neither warm-up nor the device reports one
    #[serde(default = "default_fallback_channels")]
    pub fallback_channels: usize,

    /// Time to let the device buffer fill before measuring its shape
    #[serde(default = "default_warmup_ms")]
    pub warmup_ms: u64,

    /// Sleep between reads when the device has nothing
    #[serde(default = "default_idle_sleep_ms")]
    pub idle_sleep_ms: u64,

    /// How long `stop` waits for the worker to finish
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            stream_name: default_device_stream(),
            content_type: default_device_content_type(),
            fallback_channels: DEFAULT_FALLBACK_CHANNELS,
            warmup_ms: default_warmup_ms(),
            idle_sleep_ms: default_idle_sleep_ms(),
            join_timeout_ms: DEFAULT_JOIN_TIMEOUT_MS,
        }
    }
}

impl DeviceSettings {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

fn default_queue_capacity() -> usize {
    crate::transport::DEFAULT_QUEUE_CAPACITY
}

/// Transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportSettings {
    /// Samples buffered per inlet before new ones are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_trail_window() -> f64 {
    2.0
}

fn default_fps() -> f64 {
    30.0
}

fn default_min_speed() -> f64 {
    0.1
}

fn default_max_speed() -> f64 {
    10.0
}

fn default_update_interval_ms() -> u64 {
    100
}

/// Playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Trail length in seconds
    #[serde(default = "default_trail_window")]
    pub trail_window_s: f64,

    /// Frame rate assumed when the video reports none
    #[serde(default = "default_fps")]
    pub default_fps: f64,

    #[serde(default = "default_min_speed")]
    pub min_speed: f64,

    #[serde(default = "default_max_speed")]
    pub max_speed: f64,

    /// Interval at which a playback driver calls `advance`
    #[serde(default = "default_update_interval_ms")]
    pub update_interval_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            trail_window_s: default_trail_window(),
            default_fps: default_fps(),
            min_speed: default_min_speed(),
            max_speed: default_max_speed(),
            update_interval_ms: default_update_interval_ms(),
        }
    }
}

fn default_record_file() -> String {
    DEFAULT_RECORD_FILE.to_string()
}

/// Record storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "default_record_file")]
    pub record_file_name: String,

    /// Pretty-print record JSON
    #[serde(default = "default_true")]
    pub pretty: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            record_file_name: default_record_file(),
            pretty: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_defaults() {
        let settings = RecorderSettings::default();
        assert_eq!(settings.tick_interval(), Duration::from_millis(20));
        assert_eq!(settings.resolve_wait(), Duration::from_secs(2));
        assert!(settings.stream_filters.is_empty());
    }

    #[test]
    fn test_pointer_rate() {
        let settings = ProducerSettings::default();
        assert_eq!(settings.pointer_rate(), 10.0);
        assert_eq!(ProducerSettings::source_id("abc"), "session_abc");
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let settings: PlaybackSettings = toml::from_str("trail_window_s = 5.0").unwrap();
        assert_eq!(settings.trail_window_s, 5.0);
        assert_eq!(settings.default_fps, 30.0);
        assert_eq!(settings.max_speed, 10.0);
    }
}

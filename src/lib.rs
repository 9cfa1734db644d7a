//! # SyncScope: Multi-stream session capture and synchronized replay
//!
//! SyncScope records time-stamped samples from several independent producers
//! (structured application events, pointer tracking, external acquisition
//! devices) into one session record, and replays that record against a
//! companion screen recording with a single scrub position.
//!
//! ## Architecture
//!
//! - **Transport**: streams announced by producers and discovered by the
//!   recorder; [`transport::LocalTransport`] is the in-process implementation
//! - **Producers**: event, sample, pointer and external-device publishers
//! - **Recorder**: non-blocking per-tick drain of every inlet with per-stream
//!   clock offsets
//! - **Storage**: versioned JSON records with degraded saves and migration of
//!   older files
//! - **Playback**: nearest-sample lookup, trails and video frame mapping
//! - **Geometry**: coordinate normalization between capture and render frames
//!
//! ## Configuration
//!
//! Settings are read from `syncscope.toml` in the platform data directory
//! under `dev.hxyulin.syncscope`:
//!
//! - **Linux**: `~/.local/share/dev.hxyulin.syncscope/`
//! - **macOS**: `~/Library/Application Support/dev.hxyulin.syncscope/`
//! - **Windows**: `%APPDATA%\dev.hxyulin.syncscope\`
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use syncscope::{
//!     session::{CaptureSession, PlaybackEngine},
//!     storage::RecordSink,
//!     transport::LocalTransport,
//!     types::PointerEventKind,
//!     SyncConfig,
//! };
//!
//! fn main() -> syncscope::Result<()> {
//!     let config = SyncConfig::load_default_location();
//!     let transport = Arc::new(LocalTransport::new());
//!
//!     let (mut capture, _report) = CaptureSession::start("demo", transport, &config)?;
//!     capture.pointer(320.0, 240.0, PointerEventKind::Press)?;
//!     capture.tick();
//!     let (_record, saved) = capture.finish("recordings")?;
//!
//!     if let Some(path) = saved.path {
//!         let loaded = RecordSink::load(path)?;
//!         let mut engine = PlaybackEngine::new(loaded.record);
//!         engine.seek(0.5);
//!         for sample in engine.samples_at(engine.current_time()) {
//!             println!("{} @ {:.3}s", sample.stream_name(), sample.relative_time);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod geometry;
pub mod producer;
pub mod session;
pub mod storage;
pub mod transport;
pub mod types;
pub mod value;

// Re-export commonly used types
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use session::{CaptureSession, PlaybackEngine, SessionRecord, SessionRecorder};
pub use storage::RecordSink;
pub use transport::{LocalTransport, StreamResolver, Transport};
pub use types::{StreamDescriptor, StreamKind, WindowReference};
pub use value::Value;

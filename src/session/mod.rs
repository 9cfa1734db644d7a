//! Session recording and playback module
//!
//! A session moves through two lifetimes:
//!
//! - **Capture**: [`SessionRecorder`] pulls samples from every resolved
//!   stream into a [`SessionRecord`]; [`CaptureSession`] wires it to this
//!   process's own producers.
//! - **Review**: after the record is saved and reloaded, [`PlaybackEngine`]
//!   maps a scrub position to a video frame, the nearest sample of each
//!   stream and a pointer trail. The tables in [`tables`] give a flat view
//!   for inspection.

pub mod capture;
pub mod player;
pub mod recorder;
pub mod tables;
pub mod types;
pub mod video;

pub use capture::{CaptureSession, CaptureTick};
pub use player::{Overlay, OverlayPoint, PlaybackEngine, PlaybackState};
pub use recorder::{SessionRecorder, StartReport, TickReport};
pub use tables::{event_rows, sample_row, sample_rows, EventRow, SampleRow};
pub use types::{
    Payload, RecordedSample, RecorderState, RecorderStats, SessionRecord, SyncInfo,
    SESSION_END_EVENT, SESSION_START_EVENT, VIDEO_START_EVENT,
};
pub use video::{companion_video_path, FrameSource, VideoInfo, VideoStatus};

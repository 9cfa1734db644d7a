//! Companion video handling
//!
//! Frame decoding lives outside this crate. The playback engine only needs a
//! frame rate, a frame count and, for overlays, the frame size; a decoder
//! provides those through [`FrameSource`].

use std::path::{Path, PathBuf};

use crate::types::WindowReference;

/// Legacy companion video name, used before names carried the session id
pub const LEGACY_VIDEO_FILE: &str = "screen_recording.mp4";

/// Companion video file name for a session
pub fn video_file_name(session_id: &str) -> String {
    format!("screen_recording_{}.mp4", session_id)
}

/// Locate the companion video in `dir`, preferring the session-specific name
pub fn companion_video_path(dir: impl AsRef<Path>, session_id: &str) -> Option<PathBuf> {
    let dir = dir.as_ref();
    [dir.join(video_file_name(session_id)), dir.join(LEGACY_VIDEO_FILE)]
        .into_iter()
        .find(|path| path.is_file())
}

/// Static metadata of an opened video
pub trait FrameSource: Send {
    fn fps(&self) -> f64;

    fn frame_count(&self) -> u64;

    /// Frame dimensions in pixels, when known
    fn frame_size(&self) -> Option<WindowReference> {
        None
    }
}

/// Plain metadata, for callers that probe the video themselves
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub fps: f64,
    pub frame_count: u64,
    pub frame_size: Option<WindowReference>,
}

impl VideoInfo {
    pub fn new(fps: f64, frame_count: u64) -> Self {
        Self {
            fps,
            frame_count,
            frame_size: None,
        }
    }

    pub fn with_frame_size(mut self, size: WindowReference) -> Self {
        self.frame_size = Some(size);
        self
    }

    /// Length in seconds
    pub fn duration(&self) -> f64 {
        if self.fps > 0.0 {
            self.frame_count as f64 / self.fps
        } else {
            0.0
        }
    }

    fn from_source(source: &dyn FrameSource) -> Self {
        Self {
            fps: source.fps(),
            frame_count: source.frame_count(),
            frame_size: source.frame_size(),
        }
    }
}

impl FrameSource for VideoInfo {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn frame_size(&self) -> Option<WindowReference> {
        self.frame_size
    }
}

/// Whether frame lookup is possible
#[derive(Debug, Clone, PartialEq)]
pub enum VideoStatus {
    Available(VideoInfo),
    /// Frame lookup is disabled; tables and sample lookups still work
    Unavailable(String),
}

impl Default for VideoStatus {
    fn default() -> Self {
        VideoStatus::Unavailable("no companion video attached".to_string())
    }
}

impl VideoStatus {
    /// Build a status from a decoder, rejecting unusable metadata
    pub fn from_source(source: &dyn FrameSource) -> Self {
        let info = VideoInfo::from_source(source);
        if !(info.fps.is_finite() && info.fps > 0.0) {
            VideoStatus::Unavailable(format!("invalid frame rate {}", info.fps))
        } else if info.frame_count == 0 {
            VideoStatus::Unavailable("video has no frames".to_string())
        } else {
            VideoStatus::Available(info)
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, VideoStatus::Available(_))
    }

    pub fn info(&self) -> Option<&VideoInfo> {
        match self {
            VideoStatus::Available(info) => Some(info),
            VideoStatus::Unavailable(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_companion_lookup_prefers_session_name() {
        let dir = tempdir().unwrap();
        assert_eq!(companion_video_path(dir.path(), "abc"), None);

        std::fs::write(dir.path().join(LEGACY_VIDEO_FILE), b"").unwrap();
        assert_eq!(
            companion_video_path(dir.path(), "abc"),
            Some(dir.path().join(LEGACY_VIDEO_FILE))
        );

        std::fs::write(dir.path().join("screen_recording_abc.mp4"), b"").unwrap();
        assert_eq!(
            companion_video_path(dir.path(), "abc"),
            Some(dir.path().join("screen_recording_abc.mp4"))
        );
    }

    #[test]
    fn test_status_rejects_bad_metadata() {
        assert!(VideoStatus::from_source(&VideoInfo::new(30.0, 90)).is_available());
        assert!(!VideoStatus::from_source(&VideoInfo::new(0.0, 90)).is_available());
        assert!(!VideoStatus::from_source(&VideoInfo::new(30.0, 0)).is_available());
        assert_eq!(VideoInfo::new(30.0, 90).duration(), 3.0);
    }
}

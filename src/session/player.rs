//! Playback engine for recorded sessions
//!
//! The engine owns a loaded [`SessionRecord`] and a scrub position in
//! seconds since session start. From that position it answers:
//!
//! - which video frame to show
//! - which sample of each stream is closest in time
//! - which recent positions form the fading trail overlay
//!
//! Lookups go through a per-stream index of arrival positions, keyed by
//! stream identity (name and source id). Name-based lookups use the first
//! stream with that name in record order. Streams whose relative times are
//! non-decreasing (the normal case) are searched with a binary search;
//! anything else falls back to a linear scan.

use std::collections::HashMap;

use crate::config::PlaybackSettings;
use crate::error::{Result, SyncError};
use crate::geometry::ViewportFit;
use crate::types::StreamDescriptor;

use super::types::{RecordedSample, SessionRecord};
use super::video::{FrameSource, VideoStatus};

/// Scrub state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    /// Seconds since session start, always within `[0, duration]`
    pub current_time: f64,
    pub duration: f64,
    pub speed_multiplier: f64,
    pub is_playing: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            current_time: 0.0,
            duration: 0.0,
            speed_multiplier: 1.0,
            is_playing: false,
        }
    }
}

impl PlaybackState {
    /// Playback progress (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        (self.current_time / self.duration).clamp(0.0, 1.0)
    }

    pub fn at_end(&self) -> bool {
        self.current_time >= self.duration
    }
}

/// One trail point in view coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayPoint {
    pub x: f64,
    pub y: f64,
    /// Opacity in `[0, 1)`, rising toward the newest point
    pub alpha: f64,
}

/// Pointer overlay for one scrub position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    /// Nearest pointer position, in view coordinates
    pub cursor: Option<(f64, f64)>,
    /// Trail from oldest to newest
    pub trail: Vec<OverlayPoint>,
}

#[derive(Debug, Default)]
struct StreamIndex {
    /// Positions into `SessionRecord::samples`, in arrival order
    positions: Vec<usize>,
    times: Vec<f64>,
    monotonic: bool,
}

impl StreamIndex {
    /// Index into `positions` of the sample closest to `time`
    fn nearest(&self, time: f64) -> Option<usize> {
        if self.monotonic {
            nearest_sorted(&self.times, time)
        } else {
            nearest_linear(&self.times, time)
        }
    }

    /// Range into `positions` with times in `[start, end]`
    fn window(&self, start: f64, end: f64) -> Vec<usize> {
        if self.monotonic {
            let lo = self.times.partition_point(|&t| t < start);
            let hi = self.times.partition_point(|&t| t <= end);
            (lo..hi.max(lo)).collect()
        } else {
            self.times
                .iter()
                .enumerate()
                .filter(|(_, &t)| t >= start && t <= end)
                .map(|(i, _)| i)
                .collect()
        }
    }
}

fn nearest_sorted(times: &[f64], time: f64) -> Option<usize> {
    let after = times.partition_point(|&t| t < time);
    let mut best = match (after.checked_sub(1), after < times.len()) {
        (Some(before), true) => {
            if time - times[before] <= times[after] - time {
                before
            } else {
                after
            }
        }
        (Some(before), false) => before,
        (None, true) => after,
        (None, false) => return None,
    };
    // Earliest of a run of equal timestamps
    while best > 0 && times[best - 1] == times[best] {
        best -= 1;
    }
    Some(best)
}

fn nearest_linear(times: &[f64], time: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, t) in times.iter().enumerate() {
        let distance = (t - time).abs();
        if !distance.is_finite() {
            continue;
        }
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((i, distance));
        }
    }
    best.map(|(i, _)| i)
}

/// `(name, source_id)` of a stream
type StreamKey = (String, String);

fn stream_key(stream: &StreamDescriptor) -> StreamKey {
    (stream.name.clone(), stream.source_id.clone())
}

/// Replays a loaded record against an optional companion video
#[derive(Debug)]
pub struct PlaybackEngine {
    record: SessionRecord,
    state: PlaybackState,
    index: HashMap<StreamKey, StreamIndex>,
    /// Indexed streams: record stream order, then unlisted ones sorted
    order: Vec<StreamKey>,
    video: VideoStatus,
    video_anchor: f64,
    settings: PlaybackSettings,
}

impl PlaybackEngine {
    pub fn new(record: SessionRecord) -> Self {
        Self::with_settings(record, PlaybackSettings::default())
    }

    pub fn with_settings(record: SessionRecord, settings: PlaybackSettings) -> Self {
        let mut index: HashMap<StreamKey, StreamIndex> = HashMap::new();
        for (position, sample) in record.samples.iter().enumerate() {
            let entry = index.entry(stream_key(&sample.stream)).or_default();
            entry.positions.push(position);
            entry.times.push(sample.relative_time);
        }
        for ((name, source_id), entry) in index.iter_mut() {
            entry.monotonic = entry.times.windows(2).all(|w| w[0] <= w[1]);
            if !entry.monotonic {
                tracing::warn!(
                    "Stream '{}' ({}) has out-of-order relative times; using linear lookup",
                    name,
                    source_id
                );
            }
        }

        let mut order: Vec<StreamKey> = Vec::new();
        for stream in &record.streams {
            let key = stream_key(stream);
            if index.contains_key(&key) && !order.contains(&key) {
                order.push(key);
            }
        }
        // Samples of streams missing from the stream list still get a lookup
        let mut extra: Vec<StreamKey> = index
            .keys()
            .filter(|key| !order.contains(key))
            .cloned()
            .collect();
        extra.sort_unstable();
        order.extend(extra);

        let video_anchor = record.video_anchor().unwrap_or(0.0);
        tracing::debug!(
            "Loaded record '{}' for playback: {} stream(s), {} sample(s)",
            record.session_id,
            index.len(),
            record.sample_count()
        );

        let mut engine = Self {
            record,
            state: PlaybackState::default(),
            index,
            order,
            video: VideoStatus::default(),
            video_anchor,
            settings,
        };
        engine.refresh_duration();
        engine
    }

    pub fn record(&self) -> &SessionRecord {
        &self.record
    }

    /// Give the record back, ending playback
    pub fn into_record(self) -> SessionRecord {
        self.record
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_time(&self) -> f64 {
        self.state.current_time
    }

    pub fn duration(&self) -> f64 {
        self.state.duration
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing
    }

    pub fn progress(&self) -> f64 {
        self.state.progress()
    }

    /// Offset of the video's first frame on the session timeline
    pub fn video_anchor(&self) -> f64 {
        self.video_anchor
    }

    /// Names of streams that have at least one sample, without repeats
    pub fn stream_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for (name, _) in &self.order {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        names
    }

    /// Index of the first stream named `name`
    fn lookup(&self, name: &str) -> Option<&StreamIndex> {
        self.order
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|key| self.index.get(key))
    }

    fn nearest_in(&self, entry: &StreamIndex, time: f64) -> Option<&RecordedSample> {
        if time.is_nan() {
            return None;
        }
        let i = entry.nearest(time)?;
        self.record.samples.get(entry.positions[i])
    }

    fn trail_in(&self, entry: &StreamIndex, time: f64, window: f64) -> Vec<&RecordedSample> {
        if window.is_nan() || window < 0.0 || time.is_nan() {
            return Vec::new();
        }
        entry
            .window(time - window, time)
            .into_iter()
            .filter_map(|i| self.record.samples.get(entry.positions[i]))
            .collect()
    }

    // ==================== Transport controls ====================

    /// Start playing; restarts from the beginning when at the end
    pub fn play(&mut self) {
        if self.state.duration > 0.0 && self.state.at_end() {
            self.state.current_time = 0.0;
        }
        self.state.is_playing = true;
    }

    pub fn pause(&mut self) {
        self.state.is_playing = false;
    }

    pub fn toggle_play(&mut self) {
        if self.state.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Pause and rewind to the start
    pub fn stop(&mut self) {
        self.state.is_playing = false;
        self.state.current_time = 0.0;
    }

    /// Move the scrub position, clamped to `[0, duration]`
    pub fn seek(&mut self, time: f64) {
        if time.is_nan() {
            return;
        }
        self.state.current_time = time.clamp(0.0, self.state.duration);
    }

    /// Seek by progress (0.0 to 1.0)
    pub fn seek_progress(&mut self, progress: f64) {
        if progress.is_nan() {
            return;
        }
        self.seek(progress.clamp(0.0, 1.0) * self.state.duration);
    }

    /// Seek to the first event of `event_type`; returns its time
    pub fn seek_to_event(&mut self, event_type: &str) -> Option<f64> {
        let time = self
            .record
            .samples
            .iter()
            .filter(|s| s.stream.kind.is_event())
            .find(|s| s.payload().event_type() == Some(event_type))
            .map(|s| s.relative_time)?;
        self.seek(time);
        Some(self.state.current_time)
    }

    /// Move forward by `delta_time` scaled by the speed multiplier.
    ///
    /// Reaching the end clamps to `duration` and stops playback. Returns
    /// `true` when the end was reached.
    pub fn advance(&mut self, delta_time: f64) -> bool {
        if !delta_time.is_finite() {
            return false;
        }
        let next = self.state.current_time + delta_time * self.state.speed_multiplier;
        self.state.current_time = next.clamp(0.0, self.state.duration);
        if next >= self.state.duration {
            self.state.is_playing = false;
            return true;
        }
        false
    }

    /// Set the speed multiplier, clamped to the configured bounds
    pub fn set_speed(&mut self, multiplier: f64) {
        if multiplier.is_nan() {
            return;
        }
        self.state.speed_multiplier =
            multiplier.clamp(self.settings.min_speed, self.settings.max_speed);
    }

    // ==================== Video ====================

    /// Attach a companion video; unusable metadata disables frame lookup
    pub fn attach_video(&mut self, source: &dyn FrameSource) -> &VideoStatus {
        self.video = VideoStatus::from_source(source);
        match &self.video {
            VideoStatus::Available(info) => tracing::info!(
                "Video attached: {} frames at {:.2} fps, anchored at {:.3}s",
                info.frame_count,
                info.fps,
                self.video_anchor
            ),
            VideoStatus::Unavailable(reason) => {
                tracing::warn!("Video frame lookup disabled: {}", reason)
            }
        }
        self.refresh_duration();
        &self.video
    }

    /// Disable frame lookup, e.g. when the companion file is missing
    pub fn set_video_unavailable(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::info!("Video frame lookup disabled: {}", reason);
        self.video = VideoStatus::Unavailable(reason);
        self.refresh_duration();
    }

    pub fn video_status(&self) -> &VideoStatus {
        &self.video
    }

    /// Frame shown at the current position for a video running at `fps`
    pub fn video_frame_index(&self, fps: f64) -> Result<u64> {
        let info = match &self.video {
            VideoStatus::Available(info) => info,
            VideoStatus::Unavailable(reason) => {
                return Err(SyncError::VideoUnavailable(reason.clone()))
            }
        };
        if !(fps.is_finite() && fps > 0.0) {
            return Err(SyncError::VideoUnavailable(format!(
                "invalid frame rate {}",
                fps
            )));
        }
        let last = info.frame_count.saturating_sub(1) as f64;
        let frame = ((self.state.current_time - self.video_anchor) * fps)
            .round()
            .clamp(0.0, last);
        Ok(frame as u64)
    }

    /// Frame at the current position, using the video's own frame rate
    pub fn current_frame(&self) -> Result<u64> {
        let fps = self
            .video
            .info()
            .map(|info| info.fps)
            .unwrap_or(self.settings.default_fps);
        self.video_frame_index(fps)
    }

    fn refresh_duration(&mut self) {
        let video_end = self
            .video
            .info()
            .map(|info| self.video_anchor + info.duration())
            .unwrap_or(0.0);
        self.state.duration = self.record.duration().max(video_end).max(0.0);
        self.state.current_time = self.state.current_time.clamp(0.0, self.state.duration);
    }

    // ==================== Lookups ====================

    /// Sample of `stream` closest to `time`; ties go to the earliest
    pub fn nearest_sample(&self, stream: &str, time: f64) -> Option<&RecordedSample> {
        self.nearest_in(self.lookup(stream)?, time)
    }

    /// [`nearest_sample`](Self::nearest_sample) for the stream with the
    /// identity of `stream`
    pub fn nearest_sample_of(
        &self,
        stream: &StreamDescriptor,
        time: f64,
    ) -> Option<&RecordedSample> {
        self.nearest_in(self.index.get(&stream_key(stream))?, time)
    }

    /// Samples of `stream` with relative time in `[time - window, time]`,
    /// in arrival order
    pub fn trail(&self, stream: &str, time: f64, window: f64) -> Vec<&RecordedSample> {
        match self.lookup(stream) {
            Some(entry) => self.trail_in(entry, time, window),
            None => Vec::new(),
        }
    }

    /// [`trail`](Self::trail) for the stream with the identity of `stream`
    pub fn trail_of(
        &self,
        stream: &StreamDescriptor,
        time: f64,
        window: f64,
    ) -> Vec<&RecordedSample> {
        match self.index.get(&stream_key(stream)) {
            Some(entry) => self.trail_in(entry, time, window),
            None => Vec::new(),
        }
    }

    /// Trail using the configured window
    pub fn default_trail(&self, stream: &str, time: f64) -> Vec<&RecordedSample> {
        self.trail(stream, time, self.settings.trail_window_s)
    }

    /// Nearest sample of every stream at `time`, including streams that
    /// share a name
    pub fn samples_at(&self, time: f64) -> Vec<&RecordedSample> {
        self.order
            .iter()
            .filter_map(|key| self.index.get(key))
            .filter_map(|entry| self.nearest_in(entry, time))
            .collect()
    }

    /// Nearest recorded pointer position of `stream`, as recorded
    pub fn pointer_at(&self, stream: &str, time: f64) -> Option<(f64, f64)> {
        self.nearest_sample(stream, time)?.position()
    }

    /// Cursor and fading trail of `stream` mapped into a view
    pub fn overlay(&self, stream: &str, time: f64, window: f64, fit: &ViewportFit) -> Overlay {
        let map = |sample: &RecordedSample| {
            sample
                .position()
                .map(|(x, y)| fit.map_point(x, y, sample.stream.coordinate_space()))
        };

        let cursor = self.nearest_sample(stream, time).and_then(map);
        let points: Vec<(f64, f64)> = self
            .trail(stream, time, window)
            .into_iter()
            .filter_map(map)
            .collect();
        let len = points.len() as f64;
        let trail = points
            .into_iter()
            .enumerate()
            .map(|(i, (x, y))| OverlayPoint {
                x,
                y,
                alpha: i as f64 / len,
            })
            .collect();

        Overlay { cursor, trail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::video::VideoInfo;
    use crate::types::{ChannelData, CoordinateSpace, StreamDescriptor, WindowReference};
    use std::sync::Arc;

    fn record_with(stream: StreamDescriptor, points: &[(f64, Vec<f64>)]) -> SessionRecord {
        let stream = Arc::new(stream);
        let mut record = SessionRecord::new("test", 0.0);
        record.streams.push(Arc::clone(&stream));
        for (t, values) in points {
            record.samples.push(RecordedSample {
                timestamp: *t,
                relative_time: *t,
                stream_index: 0,
                stream: Arc::clone(&stream),
                data: ChannelData::Numeric(values.clone()),
                clock_offset: Some(0.0),
                local_time_when_recorded: Some(*t),
            });
        }
        record
    }

    fn mouse(times: &[f64]) -> PlaybackEngine {
        let points: Vec<(f64, Vec<f64>)> = times.iter().map(|t| (*t, vec![*t, *t, 0.0])).collect();
        PlaybackEngine::new(record_with(
            StreamDescriptor::pointer("mouse", 10.0, CoordinateSpace::Normalized, "s"),
            &points,
        ))
    }

    #[test]
    fn test_engine_lifecycle() {
        let mut engine = mouse(&[0.0, 1.0, 2.0]);
        assert_eq!(engine.duration(), 2.0);
        assert!(!engine.is_playing());

        engine.play();
        assert!(engine.is_playing());
        engine.toggle_play();
        assert!(!engine.is_playing());

        engine.seek(1.5);
        engine.stop();
        assert_eq!(engine.current_time(), 0.0);
    }

    #[test]
    fn test_seek_clamps() {
        let mut engine = mouse(&[0.0, 4.0]);
        engine.seek(-3.0);
        assert_eq!(engine.current_time(), 0.0);
        engine.seek(99.0);
        assert_eq!(engine.current_time(), 4.0);
        engine.seek_progress(0.25);
        assert_eq!(engine.current_time(), 1.0);
        assert_eq!(engine.progress(), 0.25);
    }

    #[test]
    fn test_advance_stops_at_end() {
        let mut engine = mouse(&[0.0, 1.0]);
        engine.play();
        engine.set_speed(2.0);
        assert!(!engine.advance(0.25));
        assert_eq!(engine.current_time(), 0.5);
        assert!(engine.advance(1.0));
        assert_eq!(engine.current_time(), 1.0);
        assert!(!engine.is_playing());

        // Playing again from the end restarts
        engine.play();
        assert_eq!(engine.current_time(), 0.0);
    }

    #[test]
    fn test_speed_bounds() {
        let mut engine = mouse(&[0.0, 1.0]);
        engine.set_speed(100.0);
        assert_eq!(engine.state().speed_multiplier, 10.0);
        engine.set_speed(0.0);
        assert_eq!(engine.state().speed_multiplier, 0.1);
    }

    #[test]
    fn test_nearest_sample() {
        let engine = mouse(&[0.1, 0.5, 0.9]);
        let nearest = engine.nearest_sample("mouse", 0.3).unwrap();
        assert_eq!(nearest.relative_time, 0.1);
        assert_eq!(engine.nearest_sample("mouse", 10.0).unwrap().relative_time, 0.9);
        assert!(engine.nearest_sample("missing", 0.3).is_none());
    }

    #[test]
    fn test_nearest_tie_prefers_earlier() {
        let engine = mouse(&[0.0, 1.0, 3.0]);
        assert_eq!(engine.nearest_sample("mouse", 2.0).unwrap().relative_time, 1.0);

        let engine = mouse(&[1.0, 1.0, 2.0]);
        let nearest = engine.nearest_sample("mouse", 1.0).unwrap();
        assert!(std::ptr::eq(nearest, &engine.record().samples[0]));
    }

    #[test]
    fn test_non_monotonic_stream_uses_linear_scan() {
        let engine = mouse(&[0.0, 5.0, 2.0, 9.0]);
        assert_eq!(engine.nearest_sample("mouse", 2.2).unwrap().relative_time, 2.0);
        let trail: Vec<f64> = engine
            .trail("mouse", 5.0, 4.0)
            .iter()
            .map(|s| s.relative_time)
            .collect();
        assert_eq!(trail, vec![5.0, 2.0]);
    }

    #[test]
    fn test_trail_window() {
        let engine = mouse(&[2.9, 3.5, 4.9, 5.0, 6.0]);
        let trail: Vec<f64> = engine
            .trail("mouse", 5.0, 2.0)
            .iter()
            .map(|s| s.relative_time)
            .collect();
        assert_eq!(trail, vec![3.5, 4.9, 5.0]);
        assert!(engine.trail("mouse", 5.0, -1.0).is_empty());
    }

    #[test]
    fn test_video_frame_index() {
        let mut engine = mouse(&[0.0, 2.0]);
        assert!(matches!(
            engine.video_frame_index(30.0),
            Err(SyncError::VideoUnavailable(_))
        ));

        engine.attach_video(&VideoInfo::new(30.0, 45));
        engine.seek(1.0);
        assert_eq!(engine.video_frame_index(30.0).unwrap(), 30);
        engine.seek(2.0);
        assert_eq!(engine.current_frame().unwrap(), 44);
    }

    #[test]
    fn test_video_extends_duration() {
        let mut engine = mouse(&[0.0, 1.0]);
        engine.attach_video(&VideoInfo::new(10.0, 50));
        assert_eq!(engine.duration(), 5.0);
        engine.set_video_unavailable("missing");
        assert_eq!(engine.duration(), 1.0);
    }

    #[test]
    fn test_overlay_maps_normalized_points() {
        let engine = mouse(&[0.0, 0.25, 0.5]);
        let fit = ViewportFit::letterbox(
            WindowReference::new(100.0, 100.0),
            WindowReference::new(200.0, 100.0),
        )
        .unwrap();
        let overlay = engine.overlay("mouse", 0.5, 1.0, &fit);
        assert_eq!(overlay.cursor, Some((100.0, 50.0)));
        assert_eq!(overlay.trail.len(), 3);
        assert_eq!(overlay.trail[0].alpha, 0.0);
        assert_eq!(overlay.trail[0].x, 50.0);
    }

    #[test]
    fn test_same_name_streams_stay_apart() {
        let first = Arc::new(StreamDescriptor::event("Bridge", "s1"));
        let second = Arc::new(StreamDescriptor::event("Bridge", "s2"));
        let mut record = SessionRecord::new("dup", 0.0);
        record.streams = vec![Arc::clone(&first), Arc::clone(&second)];
        for (i, (stream, t)) in [(&first, 1.0), (&second, 1.1), (&first, 3.0)]
            .into_iter()
            .enumerate()
        {
            record.samples.push(RecordedSample {
                timestamp: t,
                relative_time: t,
                stream_index: usize::from(Arc::ptr_eq(stream, &second)),
                stream: Arc::clone(stream),
                data: ChannelData::Text(vec![i.to_string()]),
                clock_offset: None,
                local_time_when_recorded: None,
            });
        }

        let engine = PlaybackEngine::new(record);
        assert_eq!(engine.stream_names(), vec!["Bridge"]);
        assert_eq!(engine.nearest_sample("Bridge", 1.2).unwrap().relative_time, 1.0);
        assert_eq!(
            engine.nearest_sample_of(&second, 2.9).unwrap().relative_time,
            1.1
        );
        assert_eq!(engine.trail("Bridge", 3.0, 5.0).len(), 2);
        assert_eq!(engine.trail_of(&second, 3.0, 5.0).len(), 1);

        let snapshot: Vec<&str> = engine
            .samples_at(1.1)
            .iter()
            .map(|s| s.stream.source_id.as_str())
            .collect();
        assert_eq!(snapshot, vec!["s1", "s2"]);
    }

    #[test]
    fn test_samples_at_covers_every_stream() {
        let mut record = record_with(
            StreamDescriptor::sample("A", "EEG", vec![], 10.0, "s"),
            &[(0.0, vec![1.0]), (1.0, vec![2.0])],
        );
        let other = Arc::new(StreamDescriptor::sample("B", "EEG", vec![], 10.0, "s"));
        record.streams.push(Arc::clone(&other));
        record.samples.push(RecordedSample {
            timestamp: 0.6,
            relative_time: 0.6,
            stream_index: 1,
            stream: other,
            data: ChannelData::Numeric(vec![3.0]),
            clock_offset: None,
            local_time_when_recorded: None,
        });

        let engine = PlaybackEngine::new(record);
        let snapshot: Vec<(&str, f64)> = engine
            .samples_at(0.8)
            .iter()
            .map(|s| (s.stream_name(), s.relative_time))
            .collect();
        assert_eq!(snapshot, vec![("A", 1.0), ("B", 0.6)]);
    }
}

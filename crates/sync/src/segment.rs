//! Per-segment bookkeeping. A segment is one contiguous recording interval;
//! consecutive segments are concatenated onto the output timeline by the
//! synchronizer's time offset.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentPhase {
    /// Waiting for the first input of every enabled stream.
    Waiting,
    /// Every enabled stream has delivered input; the worker may flush.
    Running,
    /// A new segment was requested; the worker drains what is buffered and
    /// then begins the next segment.
    Draining,
}

/// All timestamps are wall-clock microseconds from the capture sources.
#[derive(Debug)]
pub struct SegmentState {
    video_enabled: bool,
    audio_enabled: bool,

    pub phase: SegmentPhase,

    /// Whether each stream has delivered its first input of the segment.
    /// Disabled streams count as started.
    pub video_started: bool,
    pub audio_started: bool,

    pub video_start_time: i64,
    pub audio_start_time: i64,

    /// Running upper bound on the time each stream is valid through;
    /// non-decreasing within a segment.
    pub video_stop_time: i64,
    pub audio_stop_time: i64,

    /// Leading audio may be trimmed until the first samples have been handed
    /// to the encoder.
    pub audio_can_drop: bool,

    /// Samples consumed from the head of the audio queue, dropped samples
    /// included. Defines the wall-clock position of the queue head.
    pub audio_samples_read: i64,

    /// Timestamp of the last accepted input per stream, for gap detection.
    pub video_last_timestamp: i64,
    pub audio_last_timestamp: i64,

    /// Total artificial delay inserted into the video stream to absorb
    /// sustained drift.
    pub video_accumulated_delay: i64,
}

impl SegmentState {
    pub fn new(video_enabled: bool, audio_enabled: bool) -> Self {
        Self {
            video_enabled,
            audio_enabled,
            phase: SegmentPhase::Waiting,
            video_started: !video_enabled,
            audio_started: !audio_enabled,
            video_start_time: 0,
            audio_start_time: 0,
            video_stop_time: 0,
            audio_stop_time: 0,
            audio_can_drop: true,
            audio_samples_read: 0,
            video_last_timestamp: 0,
            audio_last_timestamp: 0,
            video_accumulated_delay: 0,
        }
    }

    /// Begin the next segment, forgetting all per-segment positions.
    pub fn reset(&mut self) {
        *self = Self::new(self.video_enabled, self.audio_enabled);
    }

    /// Whether any enabled stream has delivered input this segment.
    pub fn has_input(&self) -> bool {
        (self.video_enabled && self.video_started) || (self.audio_enabled && self.audio_started)
    }

    /// Whether every enabled stream has delivered input this segment.
    pub fn running(&self) -> bool {
        self.video_started && self.audio_started
    }

    pub fn start_video(&mut self, timestamp: i64) {
        self.video_started = true;
        self.video_start_time = timestamp;
        self.video_stop_time = timestamp;
        self.video_last_timestamp = timestamp;
        self.update_phase();
    }

    pub fn start_audio(&mut self, timestamp: i64) {
        self.audio_started = true;
        self.audio_start_time = timestamp;
        self.audio_stop_time = timestamp;
        self.audio_last_timestamp = timestamp;
        self.update_phase();
    }

    /// Forget the audio anchor so the next block re-anchors the stream. Only
    /// meaningful while leading audio may still be dropped.
    pub fn reanchor_audio(&mut self) {
        self.audio_started = !self.audio_enabled;
        self.audio_start_time = 0;
        self.audio_stop_time = 0;
        self.audio_last_timestamp = 0;
        self.audio_samples_read = 0;
        if self.phase == SegmentPhase::Running && !self.running() {
            self.phase = SegmentPhase::Waiting;
        }
    }

    fn update_phase(&mut self) {
        if self.phase == SegmentPhase::Waiting && self.running() {
            self.phase = SegmentPhase::Running;
        }
    }

    /// The window the worker may flush while the segment is running: from
    /// the latest stream start to the earliest stream stop. `None` until
    /// every enabled stream has started.
    pub fn window(&self) -> Option<(i64, i64)> {
        if !self.running() || !self.has_input() {
            return None;
        }

        Some(match (self.video_enabled, self.audio_enabled) {
            (true, true) => (
                self.video_start_time.max(self.audio_start_time),
                self.video_stop_time.min(self.audio_stop_time),
            ),
            (true, false) => (self.video_start_time, self.video_stop_time),
            (false, true) => (self.audio_start_time, self.audio_stop_time),
            (false, false) => return None,
        })
    }

    /// The window drained when the segment ends: extends to the farthest
    /// stream stop so neither stream is cut short.
    pub fn drain_window(&self) -> Option<(i64, i64)> {
        let video = self.video_enabled && self.video_started;
        let audio = self.audio_enabled && self.audio_started;

        Some(match (video, audio) {
            (true, true) => (
                self.video_start_time.max(self.audio_start_time),
                self.video_stop_time.max(self.audio_stop_time),
            ),
            (true, false) => (self.video_start_time, self.video_stop_time),
            (false, true) => (self.audio_start_time, self.audio_stop_time),
            (false, false) => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waits_for_both_streams() {
        let mut segment = SegmentState::new(true, true);
        assert_eq!(segment.phase, SegmentPhase::Waiting);
        assert!(segment.window().is_none());

        segment.start_video(2_000);
        assert_eq!(segment.phase, SegmentPhase::Waiting);
        assert!(segment.window().is_none());
        assert!(segment.has_input());

        segment.start_audio(1_000);
        assert_eq!(segment.phase, SegmentPhase::Running);

        segment.video_stop_time = 5_000;
        segment.audio_stop_time = 4_000;
        assert_eq!(segment.window(), Some((2_000, 4_000)));
        assert_eq!(segment.drain_window(), Some((2_000, 5_000)));
    }

    #[test]
    fn disabled_stream_counts_as_started() {
        let mut segment = SegmentState::new(true, false);
        assert!(!segment.has_input());

        segment.start_video(100);
        assert_eq!(segment.phase, SegmentPhase::Running);
        segment.video_stop_time = 900;
        assert_eq!(segment.window(), Some((100, 900)));
    }

    #[test]
    fn reset_returns_to_waiting() {
        let mut segment = SegmentState::new(true, true);
        segment.start_video(100);
        segment.start_audio(100);
        segment.audio_samples_read = 480;
        segment.audio_can_drop = false;
        segment.phase = SegmentPhase::Draining;

        segment.reset();
        assert_eq!(segment.phase, SegmentPhase::Waiting);
        assert!(!segment.has_input());
        assert!(segment.audio_can_drop);
        assert_eq!(segment.audio_samples_read, 0);
    }

    #[test]
    fn reanchor_audio_reopens_the_wait() {
        let mut segment = SegmentState::new(true, true);
        segment.start_video(100);
        segment.start_audio(100);
        segment.audio_samples_read = 128;

        segment.reanchor_audio();
        assert_eq!(segment.phase, SegmentPhase::Waiting);
        assert!(!segment.audio_started);
        assert_eq!(segment.audio_samples_read, 0);
        assert!(segment.window().is_none());

        segment.start_audio(50_000);
        assert_eq!(segment.phase, SegmentPhase::Running);
    }
}

//! The surface capture sources push into. Producers run on their own
//! threads; implementations must only block briefly.

use reel_media_info::{RawAudioFormat, RawVideoFormat};

use crate::SyncError;

pub trait VideoSink: Send + Sync {
    /// The earliest capture timestamp (µs) the next frame may carry. Lets a
    /// capture source skip grabbing frames that would be discarded anyway.
    fn next_video_timestamp(&self) -> i64;

    /// Push one raw frame. `data` is borrowed for the duration of the call;
    /// `timestamp` is the wall-clock capture time of the frame in µs.
    fn read_video_frame(
        &self,
        width: u32,
        height: u32,
        data: &[u8],
        stride: usize,
        format: RawVideoFormat,
        timestamp: i64,
    ) -> Result<(), SyncError>;

    /// Advance the video clock without data, so the common stop time keeps
    /// moving while capture is quiet.
    fn read_video_ping(&self, timestamp: i64);
}

pub trait AudioSink: Send + Sync {
    /// Push one block of interleaved samples. `data` is borrowed for the
    /// duration of the call; `timestamp` is the wall-clock capture time of
    /// the first sample in µs.
    fn read_audio_samples(
        &self,
        sample_rate: u32,
        channels: u16,
        data: &[u8],
        format: RawAudioFormat,
        timestamp: i64,
    ) -> Result<(), SyncError>;

    /// The source lost an unknown amount of audio.
    fn read_audio_hole(&self);
}

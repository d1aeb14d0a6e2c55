//! Alignment of free-running capture streams into encoder-ready output.
//!
//! The synchronizer ingests raw video frames and raw audio sample blocks,
//! each stamped with a wall-clock capture time in microseconds, and produces
//! two aligned streams with monotonic presentation timestamps. It corrects
//! persistent drift between the two capture clocks, fills gaps, bounds
//! buffering under producer/consumer mismatch, and hands finished frames to
//! the encoders from a background worker thread.

mod buffer;
mod convert;
mod drift;
mod encoders;
mod resample;
mod segment;
mod sinks;
mod synchronizer;

pub use drift::{DESYNC_CORRECTION_I, DESYNC_CORRECTION_P, DESYNC_ERROR_THRESHOLD};
pub use encoders::{AudioEncoder, VideoEncoder};
pub use sinks::{AudioSink, VideoSink};
pub use synchronizer::{
    SyncOptions, Synchronizer, MAX_AUDIO_BUFFERED_SECS, MAX_FRAME_DELAY, MAX_GAP_FRAMES,
    MAX_VIDEO_FRAMES_BUFFERED,
};

use thiserror::Error;

pub fn init() -> Result<(), SyncError> {
    ffmpeg::init()?;

    Ok(())
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("FFmpeg error: {0}")]
    FFmpeg(#[from] ffmpeg::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("AudioInfo: {0}")]
    AudioInfo(#[from] reel_media_info::AudioInfoError),

    #[error("The {0} stream is disabled")]
    StreamDisabled(&'static str),

    #[error("{0}")]
    Config(&'static str),
}

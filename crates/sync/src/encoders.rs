//! The downstream side of the synchronizer. Encoders are opaque consumers
//! of finished frames, owned by the emit worker thread.

use ffmpeg::frame;

/// Consumes video frames in the configured pixel format and dimensions.
/// Frame PTS is the output frame index (time base `1/frame_rate`).
pub trait VideoEncoder: Send {
    fn boxed(self) -> Box<dyn VideoEncoder + 'static>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }

    fn queue_frame(&mut self, frame: frame::Video) -> anyhow::Result<()>;
}

/// Consumes audio frames holding exactly `frame_size` samples in the
/// configured sample format, channel layout and rate. Frame PTS is the index
/// of the first sample (time base `1/sample_rate`).
pub trait AudioEncoder: Send {
    fn boxed(self) -> Box<dyn AudioEncoder + 'static>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }

    /// Number of samples the encoder requires per frame.
    fn frame_size(&self) -> usize;

    fn queue_frame(&mut self, frame: frame::Audio) -> anyhow::Result<()>;
}

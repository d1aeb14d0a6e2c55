//! Drift-adjusted resampling in front of the sample queue.

use ffmpeg::software::resampling;
use reel_media_info::{AudioInfo, ChannelLayout, FFAudio, Sample};

/// Relative change of the presented input rate below which the cached
/// resampler is kept. Rebuilding discards the context's fractional state, so
/// tiny controller jitter should not churn it.
const RATE_REBUILD_EPSILON: f64 = 1.0 / 8192.0;

/// Resamples capture blocks into the encoder's rate and channel layout,
/// absorbing clock drift on the way.
///
/// The resampler itself runs at a fixed ratio; drift correction works by
/// lying to it about the input rate. A block captured at `rate` is presented
/// as `rate / (1 + correction)`, so positive correction makes the context
/// produce more output samples per input second. The context is rebuilt only
/// when the presented rate moves past a small tolerance.
///
/// Output is staged in the packed twin of the encoder's sample format;
/// interleaved bytes are what the sample queue stores.
pub struct DriftResampler {
    staging: AudioInfo,
    context: Option<resampling::Context>,
    input: Option<(Sample, ChannelLayout, u32)>,
}

impl DriftResampler {
    pub fn new(output: AudioInfo) -> Self {
        Self {
            staging: output.packed(),
            context: None,
            input: None,
        }
    }

    /// Resample one interleaved capture block, appending packed bytes in the
    /// staging layout to `out`. Returns the number of output samples
    /// produced. `source` describes the block as captured (planar ffmpeg
    /// twin of its interleaved layout, true device rate).
    pub fn resample(
        &mut self,
        source: AudioInfo,
        data: &[u8],
        correction: f64,
        out: &mut Vec<u8>,
    ) -> Result<usize, ffmpeg::Error> {
        let presented = self.presented_rate(source, correction);
        let desired = (source.sample_format, source.channel_layout(), presented);

        if self.input != Some(desired) {
            self.context = Some(ffmpeg::software::resampler(
                desired,
                (
                    self.staging.sample_format,
                    self.staging.channel_layout(),
                    self.staging.sample_rate,
                ),
            )?);
            self.input = Some(desired);
        }
        let context = self.context.as_mut().unwrap();

        let presented_source = AudioInfo::new_raw(
            source.sample_format,
            presented,
            source.channels as u16,
        );
        let frame = presented_source.wrap_frame(data, 0);

        let staging = self.staging;
        let mut total = 0;

        let mut resampled = FFAudio::empty();
        context.run(&frame, &mut resampled)?;
        total += append_packed(&resampled, staging.block_size(), out);

        // drain the fractional remainder so the queue stays current
        while context.delay().is_some() {
            let mut flushed =
                FFAudio::new(staging.sample_format, 0, staging.channel_layout());
            context.flush(&mut flushed)?;
            if flushed.samples() == 0 {
                break;
            }
            total += append_packed(&flushed, staging.block_size(), out);
        }

        Ok(total)
    }

    fn presented_rate(&self, source: AudioInfo, correction: f64) -> u32 {
        let presented = (source.sample_rate as f64 / (1.0 + correction)).round();

        // hysteresis: stick with the cached context while the change is noise
        if let Some((format, layout, rate)) = self.input {
            if format == source.sample_format
                && layout == source.channel_layout()
                && ((rate as f64 - presented) / rate as f64).abs() < RATE_REBUILD_EPSILON
            {
                return rate;
            }
        }

        presented as u32
    }
}

fn append_packed(frame: &FFAudio, block_size: usize, out: &mut Vec<u8>) -> usize {
    let samples = frame.samples();
    if samples == 0 {
        return 0;
    }

    out.extend_from_slice(&frame.data(0)[..samples * block_size]);
    samples
}

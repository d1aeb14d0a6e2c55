//! Descriptions of the raw audio and video streams that flow through the
//! recorder, plus helpers for wrapping borrowed capture buffers into owned
//! ffmpeg frames.

pub use ffmpeg::{
    format::{
        pixel::Pixel,
        sample::{Sample, Type},
    },
    util::{
        channel_layout::ChannelLayout,
        frame::{Audio as FFAudio, Video as FFVideo},
        rational::Rational as FFRational,
    },
};

/// Pixel layouts produced by capture sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawVideoFormat {
    Bgra,
    Rgba,
    RawRgb,
    Uyvy,
    Nv12,
    Gray,
    Yuv420,
}

impl RawVideoFormat {
    pub fn pixel(self) -> Pixel {
        match self {
            RawVideoFormat::Bgra => Pixel::BGRA,
            RawVideoFormat::Rgba => Pixel::RGBA,
            RawVideoFormat::RawRgb => Pixel::RGB24,
            RawVideoFormat::Uyvy => Pixel::UYVY422,
            RawVideoFormat::Nv12 => Pixel::NV12,
            RawVideoFormat::Gray => Pixel::GRAY8,
            RawVideoFormat::Yuv420 => Pixel::YUV420P,
        }
    }
}

/// Sample layouts produced by capture sources. Capture data is always
/// interleaved; the ffmpeg-side format we map to is planar because that is
/// what [`AudioInfo::wrap_frame`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawAudioFormat {
    U8,
    I16,
    I32,
    F32,
    F64,
}

impl RawAudioFormat {
    pub fn sample_format(self) -> Sample {
        match self {
            RawAudioFormat::U8 => Sample::U8(Type::Planar),
            RawAudioFormat::I16 => Sample::I16(Type::Planar),
            RawAudioFormat::I32 => Sample::I32(Type::Planar),
            RawAudioFormat::F32 => Sample::F32(Type::Planar),
            RawAudioFormat::F64 => Sample::F64(Type::Planar),
        }
    }

    pub fn sample_size(self) -> usize {
        self.sample_format().bytes()
    }
}

pub trait PlanarData {
    fn plane_data(&self, index: usize) -> &[u8];

    fn plane_data_mut(&mut self, index: usize) -> &mut [u8];
}

// The ffmpeg crate's implementation of the `data_mut` function is wrong for audio;
// per [the FFmpeg docs](https://www.ffmpeg.org/doxygen/7.0/structAVFrame.html]) only
// the linesize of the first plane may be set for planar audio, and so we need to use
// that linesize for the rest of the planes (else they will appear to be empty slices).
impl PlanarData for FFAudio {
    #[inline]
    fn plane_data(&self, index: usize) -> &[u8] {
        if index >= self.planes() {
            panic!("out of bounds");
        }

        unsafe {
            std::slice::from_raw_parts(
                (*self.as_ptr()).data[index],
                (*self.as_ptr()).linesize[0] as usize,
            )
        }
    }

    #[inline]
    fn plane_data_mut(&mut self, index: usize) -> &mut [u8] {
        if index >= self.planes() {
            panic!("out of bounds");
        }

        unsafe {
            std::slice::from_raw_parts_mut(
                (*self.as_mut_ptr()).data[index],
                (*self.as_ptr()).linesize[0] as usize,
            )
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AudioInfoError {
    #[error("Unsupported number of channels: {0}")]
    ChannelLayout(u16),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AudioInfo {
    pub sample_format: Sample,
    pub sample_rate: u32,
    pub channels: usize,
    pub time_base: FFRational,
}

impl AudioInfo {
    pub fn new(
        sample_format: Sample,
        sample_rate: u32,
        channel_count: u16,
    ) -> Result<Self, AudioInfoError> {
        if Self::channel_layout_raw(channel_count).is_none() {
            return Err(AudioInfoError::ChannelLayout(channel_count));
        }

        Ok(Self {
            sample_format,
            sample_rate,
            channels: channel_count as usize,
            time_base: FFRational(1, 1_000_000),
        })
    }

    pub const fn new_raw(sample_format: Sample, sample_rate: u32, channel_count: u16) -> Self {
        Self {
            sample_format,
            sample_rate,
            channels: channel_count as usize,
            time_base: FFRational(1, 1_000_000),
        }
    }

    const fn channel_layout_raw(channels: u16) -> Option<ChannelLayout> {
        Some(match channels {
            1 => ChannelLayout::MONO,
            2 => ChannelLayout::STEREO,
            _ => return None,
        })
    }

    pub fn channel_layout(&self) -> ChannelLayout {
        Self::channel_layout_raw(self.channels as u16).unwrap()
    }

    pub fn sample_size(&self) -> usize {
        self.sample_format.bytes()
    }

    /// Size in bytes of one interleaved sample across all channels.
    pub fn block_size(&self) -> usize {
        self.sample_size() * self.channels
    }

    pub fn rate(&self) -> i32 {
        self.sample_rate.try_into().unwrap()
    }

    /// The same stream description with the packed (interleaved) twin of the
    /// sample format. Used as a staging format before planar framing.
    pub fn packed(&self) -> Self {
        let sample_format = match self.sample_format {
            Sample::U8(_) => Sample::U8(Type::Packed),
            Sample::I16(_) => Sample::I16(Type::Packed),
            Sample::I32(_) => Sample::I32(Type::Packed),
            Sample::I64(_) => Sample::I64(Type::Packed),
            Sample::F32(_) => Sample::F32(Type::Packed),
            Sample::F64(_) => Sample::F64(Type::Packed),
            Sample::None => Sample::None,
        };

        Self {
            sample_format,
            ..*self
        }
    }

    /// Duration of `samples` samples at this stream's rate, in microseconds.
    pub fn duration_micros(&self, samples: i64) -> i64 {
        samples * 1_000_000 / self.sample_rate as i64
    }

    /// Number of whole samples that fit in `micros` microseconds at this
    /// stream's rate.
    pub fn samples_in_micros(&self, micros: i64) -> i64 {
        micros * self.sample_rate as i64 / 1_000_000
    }

    pub fn empty_frame(&self, sample_count: usize) -> FFAudio {
        let mut frame = FFAudio::new(self.sample_format, sample_count, self.channel_layout());
        frame.set_rate(self.sample_rate);

        frame
    }

    pub fn wrap_frame(&self, data: &[u8], timestamp: i64) -> FFAudio {
        let sample_size = self.sample_size();
        let interleaved_chunk_size = sample_size * self.channels;
        let samples = data.len() / interleaved_chunk_size;

        let mut frame = FFAudio::new(self.sample_format, samples, self.channel_layout());
        frame.set_pts(Some(timestamp));
        frame.set_rate(self.sample_rate);

        match self.channels {
            0 => unreachable!(),
            1 => frame.plane_data_mut(0)[0..data.len()].copy_from_slice(data),
            // Capture sources always deliver interleaved data (i.e. the first sample from
            // every channel, followed by the second sample from every channel, et cetera).
            // Many audio codecs work better/primarily with planar data, so we de-interleave
            // it here if there is more than one channel.
            channel_count => {
                for (chunk_index, interleaved_chunk) in
                    data.chunks(interleaved_chunk_size).enumerate()
                {
                    let start = chunk_index * sample_size;
                    let end = start + sample_size;

                    for channel in 0..channel_count {
                        let channel_start = channel * sample_size;
                        let channel_end = channel_start + sample_size;
                        frame.plane_data_mut(channel)[start..end]
                            .copy_from_slice(&interleaved_chunk[channel_start..channel_end]);
                    }
                }
            }
        }

        frame
    }
}

#[derive(Debug, Copy, Clone)]
pub struct VideoInfo {
    pub pixel_format: Pixel,
    pub width: u32,
    pub height: u32,
    pub time_base: FFRational,
    pub frame_rate: FFRational,
}

impl VideoInfo {
    pub fn new(pixel_format: Pixel, width: u32, height: u32, fps: u32) -> Self {
        Self {
            pixel_format,
            width,
            height,
            time_base: FFRational(1, 1_000_000),
            frame_rate: FFRational(fps.try_into().unwrap(), 1),
        }
    }

    pub fn from_raw(format: RawVideoFormat, width: u32, height: u32, fps: u32) -> Self {
        Self::new(format.pixel(), width, height, fps)
    }

    pub fn fps(&self) -> u32 {
        (self.frame_rate.numerator() / self.frame_rate.denominator()) as u32
    }

    /// Duration of one frame in microseconds.
    pub fn frame_period_micros(&self) -> i64 {
        1_000_000 * self.frame_rate.denominator() as i64 / self.frame_rate.numerator() as i64
    }

    pub fn wrap_frame(&self, data: &[u8], timestamp: i64, stride: usize) -> FFVideo {
        let mut frame = FFVideo::new(self.pixel_format, self.width, self.height);

        frame.set_pts(Some(timestamp));

        if frame.stride(0) == stride {
            frame.data_mut(0)[0..data.len()].copy_from_slice(data);
        } else {
            let ffmpeg_stride = frame.stride(0);
            let row_length = ffmpeg_stride.min(stride);
            for (line, chunk) in data.chunks(stride).enumerate() {
                frame.data_mut(0)[line * ffmpeg_stride..line * ffmpeg_stride + row_length]
                    .copy_from_slice(&chunk[0..row_length]);
            }
        }

        frame
    }
}

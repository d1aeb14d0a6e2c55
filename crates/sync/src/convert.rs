//! Pixel-format conversion in front of the video queue.

use ffmpeg::software::scaling;
use reel_media_info::{FFVideo, Pixel, RawVideoFormat, VideoInfo};

/// Converts borrowed capture frames into owned frames in the encoder's pixel
/// format and dimensions. The scaling context is cached and rebuilt whenever
/// the source geometry or pixel format changes.
pub struct FrameConverter {
    output: VideoInfo,
    context: Option<scaling::Context>,
    input: Option<(Pixel, u32, u32)>,
}

impl FrameConverter {
    pub fn new(output: VideoInfo) -> Self {
        Self {
            output,
            context: None,
            input: None,
        }
    }

    pub fn convert(
        &mut self,
        width: u32,
        height: u32,
        data: &[u8],
        stride: usize,
        format: RawVideoFormat,
    ) -> Result<FFVideo, ffmpeg::Error> {
        let pixel = format.pixel();

        let source = VideoInfo::new(pixel, width, height, self.output.fps());
        let input = source.wrap_frame(data, 0, stride);

        // same single-plane layout as the output: the wrapped copy is enough
        if pixel == self.output.pixel_format
            && width == self.output.width
            && height == self.output.height
            && input.planes() == 1
        {
            return Ok(input);
        }

        if self.input != Some((pixel, width, height)) {
            self.context = Some(scaling::context::Context::get(
                pixel,
                width,
                height,
                self.output.pixel_format,
                self.output.width,
                self.output.height,
                scaling::flag::Flags::BILINEAR,
            )?);
            self.input = Some((pixel, width, height));
        }

        let mut converted = FFVideo::empty();
        self.context
            .as_mut()
            .unwrap()
            .run(&input, &mut converted)?;

        Ok(converted)
    }
}

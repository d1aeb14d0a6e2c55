//! The synchronizer core: shared state, the ingest front-end and the emit
//! worker that hands aligned frames to the encoders.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ffmpeg::frame;
use reel_media_info::{AudioInfo, RawAudioFormat, RawVideoFormat, VideoInfo};
use tracing::{debug, trace, warn};

use crate::{
    buffer::{SampleQueue, VideoQueue},
    convert::FrameConverter,
    drift::DriftEstimator,
    encoders::{AudioEncoder, VideoEncoder},
    resample::DriftResampler,
    segment::{SegmentPhase, SegmentState},
    sinks::{AudioSink, VideoSink},
    SyncError,
};

/// Most video frames kept while the worker is behind; past this the oldest
/// frames are dropped.
pub const MAX_VIDEO_FRAMES_BUFFERED: usize = 30;

/// Seconds of audio kept while the worker is behind.
pub const MAX_AUDIO_BUFFERED_SECS: i64 = 30;

/// Largest artificial delay added to a single video frame to absorb
/// sustained drift, in microseconds.
pub const MAX_FRAME_DELAY: i64 = 10_000;

/// Most frames synthesized into a single input gap, and most frames
/// duplicated per flush.
pub const MAX_GAP_FRAMES: i64 = 10;

/// Input gaps beyond this are treated as a capture fault. They are still
/// filled, so the output timeline stays monotone.
const CAPTURE_FAULT_GAP: i64 = 1_000_000;

/// How long the worker sleeps when there is nothing to flush.
const WORKER_IDLE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub video: Option<VideoInfo>,
    pub audio: Option<AudioInfo>,
    /// Whether late video frames may be skipped to catch up. When false they
    /// are encoded anyway at the current output position.
    pub allow_frame_skipping: bool,
    pub max_video_frames: usize,
    /// Defaults to `sample_rate * MAX_AUDIO_BUFFERED_SECS`.
    pub max_audio_samples: Option<usize>,
}

impl SyncOptions {
    pub fn new(video: Option<VideoInfo>, audio: Option<AudioInfo>) -> Self {
        Self {
            video,
            audio,
            allow_frame_skipping: true,
            max_video_frames: MAX_VIDEO_FRAMES_BUFFERED,
            max_audio_samples: None,
        }
    }

    pub fn with_frame_skipping(mut self, allow: bool) -> Self {
        self.allow_frame_skipping = allow;
        self
    }

    pub fn with_max_video_frames(mut self, frames: usize) -> Self {
        self.max_video_frames = frames;
        self
    }

    pub fn with_max_audio_samples(mut self, samples: usize) -> Self {
        self.max_audio_samples = Some(samples);
        self
    }
}

#[derive(Clone, Copy)]
struct StreamConfig {
    video: Option<VideoInfo>,
    audio: Option<AudioInfo>,
    audio_frame_size: usize,
    allow_frame_skipping: bool,
}

impl StreamConfig {
    /// The granularity of the output timeline, used as the flush safety
    /// margin.
    fn frame_period(&self) -> i64 {
        if let Some(video) = self.video {
            video.frame_period_micros()
        } else if let Some(audio) = self.audio {
            audio.duration_micros(self.audio_frame_size as i64)
        } else {
            10_000
        }
    }
}

struct SharedState {
    segment: SegmentState,
    video_queue: VideoQueue,
    audio_queue: SampleQueue,

    /// Staging buffer for the encoder frame currently being assembled.
    partial_audio_frame: Vec<u8>,

    /// Output position counters, cumulative across segments.
    video_pts: i64,
    /// Samples fully handed to the encoder.
    audio_pts: i64,
    /// Samples handed to the encoder or staged in the partial frame. Unlike
    /// `audio_pts` this never counts drain padding.
    audio_samples: i64,

    /// Sum of the durations of all completed segments, in microseconds.
    time_offset: i64,

    /// Counter values at the start of the current segment, so stream
    /// alignment is measured per segment rather than across the session.
    segment_video_pts_base: i64,
    segment_audio_samples_base: i64,

    drift: DriftEstimator,

    /// Pixel data of the most recently emitted frame, shared so gaps can be
    /// filled with copies. Survives segment boundaries.
    last_video_frame: Option<Arc<frame::Video>>,

    warned_drop_video: bool,
    warned_drop_audio: bool,
    warned_desync: bool,
    warned_capture_fault: bool,
}

impl SharedState {
    fn new(config: &StreamConfig, options: &SyncOptions) -> Self {
        let (block_size, max_audio_samples) = match config.audio {
            Some(audio) => (
                audio.block_size(),
                options.max_audio_samples.unwrap_or(
                    audio.sample_rate as usize * MAX_AUDIO_BUFFERED_SECS as usize,
                ),
            ),
            None => (1, 0),
        };

        Self {
            segment: SegmentState::new(config.video.is_some(), config.audio.is_some()),
            video_queue: VideoQueue::new(options.max_video_frames),
            audio_queue: SampleQueue::new(block_size, max_audio_samples),
            partial_audio_frame: Vec::new(),
            video_pts: 0,
            audio_pts: 0,
            audio_samples: 0,
            time_offset: 0,
            segment_video_pts_base: 0,
            segment_audio_samples_base: 0,
            drift: DriftEstimator::new(),
            last_video_frame: None,
            warned_drop_video: false,
            warned_drop_audio: false,
            warned_desync: false,
            warned_capture_fault: false,
        }
    }

    /// Close out the current segment after a drain and begin the next one.
    fn finish_segment(&mut self) {
        self.video_queue.clear();
        self.audio_queue.clear();
        self.partial_audio_frame.clear();
        self.segment_video_pts_base = self.video_pts;
        self.segment_audio_samples_base = self.audio_samples;
        self.drift.reset();
        self.segment.reset();
    }
}

/// Frames selected for emission during one flush. Built under the shared
/// lock, handed to the encoders after it is released.
#[derive(Default)]
struct FlushBatch {
    video: Vec<frame::Video>,
    audio: Vec<frame::Audio>,
}

impl FlushBatch {
    fn is_empty(&self) -> bool {
        self.video.is_empty() && self.audio.is_empty()
    }
}

/// Aligns two free-running capture streams and feeds them to the encoders.
///
/// Producers push via the [`VideoSink`] and [`AudioSink`] impls from their
/// own threads; an owned worker thread drains the buffers. Either encoder
/// may be absent, disabling that stream.
pub struct Synchronizer {
    config: StreamConfig,
    shared: Arc<Mutex<SharedState>>,
    converter: Option<Mutex<FrameConverter>>,
    resampler: Option<Mutex<DriftResampler>>,
    should_stop: Arc<AtomicBool>,
    error_occurred: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Synchronizer {
    pub fn new(
        options: SyncOptions,
        video_encoder: Option<Box<dyn VideoEncoder>>,
        audio_encoder: Option<Box<dyn AudioEncoder>>,
    ) -> Result<Self, SyncError> {
        if options.video.is_some() != video_encoder.is_some() {
            return Err(SyncError::Config(
                "video info and video encoder must be provided together",
            ));
        }
        if options.audio.is_some() != audio_encoder.is_some() {
            return Err(SyncError::Config(
                "audio info and audio encoder must be provided together",
            ));
        }
        if options.video.is_none() && options.audio.is_none() {
            return Err(SyncError::Config("all streams are disabled"));
        }
        if let Some(audio) = &options.audio {
            // the encoder layout must be one we can build channel layouts for
            AudioInfo::new(audio.sample_format, audio.sample_rate, audio.channels as u16)?;
        }

        let config = StreamConfig {
            video: options.video,
            audio: options.audio,
            audio_frame_size: audio_encoder
                .as_ref()
                .map(|encoder| encoder.frame_size())
                .unwrap_or(0),
            allow_frame_skipping: options.allow_frame_skipping,
        };

        let shared = Arc::new(Mutex::new(SharedState::new(&config, &options)));
        let should_stop = Arc::new(AtomicBool::new(false));
        let error_occurred = Arc::new(AtomicBool::new(false));

        let worker = thread::Builder::new().name("sync-worker".into()).spawn({
            let shared = Arc::clone(&shared);
            let should_stop = Arc::clone(&should_stop);
            let error_occurred = Arc::clone(&error_occurred);
            move || {
                worker_loop(
                    shared,
                    config,
                    should_stop,
                    error_occurred,
                    video_encoder,
                    audio_encoder,
                )
            }
        })?;

        Ok(Self {
            converter: options.video.map(|video| Mutex::new(FrameConverter::new(video))),
            resampler: options.audio.map(|audio| Mutex::new(DriftResampler::new(audio))),
            config,
            shared,
            should_stop,
            error_occurred,
            worker: Some(worker),
        })
    }

    /// End the current segment and prepare for a new one, as needed for
    /// pausing and resuming a recording. The worker drains everything that
    /// is buffered, then freezes the accumulated time offset.
    ///
    /// Has no effect while the segment holds no input, so calling it
    /// repeatedly is safe. Callers should avoid racing it against ingest,
    /// or frames may land in the wrong segment.
    pub fn new_segment(&self) {
        let mut shared = self.shared.lock().unwrap();
        if !shared.segment.has_input() || shared.segment.phase == SegmentPhase::Draining {
            return;
        }

        debug!("ending the current segment");
        shared.segment.phase = SegmentPhase::Draining;
    }

    /// Total recording time across all segments, in microseconds.
    pub fn total_time(&self) -> i64 {
        let shared = self.shared.lock().unwrap();

        let current = match shared.segment.phase {
            SegmentPhase::Draining => shared.segment.drain_window(),
            _ => shared.segment.window(),
        };

        shared.time_offset
            + current
                .map(|(start, stop)| (stop - start).max(0))
                .unwrap_or(0)
    }

    /// Whether the worker died on an encoder failure. Once set, no further
    /// output is produced and the session should be torn down.
    pub fn error_occurred(&self) -> bool {
        self.error_occurred.load(Ordering::Acquire)
    }

    /// Current estimate of the audio/video desynchronization in seconds, for
    /// diagnostics. Positive values mean the audio timeline is short.
    pub fn desync(&self) -> f64 {
        self.shared.lock().unwrap().drift.desync()
    }
}

impl Drop for Synchronizer {
    fn drop(&mut self) {
        self.should_stop.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl VideoSink for Synchronizer {
    fn next_video_timestamp(&self) -> i64 {
        let Some(video) = self.config.video else {
            return 0;
        };

        let shared = self.shared.lock().unwrap();
        if !shared.segment.video_started {
            return 0;
        }

        (shared.segment.video_last_timestamp + video.frame_period_micros())
            .max(shared.segment.video_stop_time)
    }

    fn read_video_frame(
        &self,
        width: u32,
        height: u32,
        data: &[u8],
        stride: usize,
        format: RawVideoFormat,
        mut timestamp: i64,
    ) -> Result<(), SyncError> {
        let Some(converter) = &self.converter else {
            return Err(SyncError::StreamDisabled("video"));
        };
        let period = self.config.video.unwrap().frame_period_micros();

        // convert before taking the shared lock; the scaler has its own
        let mut frame = {
            let mut converter = converter.lock().unwrap();
            converter.convert(width, height, data, stride, format)?
        };

        let mut shared = self.shared.lock().unwrap();

        if !shared.segment.video_started {
            shared.segment.start_video(timestamp);
        } else {
            if timestamp < shared.segment.video_last_timestamp {
                trace!(timestamp, "dropping video frame that went back in time");
                return Ok(());
            }

            let gap = timestamp - shared.segment.video_last_timestamp;
            if gap > 2 * period {
                if gap > CAPTURE_FAULT_GAP && !shared.warned_capture_fault {
                    shared.warned_capture_fault = true;
                    warn!(gap_micros = gap, "video capture stalled, filling the gap");
                }
                synthesize_gap_frames(&mut shared, period, timestamp);
            }

            // when the audio timeline runs long, hold frames back a little
            let behind = (-shared.drift.desync() * 1e6) as i64;
            if behind > period {
                let delay = (behind - period).min(MAX_FRAME_DELAY).min(period / 2);
                timestamp += delay;
                shared.segment.video_accumulated_delay += delay;
                trace!(
                    delay,
                    total = shared.segment.video_accumulated_delay,
                    "delaying video frame to absorb drift"
                );
            }
        }

        frame.set_pts(Some(timestamp));
        let dropped = shared.video_queue.push(frame);
        if dropped > 0 && !shared.warned_drop_video {
            shared.warned_drop_video = true;
            warn!("video queue overflowed, dropping the oldest frames");
        }

        shared.segment.video_last_timestamp = timestamp;
        shared.segment.video_stop_time = shared.segment.video_stop_time.max(timestamp);

        Ok(())
    }

    fn read_video_ping(&self, timestamp: i64) {
        if self.config.video.is_none() {
            return;
        }

        let mut shared = self.shared.lock().unwrap();
        if shared.segment.video_started {
            shared.segment.video_stop_time = shared.segment.video_stop_time.max(timestamp);
        }
    }
}

impl AudioSink for Synchronizer {
    fn read_audio_samples(
        &self,
        sample_rate: u32,
        channels: u16,
        data: &[u8],
        format: RawAudioFormat,
        timestamp: i64,
    ) -> Result<(), SyncError> {
        let Some(resampler) = &self.resampler else {
            return Err(SyncError::StreamDisabled("audio"));
        };
        let audio = self.config.audio.unwrap();

        // rejects channel counts no layout exists for
        let source = AudioInfo::new(format.sample_format(), sample_rate, channels)?;

        let sample_count = (data.len() / source.block_size()) as i64;
        if sample_count == 0 {
            return Ok(());
        }
        let block_micros = sample_count * 1_000_000 / sample_rate as i64;

        let (correction, silence) = {
            let mut shared = self.shared.lock().unwrap();

            let first = !shared.segment.audio_started;
            if first {
                shared.segment.start_audio(timestamp);
            }

            // a hole in the arriving stream is filled with silence and kept
            // away from the controller
            let hole = timestamp - shared.segment.audio_stop_time;
            let silence = if !first && hole > block_micros {
                if hole > CAPTURE_FAULT_GAP && !shared.warned_capture_fault {
                    shared.warned_capture_fault = true;
                    warn!(gap_micros = hole, "audio capture stalled, inserting silence");
                }
                audio.samples_in_micros(hole) as usize
            } else {
                // instantaneous drift: how far this block's timestamp is from
                // the wall-clock position of the consumed sample count
                let expected = shared.segment.audio_start_time
                    + audio.duration_micros(shared.segment.audio_samples_read);
                let error = (timestamp - expected) as f64 / 1e6;
                let dt = sample_count as f64 / sample_rate as f64;
                shared.drift.advance(error, dt);

                if shared.drift.excessive() && !shared.warned_desync {
                    shared.warned_desync = true;
                    warn!(
                        desync_secs = shared.drift.desync(),
                        "audio and video capture clocks have drifted apart"
                    );
                }

                0
            };

            (shared.drift.correction(), silence)
        };

        // resample outside the shared lock; the resampler has its own
        let mut resampled = Vec::new();
        {
            let mut resampler = resampler.lock().unwrap();
            resampler.resample(source, data, correction, &mut resampled)?;
        }

        let mut shared = self.shared.lock().unwrap();

        if silence > 0 {
            shared.audio_queue.extend_silence(silence);
        }
        shared.audio_queue.extend(&resampled);

        let dropped = shared.audio_queue.truncate_front();
        if dropped > 0 {
            shared.segment.audio_samples_read += dropped as i64;
            if !shared.warned_drop_audio {
                shared.warned_drop_audio = true;
                warn!("audio queue overflowed, dropping the oldest samples");
            }
        }

        shared.segment.audio_last_timestamp = timestamp;
        shared.segment.audio_stop_time = shared
            .segment
            .audio_stop_time
            .max(timestamp + block_micros);

        Ok(())
    }

    fn read_audio_hole(&self) {
        if self.config.audio.is_none() {
            return;
        }

        let mut shared = self.shared.lock().unwrap();
        if !shared.segment.audio_started {
            return;
        }

        if shared.segment.audio_can_drop {
            // nothing has been emitted yet: discard the pre-roll and let the
            // next block re-anchor the stream at its own timestamp
            debug!("audio hole before the first emission, re-anchoring");
            shared.audio_queue.clear();
            shared.partial_audio_frame.clear();
            shared.segment.reanchor_audio();
        } else {
            // the gap length is unknown; the next block's timestamp will
            // show how much silence the ingest path needs to insert
            debug!("audio hole reported, padding until the next block");
        }
    }
}

fn worker_loop(
    shared: Arc<Mutex<SharedState>>,
    config: StreamConfig,
    should_stop: Arc<AtomicBool>,
    error_occurred: Arc<AtomicBool>,
    mut video_encoder: Option<Box<dyn VideoEncoder>>,
    mut audio_encoder: Option<Box<dyn AudioEncoder>>,
) {
    debug!("synchronizer worker started");

    while !should_stop.load(Ordering::Acquire) {
        let batch = {
            let mut shared = shared.lock().unwrap();
            collect_flush(&mut shared, &config)
        };

        if batch.is_empty() {
            thread::sleep(WORKER_IDLE);
            continue;
        }

        if let Err(error) = emit_batch(batch, &mut video_encoder, &mut audio_encoder) {
            warn!(%error, "encoder failed, stopping the synchronizer worker");
            error_occurred.store(true, Ordering::Release);
            break;
        }
    }

    debug!("synchronizer worker finished");
}

fn emit_batch(
    batch: FlushBatch,
    video_encoder: &mut Option<Box<dyn VideoEncoder>>,
    audio_encoder: &mut Option<Box<dyn AudioEncoder>>,
) -> anyhow::Result<()> {
    if let Some(encoder) = video_encoder.as_mut() {
        for frame in batch.video {
            encoder.queue_frame(frame)?;
        }
    }
    if let Some(encoder) = audio_encoder.as_mut() {
        for frame in batch.audio {
            encoder.queue_frame(frame)?;
        }
    }

    Ok(())
}

/// Decide, under the shared lock, what the worker should emit next.
fn collect_flush(shared: &mut SharedState, config: &StreamConfig) -> FlushBatch {
    let mut batch = FlushBatch::default();

    match shared.segment.phase {
        SegmentPhase::Waiting => {}
        SegmentPhase::Running => {
            if let Some((start, stop)) = shared.segment.window() {
                if stop > start + config.frame_period() {
                    flush_video(shared, config, stop, MAX_GAP_FRAMES, &mut batch);
                    flush_audio(shared, config, start, stop, false, &mut batch);
                    observe_alignment(shared, config);
                }
            }
        }
        SegmentPhase::Draining => {
            if let Some((start, stop)) = shared.segment.drain_window() {
                flush_video(shared, config, stop, i64::MAX, &mut batch);
                flush_audio(shared, config, start, stop, true, &mut batch);
                shared.time_offset += (stop - start).max(0);
            }
            shared.finish_segment();
        }
    }

    batch
}

/// Clone the last emitted frame into an input gap, stepping one frame period
/// at a time up to (but excluding) `until`.
fn synthesize_gap_frames(shared: &mut SharedState, period: i64, until: i64) {
    let Some(last) = shared.last_video_frame.clone() else {
        return;
    };

    let mut timestamp = shared.segment.video_last_timestamp + period;
    let mut synthesized = 0;
    let mut dropped = 0;

    while timestamp < until && synthesized < MAX_GAP_FRAMES {
        let mut copy = (*last).clone();
        copy.set_pts(Some(timestamp));
        dropped += shared.video_queue.push(copy);
        timestamp += period;
        synthesized += 1;
    }

    if dropped > 0 && !shared.warned_drop_video {
        shared.warned_drop_video = true;
        warn!("video queue overflowed, dropping the oldest frames");
    }
}

fn flush_video(
    shared: &mut SharedState,
    config: &StreamConfig,
    segment_stop: i64,
    max_duplicates: i64,
    batch: &mut FlushBatch,
) {
    let Some(video) = config.video else {
        return;
    };
    let fps = video.frame_rate.numerator() as f64 / video.frame_rate.denominator() as f64;

    let mut duplicated = 0;

    while let Some(timestamp) = shared.video_queue.front_timestamp() {
        if timestamp > segment_stop {
            break;
        }

        let local = timestamp - shared.segment.video_start_time + shared.time_offset;
        let target_pts = (local as f64 * fps / 1e6).round() as i64;

        if target_pts < shared.video_pts && config.allow_frame_skipping {
            trace!(timestamp, "skipping video frame behind the output position");
            shared.video_queue.pop();
            continue;
        }

        if target_pts > shared.video_pts + 1 {
            // a hole in the output: fill it with copies of the last frame
            if let Some(last) = shared.last_video_frame.clone() {
                if duplicated >= max_duplicates {
                    break;
                }

                let mut copy = (*last).clone();
                copy.set_pts(Some(shared.video_pts));
                shared.video_pts += 1;
                duplicated += 1;
                batch.video.push(copy);
                continue;
            }
        }

        let mut frame = shared.video_queue.pop().unwrap();
        frame.set_pts(Some(shared.video_pts));
        shared.video_pts += 1;
        shared.last_video_frame = Some(Arc::new(frame.clone()));
        batch.video.push(frame);
    }
}

fn flush_audio(
    shared: &mut SharedState,
    config: &StreamConfig,
    segment_start: i64,
    segment_stop: i64,
    drain: bool,
    batch: &mut FlushBatch,
) {
    let Some(audio) = config.audio else {
        return;
    };
    if !shared.segment.audio_started {
        return;
    }
    let frame_size = config.audio_frame_size;
    let block_size = audio.block_size();

    if shared.segment.audio_can_drop {
        // trim leading samples so the first emission lands on the segment start
        let position =
            shared.segment.audio_start_time + audio.duration_micros(shared.segment.audio_samples_read);
        if segment_start > position {
            let excess = audio.samples_in_micros(segment_start - position) as usize;
            let dropped = shared.audio_queue.discard(excess);
            shared.segment.audio_samples_read += dropped as i64;
        }
    }

    let span = segment_stop - shared.segment.audio_start_time;
    let allowed = audio.samples_in_micros(span) - shared.segment.audio_samples_read;
    let mut remaining = allowed.max(0) as usize;

    while remaining > 0 && !shared.audio_queue.is_empty() {
        let staged = shared.partial_audio_frame.len() / block_size;
        let take = (frame_size - staged).min(remaining);
        let took = shared
            .audio_queue
            .consume(take, &mut shared.partial_audio_frame);
        if took == 0 {
            break;
        }

        shared.segment.audio_samples_read += took as i64;
        shared.audio_samples += took as i64;
        remaining -= took;

        if shared.partial_audio_frame.len() / block_size == frame_size {
            emit_audio_frame(shared, &audio, frame_size, batch);
        }
    }

    if drain {
        // pad the rest of the window with silence so the audio track ends
        // where the video track does; the padding is not counted
        while remaining > 0 {
            let staged = shared.partial_audio_frame.len() / block_size;
            let take = (frame_size - staged).min(remaining);
            shared
                .partial_audio_frame
                .resize((staged + take) * block_size, 0);
            shared.segment.audio_samples_read += take as i64;
            remaining -= take;

            if staged + take == frame_size {
                emit_audio_frame(shared, &audio, frame_size, batch);
            }
        }

        if !shared.partial_audio_frame.is_empty() {
            shared.partial_audio_frame.resize(frame_size * block_size, 0);
            emit_audio_frame(shared, &audio, frame_size, batch);
        }
    }
}

fn emit_audio_frame(
    shared: &mut SharedState,
    audio: &AudioInfo,
    frame_size: usize,
    batch: &mut FlushBatch,
) {
    let frame = audio.wrap_frame(&shared.partial_audio_frame, shared.audio_pts);
    shared.audio_pts += frame_size as i64;
    shared.partial_audio_frame.clear();
    shared.segment.audio_can_drop = false;
    batch.audio.push(frame);
}

/// Compare the output positions of the two streams after a flush and feed
/// the residual into the drift controller. Differences inside the frame
/// quantization window are noise, not drift.
fn observe_alignment(shared: &mut SharedState, config: &StreamConfig) {
    let (Some(video), Some(audio)) = (config.video, config.audio) else {
        return;
    };

    let video_frames = shared.video_pts - shared.segment_video_pts_base;
    let audio_samples = shared.audio_samples - shared.segment_audio_samples_base;
    if video_frames == 0 || audio_samples == 0 {
        return;
    }

    let fps = video.frame_rate.numerator() as f64 / video.frame_rate.denominator() as f64;
    let video_secs = video_frames as f64 / fps;
    let audio_secs = audio_samples as f64 / audio.sample_rate as f64;

    let error = video_secs - audio_secs;
    if error.abs() > 2.0 / fps {
        shared.drift.observe(error);

        if shared.drift.excessive() && !shared.warned_desync {
            shared.warned_desync = true;
            warn!(
                desync_secs = shared.drift.desync(),
                "emitted audio and video have drifted apart"
            );
        }
    }
}

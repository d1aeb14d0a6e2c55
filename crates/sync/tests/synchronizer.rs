//! End-to-end tests driving the synchronizer with synthetic producers and
//! mock encoders. Timestamps are synthetic, so a "one second" session runs
//! in milliseconds of wall time.

use std::time::{Duration, Instant};

use reel_media_info::{AudioInfo, RawAudioFormat, RawVideoFormat, Sample, Type, VideoInfo};
use reel_sync::{
    AudioEncoder, AudioSink, SyncError, SyncOptions, Synchronizer, VideoEncoder, VideoSink,
};

const WIDTH: u32 = 16;
const HEIGHT: u32 = 16;
const FPS: u32 = 30;
const FRAME_PERIOD: i64 = 1_000_000 / FPS as i64;
const SAMPLE_RATE: u32 = 48_000;
const ENCODER_FRAME: usize = 1024;
const BLOCK_SAMPLES: usize = 480;
const BLOCK_MICROS: i64 = 10_000;

struct TestVideoEncoder {
    sender: flume::Sender<i64>,
}

impl VideoEncoder for TestVideoEncoder {
    fn queue_frame(&mut self, frame: ffmpeg::frame::Video) -> anyhow::Result<()> {
        self.sender.send(frame.pts().unwrap())?;
        Ok(())
    }
}

struct TestAudioEncoder {
    sender: flume::Sender<(i64, usize)>,
}

impl AudioEncoder for TestAudioEncoder {
    fn frame_size(&self) -> usize {
        ENCODER_FRAME
    }

    fn queue_frame(&mut self, frame: ffmpeg::frame::Audio) -> anyhow::Result<()> {
        self.sender.send((frame.pts().unwrap(), frame.samples()))?;
        Ok(())
    }
}

struct FailingVideoEncoder;

impl VideoEncoder for FailingVideoEncoder {
    fn queue_frame(&mut self, _frame: ffmpeg::frame::Video) -> anyhow::Result<()> {
        anyhow::bail!("this encoder always fails")
    }
}

fn video_info() -> VideoInfo {
    VideoInfo::from_raw(RawVideoFormat::Bgra, WIDTH, HEIGHT, FPS)
}

fn audio_info() -> AudioInfo {
    AudioInfo::new_raw(Sample::F32(Type::Planar), SAMPLE_RATE, 1)
}

fn options() -> SyncOptions {
    // caps sized so producers can run far ahead of the worker in tests
    SyncOptions::new(Some(video_info()), Some(audio_info()))
        .with_max_video_frames(4096)
        .with_max_audio_samples(SAMPLE_RATE as usize * 120)
}

type Channels = (flume::Receiver<i64>, flume::Receiver<(i64, usize)>);

fn make_synchronizer(options: SyncOptions) -> (Synchronizer, Channels) {
    reel_sync::init().unwrap();

    let (video_tx, video_rx) = flume::unbounded();
    let (audio_tx, audio_rx) = flume::unbounded();

    let sync = Synchronizer::new(
        options,
        Some(Box::new(TestVideoEncoder { sender: video_tx })),
        Some(Box::new(TestAudioEncoder { sender: audio_tx })),
    )
    .unwrap();

    (sync, (video_rx, audio_rx))
}

fn push_frame(sync: &Synchronizer, timestamp: i64) {
    let data = vec![0x80u8; (WIDTH * HEIGHT * 4) as usize];
    sync.read_video_frame(
        WIDTH,
        HEIGHT,
        &data,
        (WIDTH * 4) as usize,
        RawVideoFormat::Bgra,
        timestamp,
    )
    .unwrap();
}

fn push_audio(sync: &Synchronizer, samples: usize, timestamp: i64) {
    let data = vec![0u8; samples * 4];
    sync.read_audio_samples(SAMPLE_RATE, 1, &data, RawAudioFormat::F32, timestamp)
        .unwrap();
}

fn wait_for(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for the worker"
        );
        std::thread::sleep(Duration::from_millis(5));
    }

    // let the worker finish the iteration it may be in the middle of
    std::thread::sleep(Duration::from_millis(50));
}

#[test]
fn steady_state_emits_every_frame_and_sample() {
    let (sync, (video_rx, audio_rx)) = make_synchronizer(options());

    for index in 0..30i64 {
        push_frame(&sync, index * FRAME_PERIOD);
    }
    for index in 0..100i64 {
        push_audio(&sync, BLOCK_SAMPLES, index * BLOCK_MICROS);
    }

    sync.new_segment();
    wait_for(|| video_rx.len() == 30 && audio_rx.len() == 47);

    let pts: Vec<i64> = video_rx.try_iter().collect();
    assert_eq!(pts, (0..30).collect::<Vec<_>>());

    let frames: Vec<(i64, usize)> = audio_rx.try_iter().collect();
    for (index, (pts, samples)) in frames.iter().enumerate() {
        assert_eq!(*pts, index as i64 * ENCODER_FRAME as i64);
        assert_eq!(*samples, ENCODER_FRAME);
    }
    // 48000 real samples, the last frame padded out with silence
    assert_eq!(frames.len() * ENCODER_FRAME, 48_128);

    assert_eq!(sync.total_time(), 1_000_000);
    assert!(!sync.error_occurred());
}

#[test]
fn leading_audio_is_trimmed_to_the_video_start() {
    let (sync, (video_rx, audio_rx)) = make_synchronizer(options());

    // audio leads by 200 ms
    for index in 0..100i64 {
        push_audio(&sync, BLOCK_SAMPLES, index * BLOCK_MICROS);
    }
    for index in 0..30i64 {
        push_frame(&sync, 200_000 + index * FRAME_PERIOD);
    }

    sync.new_segment();
    wait_for(|| video_rx.len() == 30 && audio_rx.len() == 46);

    let pts: Vec<i64> = video_rx.try_iter().collect();
    assert_eq!(pts, (0..30).collect::<Vec<_>>());

    // 9600 samples (200 ms) discarded from the head; the 38400 real samples
    // plus the silence padding out to the video stop fill the whole window
    let frames: Vec<(i64, usize)> = audio_rx.try_iter().collect();
    assert_eq!(frames.len() * ENCODER_FRAME, 47_104);

    assert_eq!(sync.total_time(), 966_657);
}

#[test]
fn video_gap_is_filled_with_duplicates() {
    let (sync, (video_rx, audio_rx)) = make_synchronizer(options());

    // frames 10..=18 never arrive
    for index in (0..30i64).filter(|index| !(10..19).contains(index)) {
        push_frame(&sync, index * FRAME_PERIOD);
    }
    for index in 0..100i64 {
        push_audio(&sync, BLOCK_SAMPLES, index * BLOCK_MICROS);
    }

    sync.new_segment();
    wait_for(|| video_rx.len() == 30);

    let pts: Vec<i64> = video_rx.try_iter().collect();
    assert_eq!(pts, (0..30).collect::<Vec<_>>());
    assert!(audio_rx.len() > 0);
    assert!(!sync.error_occurred());
}

#[test]
fn audio_clock_drift_is_resampled_away() {
    let (sync, (video_rx, audio_rx)) = make_synchronizer(options());

    // the audio device clock runs 0.1% fast: nominal 100 ms blocks arrive
    // every 99900 µs of wall time. Feeding is paced so the worker keeps the
    // queue drained, the way a clocked capture source would.
    const DRIFT_BLOCK_SAMPLES: usize = 4_800;
    const DRIFT_BLOCK_MICROS: i64 = 99_900;
    let blocks = 620i64;
    let video_frames = 1_880i64;

    let mut audio_time = 0i64;
    let mut video_time = 0i64;
    let mut block = 0i64;
    let mut frame = 0i64;

    // interleave the producers in wall-clock order
    while block < blocks || frame < video_frames {
        if frame < video_frames && (block >= blocks || video_time <= audio_time) {
            push_frame(&sync, video_time);
            frame += 1;
            video_time = frame * FRAME_PERIOD;
        } else {
            // slower towards the end, so the final drift measurements see a
            // fully drained queue
            let pace = if block < 600 { 12 } else { 30 };
            std::thread::sleep(Duration::from_millis(pace));
            push_audio(&sync, DRIFT_BLOCK_SAMPLES, audio_time);
            block += 1;
            audio_time = block * DRIFT_BLOCK_MICROS;
        }
    }

    // the controller has locked on to the 1000 ppm skew
    let desync = sync.desync();
    assert!(desync.abs() <= 0.05, "desync {desync}");

    sync.new_segment();
    wait_for(|| video_rx.len() == 1_880);

    let pts: Vec<i64> = video_rx.try_iter().collect();
    assert_eq!(pts, (0..1_880).collect::<Vec<_>>());

    // the drained window spans 62.63 s and the audio track fills it exactly,
    // resampled real samples plus the padding out to the video stop
    let emitted: usize = audio_rx.try_iter().map(|(_, samples)| samples).sum();
    assert_eq!(emitted, 3_006_464);

    assert_eq!(sync.total_time(), 62_632_707);
}

#[test]
fn overflow_drops_oldest_frames_and_recovers() {
    let opts = SyncOptions::new(Some(video_info()), Some(audio_info()));
    let (sync, (video_rx, audio_rx)) = make_synchronizer(opts);

    // prime both streams so some frames actually get emitted
    for index in 0..10i64 {
        push_frame(&sync, index * FRAME_PERIOD);
    }
    for index in 0..10i64 {
        push_audio(&sync, BLOCK_SAMPLES, index * BLOCK_MICROS);
    }
    wait_for(|| video_rx.len() > 0);

    // audio stalls while video keeps arriving: the queue caps out at the
    // default limit and the oldest frames are dropped
    for index in 10..110i64 {
        push_frame(&sync, index * FRAME_PERIOD);
    }

    // audio resumes and catches up past the end of the video
    for index in 10..370i64 {
        push_audio(&sync, BLOCK_SAMPLES, index * BLOCK_MICROS);
    }

    sync.new_segment();
    wait_for(|| video_rx.len() == 110);

    // dropped frames were re-filled with duplicates; the output is complete
    // and strictly ordered
    let pts: Vec<i64> = video_rx.try_iter().collect();
    assert_eq!(pts, (0..110).collect::<Vec<_>>());
    assert!(audio_rx.len() > 0);
    assert!(!sync.error_occurred());
}

#[test]
fn pause_and_resume_concatenates_segments() {
    let (sync, (video_rx, audio_rx)) = make_synchronizer(options());

    for index in 0..30i64 {
        push_frame(&sync, index * FRAME_PERIOD);
    }
    for index in 0..100i64 {
        push_audio(&sync, BLOCK_SAMPLES, index * BLOCK_MICROS);
    }

    sync.new_segment();
    wait_for(|| video_rx.len() == 30);
    assert_eq!(sync.total_time(), 1_000_000);

    // 500 ms pause, then a second one-second segment
    let resume = 1_500_000;
    for index in 0..30i64 {
        push_frame(&sync, resume + index * FRAME_PERIOD);
    }
    for index in 0..100i64 {
        push_audio(&sync, BLOCK_SAMPLES, resume + index * BLOCK_MICROS);
    }

    sync.new_segment();
    wait_for(|| video_rx.len() == 60);

    // the output timeline continues without a hole across the pause
    let pts: Vec<i64> = video_rx.try_iter().collect();
    assert_eq!(pts, (0..60).collect::<Vec<_>>());

    let frames: Vec<(i64, usize)> = audio_rx.try_iter().collect();
    assert_eq!(frames.len(), 94);
    for window in frames.windows(2) {
        assert!(window[1].0 > window[0].0);
    }

    assert_eq!(sync.total_time(), 2_000_000);
}

#[test]
fn drain_pads_audio_to_the_video_end() {
    let (sync, (video_rx, audio_rx)) = make_synchronizer(options());

    // audio dies at 500 ms but video keeps recording to the full second
    for index in 0..30i64 {
        push_frame(&sync, index * FRAME_PERIOD);
    }
    for index in 0..50i64 {
        push_audio(&sync, BLOCK_SAMPLES, index * BLOCK_MICROS);
    }

    sync.new_segment();
    wait_for(|| video_rx.len() == 30 && audio_rx.len() == 46);

    let pts: Vec<i64> = video_rx.try_iter().collect();
    assert_eq!(pts, (0..30).collect::<Vec<_>>());

    // the missing 466 ms come out as silence frames: the audio track still
    // reaches the video stop time instead of ending early
    let emitted: usize = audio_rx.try_iter().map(|(_, samples)| samples).sum();
    assert_eq!(emitted, 47_104);
    assert_eq!(sync.total_time(), 966_657);
}

#[test]
fn audio_hole_after_emission_is_padded_with_silence() {
    let (sync, (video_rx, audio_rx)) = make_synchronizer(options());

    for index in 0..30i64 {
        push_frame(&sync, index * FRAME_PERIOD);
    }
    for index in 0..50i64 {
        push_audio(&sync, BLOCK_SAMPLES, index * BLOCK_MICROS);
    }
    wait_for(|| audio_rx.len() > 0);

    // the source lost 200 ms of audio; delivery resumes at 700 ms
    sync.read_audio_hole();
    for index in 0..30i64 {
        push_audio(&sync, BLOCK_SAMPLES, 700_000 + index * BLOCK_MICROS);
    }

    sync.new_segment();
    wait_for(|| video_rx.len() == 30 && audio_rx.len() == 47);

    // the hole was filled: a full second of audio came out
    let frames: Vec<(i64, usize)> = audio_rx.try_iter().collect();
    assert_eq!(frames.len() * ENCODER_FRAME, 48_128);
    assert_eq!(sync.total_time(), 1_000_000);
}

#[test]
fn audio_hole_before_video_realigns_the_stream() {
    let (sync, (video_rx, audio_rx)) = make_synchronizer(options());

    // pre-roll audio that is cut off before video ever starts
    for index in 0..20i64 {
        push_audio(&sync, BLOCK_SAMPLES, index * BLOCK_MICROS);
    }
    sync.read_audio_hole();

    // both streams restart together at 300 ms
    for index in 0..100i64 {
        push_audio(&sync, BLOCK_SAMPLES, 300_000 + index * BLOCK_MICROS);
    }
    for index in 0..30i64 {
        push_frame(&sync, 300_000 + index * FRAME_PERIOD);
    }

    sync.new_segment();
    wait_for(|| video_rx.len() == 30 && audio_rx.len() == 47);

    let pts: Vec<i64> = video_rx.try_iter().collect();
    assert_eq!(pts, (0..30).collect::<Vec<_>>());

    // the discarded pre-roll never reaches the encoder
    let frames: Vec<(i64, usize)> = audio_rx.try_iter().collect();
    assert_eq!(frames.len() * ENCODER_FRAME, 48_128);
    assert_eq!(sync.total_time(), 1_000_000);
}

#[test]
fn new_segment_without_input_is_a_no_op() {
    let (sync, (video_rx, _audio_rx)) = make_synchronizer(options());

    sync.new_segment();
    sync.new_segment();
    sync.new_segment();
    assert_eq!(sync.total_time(), 0);

    for index in 0..30i64 {
        push_frame(&sync, index * FRAME_PERIOD);
    }
    for index in 0..100i64 {
        push_audio(&sync, BLOCK_SAMPLES, index * BLOCK_MICROS);
    }

    sync.new_segment();
    wait_for(|| video_rx.len() == 30);
    assert_eq!(sync.total_time(), 1_000_000);
}

#[test]
fn encoder_failure_stops_the_worker_but_not_the_producers() {
    reel_sync::init().unwrap();

    let (audio_tx, _audio_rx) = flume::unbounded();
    let sync = Synchronizer::new(
        options(),
        Some(Box::new(FailingVideoEncoder)),
        Some(Box::new(TestAudioEncoder { sender: audio_tx })),
    )
    .unwrap();

    for index in 0..30i64 {
        push_frame(&sync, index * FRAME_PERIOD);
    }
    for index in 0..100i64 {
        push_audio(&sync, BLOCK_SAMPLES, index * BLOCK_MICROS);
    }

    wait_for(|| sync.error_occurred());

    // producers are decoupled from the dead worker and keep succeeding
    push_frame(&sync, 40 * FRAME_PERIOD);
    push_audio(&sync, BLOCK_SAMPLES, 110 * BLOCK_MICROS);
}

#[test]
fn video_only_sessions_run_without_audio() {
    reel_sync::init().unwrap();

    let (video_tx, video_rx) = flume::unbounded();
    let sync = Synchronizer::new(
        SyncOptions::new(Some(video_info()), None).with_max_video_frames(256),
        Some(Box::new(TestVideoEncoder { sender: video_tx })),
        None,
    )
    .unwrap();

    let error = sync
        .read_audio_samples(SAMPLE_RATE, 1, &[0u8; 64], RawAudioFormat::F32, 0)
        .unwrap_err();
    assert!(matches!(error, SyncError::StreamDisabled("audio")));

    for index in 0..30i64 {
        push_frame(&sync, index * FRAME_PERIOD);
    }

    sync.new_segment();
    wait_for(|| video_rx.len() == 30);

    let pts: Vec<i64> = video_rx.try_iter().collect();
    assert_eq!(pts, (0..30).collect::<Vec<_>>());
}

#[test]
fn mismatched_configuration_is_rejected() {
    reel_sync::init().unwrap();

    let (video_tx, _video_rx) = flume::unbounded();
    let result = Synchronizer::new(
        SyncOptions::new(None, None),
        Some(Box::new(TestVideoEncoder { sender: video_tx })),
        None,
    );
    assert!(matches!(result, Err(SyncError::Config(_))));

    let result = Synchronizer::new(SyncOptions::new(None, None), None, None);
    assert!(matches!(result, Err(SyncError::Config(_))));

    // an encoder layout with no channel layout is caught at construction
    let surround = AudioInfo::new_raw(Sample::F32(Type::Planar), SAMPLE_RATE, 6);
    let (audio_tx, _audio_rx) = flume::unbounded();
    let result = Synchronizer::new(
        SyncOptions::new(None, Some(surround)),
        None,
        Some(Box::new(TestAudioEncoder { sender: audio_tx })),
    );
    assert!(matches!(result, Err(SyncError::AudioInfo(_))));
}

#[test]
fn unsupported_channel_counts_are_rejected_at_ingest() {
    let (sync, _channels) = make_synchronizer(options());

    // a 5.1 capture device must get an error back, not panic the producer
    let error = sync
        .read_audio_samples(SAMPLE_RATE, 6, &[0u8; 96], RawAudioFormat::F32, 0)
        .unwrap_err();
    assert!(matches!(error, SyncError::AudioInfo(_)));

    let error = sync
        .read_audio_samples(SAMPLE_RATE, 0, &[0u8; 96], RawAudioFormat::F32, 0)
        .unwrap_err();
    assert!(matches!(error, SyncError::AudioInfo(_)));

    // the session itself is unharmed
    push_audio(&sync, BLOCK_SAMPLES, 0);
    assert!(!sync.error_occurred());
}

#[test]
fn next_video_timestamp_tracks_the_frame_cadence() {
    let (sync, (_video_rx, _audio_rx)) = make_synchronizer(options());

    assert_eq!(sync.next_video_timestamp(), 0);

    push_frame(&sync, 100_000);
    assert_eq!(sync.next_video_timestamp(), 100_000 + FRAME_PERIOD);

    sync.read_video_ping(400_000);
    assert_eq!(sync.next_video_timestamp(), 400_000);
}

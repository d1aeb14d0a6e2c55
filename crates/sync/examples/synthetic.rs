//! Drives the synchronizer with generated video and audio in real time:
//! a moving gradient at 30 fps and a 440 Hz tone at 48 kHz, recorded for a
//! few seconds with a pause in the middle.

use std::f32::consts::PI;
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::time::{Duration, Instant};

use reel_media_info::{AudioInfo, RawAudioFormat, RawVideoFormat, Sample, Type, VideoInfo};
use reel_sync::{AudioEncoder, AudioSink, SyncOptions, Synchronizer, VideoEncoder, VideoSink};
use tracing::info;

const WIDTH: u32 = 320;
const HEIGHT: u32 = 180;
const FPS: u32 = 30;
const SAMPLE_RATE: u32 = 48_000;
const BLOCK_SAMPLES: usize = 480;

struct CountingVideoEncoder {
    frames: Arc<AtomicU64>,
}

impl VideoEncoder for CountingVideoEncoder {
    fn queue_frame(&mut self, frame: ffmpeg::frame::Video) -> anyhow::Result<()> {
        let total = self.frames.fetch_add(1, Ordering::Relaxed) + 1;
        if total % 30 == 0 {
            info!(pts = frame.pts().unwrap(), total, "video frames encoded");
        }
        Ok(())
    }
}

struct CountingAudioEncoder {
    samples: Arc<AtomicU64>,
}

impl AudioEncoder for CountingAudioEncoder {
    fn frame_size(&self) -> usize {
        1024
    }

    fn queue_frame(&mut self, frame: ffmpeg::frame::Audio) -> anyhow::Result<()> {
        self.samples
            .fetch_add(frame.samples() as u64, Ordering::Relaxed);
        Ok(())
    }
}

fn generate_frame(buffer: &mut [u8], frame_number: u64) {
    for y in 0..HEIGHT as usize {
        for x in 0..WIDTH as usize {
            let offset = (y * WIDTH as usize + x) * 4;
            buffer[offset] = (x as u64 + frame_number) as u8;
            buffer[offset + 1] = (y as u64 + frame_number) as u8;
            buffer[offset + 2] = frame_number as u8;
            buffer[offset + 3] = 255;
        }
    }
}

fn generate_tone(buffer: &mut Vec<u8>, samples_done: u64) {
    buffer.clear();
    for index in 0..BLOCK_SAMPLES as u64 {
        let t = (samples_done + index) as f32 / SAMPLE_RATE as f32;
        let value = (2.0 * PI * 440.0 * t).sin() * 0.2;
        buffer.extend_from_slice(&value.to_ne_bytes());
    }
}

fn record(
    sync: &Arc<Synchronizer>,
    start: Instant,
    duration: Duration,
) -> (std::thread::JoinHandle<()>, std::thread::JoinHandle<()>) {
    let stop_at = Instant::now() + duration;
    let running = Arc::new(AtomicBool::new(true));

    let video = std::thread::spawn({
        let sync = Arc::clone(sync);
        let running = Arc::clone(&running);
        move || {
            let mut buffer = vec![0u8; (WIDTH * HEIGHT * 4) as usize];
            let mut frame_number = 0u64;
            while running.load(Ordering::Relaxed) && Instant::now() < stop_at {
                let timestamp = start.elapsed().as_micros() as i64;
                if timestamp >= sync.next_video_timestamp() {
                    generate_frame(&mut buffer, frame_number);
                    sync.read_video_frame(
                        WIDTH,
                        HEIGHT,
                        &buffer,
                        (WIDTH * 4) as usize,
                        RawVideoFormat::Bgra,
                        timestamp,
                    )
                    .unwrap();
                    frame_number += 1;
                }
                std::thread::sleep(Duration::from_millis(2));
            }
            running.store(false, Ordering::Relaxed);
        }
    });

    let audio = std::thread::spawn({
        let sync = Arc::clone(sync);
        move || {
            let mut buffer = Vec::with_capacity(BLOCK_SAMPLES * 4);
            let mut samples_done = 0u64;
            let block = Duration::from_secs_f64(BLOCK_SAMPLES as f64 / SAMPLE_RATE as f64);
            let mut next = Instant::now();
            while running.load(Ordering::Relaxed) && Instant::now() < stop_at {
                let timestamp = start.elapsed().as_micros() as i64;
                generate_tone(&mut buffer, samples_done);
                sync.read_audio_samples(SAMPLE_RATE, 1, &buffer, RawAudioFormat::F32, timestamp)
                    .unwrap();
                samples_done += BLOCK_SAMPLES as u64;

                next += block;
                let now = Instant::now();
                if next > now {
                    std::thread::sleep(next - now);
                }
            }
        }
    });

    (video, audio)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    reel_sync::init()?;

    let video_info = VideoInfo::new(reel_media_info::Pixel::NV12, WIDTH, HEIGHT, FPS);
    let audio_info = AudioInfo::new_raw(Sample::F32(Type::Planar), SAMPLE_RATE, 1);

    let frames = Arc::new(AtomicU64::new(0));
    let samples = Arc::new(AtomicU64::new(0));

    let sync = Arc::new(Synchronizer::new(
        SyncOptions::new(Some(video_info), Some(audio_info)),
        Some(Box::new(CountingVideoEncoder {
            frames: Arc::clone(&frames),
        })),
        Some(Box::new(CountingAudioEncoder {
            samples: Arc::clone(&samples),
        })),
    )?);

    let start = Instant::now();

    info!("recording the first segment");
    let (video, audio) = record(&sync, start, Duration::from_secs(3));
    video.join().unwrap();
    audio.join().unwrap();

    sync.new_segment();
    info!(
        total_ms = sync.total_time() / 1_000,
        "paused; waiting a second before resuming"
    );
    std::thread::sleep(Duration::from_secs(1));

    info!("recording the second segment");
    let (video, audio) = record(&sync, start, Duration::from_secs(2));
    video.join().unwrap();
    audio.join().unwrap();

    sync.new_segment();
    std::thread::sleep(Duration::from_millis(100));

    info!(
        total_ms = sync.total_time() / 1_000,
        frames = frames.load(Ordering::Relaxed),
        samples = samples.load(Ordering::Relaxed),
        error = sync.error_occurred(),
        "finished"
    );

    Ok(())
}

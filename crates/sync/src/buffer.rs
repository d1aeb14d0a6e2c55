use std::collections::VecDeque;

use ffmpeg::frame;

/// Owned, converted video frames waiting for the emit worker. Each frame's
/// PTS holds its capture timestamp in microseconds until the worker rewrites
/// it with the output frame index.
pub struct VideoQueue {
    frames: VecDeque<frame::Video>,
    capacity: usize,
}

impl VideoQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Push a frame, dropping from the head if the queue is over capacity.
    /// Returns the number of frames dropped.
    pub fn push(&mut self, frame: frame::Video) -> usize {
        self.frames.push_back(frame);

        let mut dropped = 0;
        while self.frames.len() > self.capacity {
            self.frames.pop_front();
            dropped += 1;
        }
        dropped
    }

    pub fn front_timestamp(&self) -> Option<i64> {
        self.frames.front().and_then(|frame| frame.pts())
    }

    pub fn pop(&mut self) -> Option<frame::Video> {
        self.frames.pop_front()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

/// FIFO of interleaved samples in the encoder's sample format. Only the
/// wall-clock position of the head is tracked (by the segment state);
/// trailing samples are located by their offset from it.
pub struct SampleQueue {
    bytes: VecDeque<u8>,
    block_size: usize,
    capacity: usize,
}

impl SampleQueue {
    /// `block_size` is the size in bytes of one sample across all channels;
    /// `capacity` is in samples.
    pub fn new(block_size: usize, capacity: usize) -> Self {
        Self {
            bytes: VecDeque::new(),
            block_size,
            capacity,
        }
    }

    pub fn samples(&self) -> usize {
        self.bytes.len() / self.block_size
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.bytes.extend(data);
    }

    pub fn extend_silence(&mut self, samples: usize) {
        self.bytes
            .extend(std::iter::repeat(0u8).take(samples * self.block_size));
    }

    /// Drop samples from the head until the queue fits its capacity.
    /// Returns the number of samples dropped.
    pub fn truncate_front(&mut self) -> usize {
        let over = self.samples().saturating_sub(self.capacity);
        if over > 0 {
            self.bytes.drain(0..over * self.block_size);
        }
        over
    }

    /// Move up to `samples` samples off the head into `out`. Returns the
    /// number of samples moved.
    pub fn consume(&mut self, samples: usize, out: &mut Vec<u8>) -> usize {
        let take = samples.min(self.samples());
        out.extend(self.bytes.drain(0..take * self.block_size));
        take
    }

    /// Discard up to `samples` samples from the head. Returns the number of
    /// samples discarded.
    pub fn discard(&mut self, samples: usize) -> usize {
        let take = samples.min(self.samples());
        self.bytes.drain(0..take * self.block_size);
        take
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod sample_queue {
        use super::*;

        #[test]
        fn consume_in_sample_units() {
            let mut queue = SampleQueue::new(4, 100);
            queue.extend(&[1u8; 40]);
            assert_eq!(queue.samples(), 10);

            let mut out = Vec::new();
            assert_eq!(queue.consume(3, &mut out), 3);
            assert_eq!(out.len(), 12);
            assert_eq!(queue.samples(), 7);

            assert_eq!(queue.consume(100, &mut out), 7);
            assert!(queue.is_empty());
        }

        #[test]
        fn overflow_drops_from_head() {
            let mut queue = SampleQueue::new(2, 8);
            queue.extend(&[1u8; 12]);
            queue.extend(&[2u8; 8]);
            assert_eq!(queue.samples(), 10);

            assert_eq!(queue.truncate_front(), 2);
            assert_eq!(queue.samples(), 8);

            // the head now points into the older data
            let mut out = Vec::new();
            queue.consume(1, &mut out);
            assert_eq!(out, vec![1u8; 2]);
        }

        #[test]
        fn silence_is_zeroed() {
            let mut queue = SampleQueue::new(4, 100);
            queue.extend_silence(5);
            assert_eq!(queue.samples(), 5);

            let mut out = Vec::new();
            queue.consume(5, &mut out);
            assert!(out.iter().all(|byte| *byte == 0));
        }

        #[test]
        fn discard_bumps_past_leading_samples() {
            let mut queue = SampleQueue::new(2, 100);
            queue.extend(&[7u8; 20]);
            assert_eq!(queue.discard(4), 4);
            assert_eq!(queue.samples(), 6);
            assert_eq!(queue.discard(100), 6);
            assert!(queue.is_empty());
        }
    }

    mod video_queue {
        use super::*;

        fn make_frame(pts: i64) -> frame::Video {
            let mut frame = frame::Video::new(ffmpeg::format::Pixel::YUV420P, 16, 16);
            frame.set_pts(Some(pts));
            frame
        }

        #[test]
        fn ordered_pop() {
            let mut queue = VideoQueue::new(4);
            for pts in 0..3 {
                assert_eq!(queue.push(make_frame(pts)), 0);
            }

            assert_eq!(queue.front_timestamp(), Some(0));
            assert_eq!(queue.pop().unwrap().pts(), Some(0));
            assert_eq!(queue.front_timestamp(), Some(1));
            assert_eq!(queue.len(), 2);
        }

        #[test]
        fn overflow_drops_oldest() {
            let mut queue = VideoQueue::new(2);
            assert_eq!(queue.push(make_frame(0)), 0);
            assert_eq!(queue.push(make_frame(1)), 0);
            assert_eq!(queue.push(make_frame(2)), 1);

            assert_eq!(queue.front_timestamp(), Some(1));
            assert_eq!(queue.len(), 2);
        }
    }
}

use super::backend::{AudioFrame, CaptureOrigin};

/// Assembles arbitrary-size sample blocks into constant-length frames.
///
/// Capture callbacks and decoders deliver whatever block size the host audio
/// subsystem picked; everything downstream relies on a fixed frame length.
/// The chunker absorbs input, emits complete frames, and keeps the remainder
/// for the next push. Frame timestamps are derived from the running sample
/// count, so emitted frames are gapless and strictly ordered.
pub struct FrameChunker {
    frame_samples: usize,
    sample_rate: u32,
    origin: CaptureOrigin,
    pending: Vec<f32>,
    samples_emitted: u64,
}

impl FrameChunker {
    pub fn new(frame_samples: usize, sample_rate: u32, origin: CaptureOrigin) -> Self {
        Self {
            frame_samples,
            sample_rate,
            origin,
            pending: Vec::with_capacity(frame_samples),
            samples_emitted: 0,
        }
    }

    /// Absorb a block of samples and return every complete frame it yields.
    pub fn push(&mut self, samples: &[f32]) -> Vec<AudioFrame> {
        self.pending.extend_from_slice(samples);

        let mut frames = Vec::new();
        while self.pending.len() >= self.frame_samples {
            let rest = self.pending.split_off(self.frame_samples);
            let samples = std::mem::replace(&mut self.pending, rest);
            frames.push(self.make_frame(samples));
        }
        frames
    }

    /// Flush the remainder as a final short frame, if any samples are pending.
    ///
    /// Only used at end of capture; mid-capture frames are always full-length.
    pub fn flush(&mut self) -> Option<AudioFrame> {
        if self.pending.is_empty() {
            return None;
        }
        let samples = std::mem::take(&mut self.pending);
        Some(self.make_frame(samples))
    }

    fn make_frame(&mut self, samples: Vec<f32>) -> AudioFrame {
        let timestamp_ms = self.samples_emitted * 1000 / self.sample_rate as u64;
        self.samples_emitted += samples.len() as u64;

        AudioFrame {
            samples,
            sample_rate: self.sample_rate,
            timestamp_ms,
            origin: self.origin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(frame_samples: usize) -> FrameChunker {
        FrameChunker::new(frame_samples, 16000, CaptureOrigin::Microphone)
    }

    #[test]
    fn test_push_smaller_than_frame_emits_nothing() {
        let mut ch = chunker(8);
        let frames = ch.push(&[0.1; 5]);

        assert!(frames.is_empty());
    }

    #[test]
    fn test_push_accumulates_across_calls() {
        let mut ch = chunker(8);
        assert!(ch.push(&[0.1; 5]).is_empty());

        let frames = ch.push(&[0.2; 5]);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].samples.len(), 8);
        // first five from the first push, three from the second
        assert_eq!(frames[0].samples[4], 0.1);
        assert_eq!(frames[0].samples[5], 0.2);
    }

    #[test]
    fn test_large_push_emits_multiple_frames() {
        let mut ch = chunker(4);
        let input: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let frames = ch.push(&input);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].samples, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(frames[1].samples, vec![4.0, 5.0, 6.0, 7.0]);

        // 8.0, 9.0 still pending
        let tail = ch.flush().unwrap();
        assert_eq!(tail.samples, vec![8.0, 9.0]);
    }

    #[test]
    fn test_timestamps_are_gapless() {
        let mut ch = chunker(16000); // one second per frame at 16 kHz
        let frames = ch.push(&vec![0.0; 48000]);

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].timestamp_ms, 0);
        assert_eq!(frames[1].timestamp_ms, 1000);
        assert_eq!(frames[2].timestamp_ms, 2000);
    }

    #[test]
    fn test_flush_empty_returns_none() {
        let mut ch = chunker(8);
        assert!(ch.flush().is_none());
    }
}

//! CD de-emphasis filter
//!
//! Discs flagged PRE were mastered with a 50/15 µs high-frequency boost.
//! This first-order shelving filter undoes it: unity gain at DC, about
//! -10 dB towards Nyquist. Derived from the analog prototype
//! `H(s) = (1 + s·15µs) / (1 + s·50µs)` via the bilinear transform.

use super::{BYTES_PER_SAMPLE, CHANNELS};

/// Pole time constant (seconds)
const TAU_POLE: f64 = 50e-6;
/// Zero time constant (seconds)
const TAU_ZERO: f64 = 15e-6;

#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    x1: f32,
    y1: f32,
}

/// De-emphasis filter for interleaved 16-bit stereo PCM
#[derive(Debug, Clone)]
pub struct DeEmphasisFilter {
    b0: f32,
    b1: f32,
    a1: f32,
    state: [ChannelState; CHANNELS as usize],
}

impl DeEmphasisFilter {
    /// Create a filter for the given sample rate
    pub fn new(sample_rate: u32) -> Self {
        let k = 2.0 * f64::from(sample_rate);
        let norm = 1.0 + k * TAU_POLE;
        DeEmphasisFilter {
            b0: ((1.0 + k * TAU_ZERO) / norm) as f32,
            b1: ((1.0 - k * TAU_ZERO) / norm) as f32,
            a1: ((1.0 - k * TAU_POLE) / norm) as f32,
            state: [ChannelState::default(); CHANNELS as usize],
        }
    }

    /// Filter one sample of one channel
    #[inline]
    pub fn process_sample(&mut self, channel: usize, x: f32) -> f32 {
        let s = &mut self.state[channel];
        let y = self.b0 * x + self.b1 * s.x1 - self.a1 * s.y1;
        s.x1 = x;
        s.y1 = y;
        y
    }

    /// Filter a block of little-endian interleaved stereo PCM in place
    ///
    /// A trailing partial frame is left untouched.
    pub fn process(&mut self, pcm: &mut [u8]) {
        let frame_bytes = BYTES_PER_SAMPLE * CHANNELS as usize;
        for frame in pcm.chunks_exact_mut(frame_bytes) {
            for (channel, sample) in frame.chunks_exact_mut(BYTES_PER_SAMPLE).enumerate() {
                let x = f32::from(i16::from_le_bytes([sample[0], sample[1]]));
                let y = self
                    .process_sample(channel, x)
                    .round()
                    .clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
                sample.copy_from_slice(&y.to_le_bytes());
            }
        }
    }

    /// Clear the filter history
    pub fn reset(&mut self) {
        self.state = [ChannelState::default(); CHANNELS as usize];
    }
}

impl Default for DeEmphasisFilter {
    fn default() -> Self {
        Self::new(super::SAMPLE_RATE)
    }
}

//! Audio buffers and codec glue
//!
//! Decoding (symphonia), WAV encoding (hound) and sample-rate conversion
//! (rubato) for the mixing and mastering stages.

pub mod decoder;
pub mod encoder;
pub mod resampler;

pub use decoder::{decode_bytes, decode_file, DecodeError};
pub use encoder::{encode_wav_f32, write_wav_pcm24};
pub use resampler::Resampler;

use std::time::Duration;

/// Decoded PCM audio
///
/// Samples are interleaved f32 in [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        debug_assert!(channels > 0);
        debug_assert_eq!(samples.len() % channels as usize, 0);
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Buffer of `frames` frames of silence
    pub fn silent(frames: usize, sample_rate: u32, channels: u16) -> Self {
        Self::new(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Root-mean-square level over all samples; 0.0 when empty
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
        (sum / self.samples.len() as f64).sqrt() as f32
    }

    /// Largest absolute sample value
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Duplicate a mono buffer across `channels` channels
    pub fn upmix_mono(&self, channels: u16) -> Self {
        debug_assert_eq!(self.channels, 1);
        let mut samples = Vec::with_capacity(self.samples.len() * channels as usize);
        for sample in &self.samples {
            samples.extend(std::iter::repeat(*sample).take(channels as usize));
        }
        Self::new(samples, self.sample_rate, channels)
    }
}

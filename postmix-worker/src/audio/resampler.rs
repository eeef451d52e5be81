//! Sample-rate conversion using rubato

use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

use super::AudioBuffer;

/// Converts buffers to a target sample rate
pub struct Resampler;

impl Resampler {
    /// Resample `input` to `output_rate`.
    ///
    /// Returns a copy when the rate already matches.
    pub fn resample(input: &AudioBuffer, output_rate: u32) -> Result<AudioBuffer, String> {
        if input.sample_rate == output_rate {
            return Ok(input.clone());
        }

        let channels = input.channels as usize;
        let input_frames = input.frames();

        debug!(
            from = input.sample_rate,
            to = output_rate,
            channels,
            input_frames,
            "Resampling"
        );

        if input_frames == 0 {
            return Ok(AudioBuffer::new(Vec::new(), output_rate, input.channels));
        }

        let planar_input = Self::deinterleave(&input.samples, channels);

        // Whole buffer as one chunk
        let mut resampler = FastFixedIn::<f32>::new(
            output_rate as f64 / input.sample_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            input_frames,
            channels,
        )
        .map_err(|e| format!("Failed to create resampler: {}", e))?;

        let planar_output = resampler
            .process(&planar_input, None)
            .map_err(|e| format!("Resampling failed: {}", e))?;

        let samples = Self::interleave(planar_output);
        Ok(AudioBuffer::new(samples, output_rate, input.channels))
    }

    /// [L, R, L, R, ...] -> [[L, L, ...], [R, R, ...]]
    fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
        let num_frames = samples.len() / channels;
        let mut planar = vec![Vec::with_capacity(num_frames); channels];

        for frame in samples.chunks_exact(channels) {
            for (ch, sample) in frame.iter().enumerate() {
                planar[ch].push(*sample);
            }
        }

        planar
    }

    /// [[L, L, ...], [R, R, ...]] -> [L, R, L, R, ...]
    fn interleave(planar: Vec<Vec<f32>>) -> Vec<f32> {
        if planar.is_empty() {
            return Vec::new();
        }

        let num_frames = planar.iter().map(Vec::len).min().unwrap_or(0);
        let mut interleaved = Vec::with_capacity(num_frames * planar.len());

        for frame_idx in 0..num_frames {
            for channel in &planar {
                interleaved.push(channel[frame_idx]);
            }
        }

        interleaved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deinterleave() {
        let planar = Resampler::deinterleave(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2);
        assert_eq!(planar, vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]]);
    }

    #[test]
    fn test_interleave() {
        let interleaved = Resampler::interleave(vec![vec![1.0, 3.0, 5.0], vec![2.0, 4.0, 6.0]]);
        assert_eq!(interleaved, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_same_rate_is_copy() {
        let input = AudioBuffer::new(vec![0.1, 0.2, 0.3], 44100, 1);
        assert_eq!(Resampler::resample(&input, 44100).unwrap(), input);
    }

    #[test]
    fn test_upsample_roughly_doubles_length() {
        let input = AudioBuffer::silent(4410, 22050, 2);
        let output = Resampler::resample(&input, 44100).unwrap();
        assert_eq!(output.sample_rate, 44100);
        assert_eq!(output.channels, 2);
        let frames = output.frames() as i64;
        assert!((frames - 8820).abs() < 200, "got {} frames", frames);
    }
}

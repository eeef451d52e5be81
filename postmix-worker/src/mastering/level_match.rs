//! Native loudness matching
//!
//! **Algorithm:**
//! 1. Decode target stream and reference file
//! 2. Gain = RMS(reference) / RMS(target)
//! 3. If the gained peak exceeds the ceiling (-0.1 dBFS), scale down to it
//! 4. Write 24-bit PCM at the target's sample rate and layout

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use super::{Masterer, MasteringError};
use crate::audio::{decode_bytes, decode_file, write_wav_pcm24, AudioBuffer};

/// Peak ceiling, -0.1 dBFS
pub const PEAK_CEILING: f32 = 0.988_553_1;

#[derive(Debug, Default, Clone, Copy)]
pub struct LevelMatchMasterer;

impl LevelMatchMasterer {
    pub fn new() -> Self {
        Self
    }

    /// Level-match `target` to `reference`
    pub fn process(target: &AudioBuffer, reference: &AudioBuffer) -> Result<AudioBuffer, MasteringError> {
        let reference_rms = reference.rms();
        if reference_rms <= f32::EPSILON {
            return Err(MasteringError::SilentReference);
        }

        let target_rms = target.rms();
        let mut gain = if target_rms <= f32::EPSILON {
            1.0
        } else {
            reference_rms / target_rms
        };

        let peak = target.peak() * gain;
        if peak > PEAK_CEILING {
            gain *= PEAK_CEILING / peak;
        }

        info!(
            target_rms,
            reference_rms,
            gain_db = format!("{:.2}", 20.0 * gain.log10()),
            "Level matching"
        );

        let samples = target.samples.iter().map(|s| s * gain).collect();
        Ok(AudioBuffer::new(samples, target.sample_rate, target.channels))
    }
}

#[async_trait]
impl Masterer for LevelMatchMasterer {
    async fn master(
        &self,
        target_wav: Vec<u8>,
        reference: &Path,
        output: &Path,
    ) -> Result<(), MasteringError> {
        let reference = reference.to_path_buf();
        let output = output.to_path_buf();

        tokio::task::spawn_blocking(move || -> Result<(), MasteringError> {
            let target = decode_bytes(target_wav, "mixed target")?;
            let reference = decode_file(&reference)?;
            let mastered = Self::process(&target, &reference)?;
            write_wav_pcm24(&mastered, &output)?;
            info!(path = %output.display(), "Mastering completed");
            Ok(())
        })
        .await
        .map_err(|e| MasteringError::Task(e.to_string()))?
    }
}

//! Vocal / instrumental mixer
//!
//! Output always has the instrumental's length:
//! - shorter vocals are padded with trailing silence
//! - longer vocals are truncated
//!
//! Vocals are overlaid additively, clamped to full scale. Before mixing the two
//! buffers are brought to a common format: vocals are resampled to the
//! instrumental rate, and a mono buffer is duplicated across the other
//! buffer's channels.

use std::path::Path;

use thiserror::Error;
use tracing::{debug, info};

use crate::audio::{decode_file, AudioBuffer, DecodeError, Resampler};

/// Mixing errors
#[derive(Debug, Error)]
pub enum MixError {
    #[error("Failed to decode input: {0}")]
    Decode(#[from] DecodeError),

    #[error("Cannot mix {vocals}-channel vocals with {instrumental}-channel instrumental")]
    ChannelMismatch { vocals: u16, instrumental: u16 },

    #[error("Resampling vocals failed: {0}")]
    Resample(String),

    #[error("Failed to encode mixed audio: {0}")]
    Encode(String),

    #[error("Mixing task failed: {0}")]
    Task(String),
}

/// Decode both files and mix them
pub fn mix_files(vocals_path: &Path, instrumental_path: &Path) -> Result<AudioBuffer, MixError> {
    info!(
        vocals = %vocals_path.display(),
        instrumental = %instrumental_path.display(),
        "Mixing tracks"
    );
    let vocals = decode_file(vocals_path)?;
    let instrumental = decode_file(instrumental_path)?;
    mix(&vocals, &instrumental)
}

/// Overlay `vocals` onto `instrumental`
pub fn mix(vocals: &AudioBuffer, instrumental: &AudioBuffer) -> Result<AudioBuffer, MixError> {
    let vocals = if vocals.sample_rate != instrumental.sample_rate {
        Resampler::resample(vocals, instrumental.sample_rate).map_err(MixError::Resample)?
    } else {
        vocals.clone()
    };

    let (vocals, instrumental) = match (vocals.channels, instrumental.channels) {
        (v, i) if v == i => (vocals, instrumental.clone()),
        (1, i) => (vocals.upmix_mono(i), instrumental.clone()),
        (v, 1) => (vocals, instrumental.upmix_mono(v)),
        (v, i) => {
            return Err(MixError::ChannelMismatch {
                vocals: v,
                instrumental: i,
            })
        }
    };

    let target_frames = instrumental.frames();
    let vocal_frames = vocals.frames();
    let channels = instrumental.channels as usize;

    debug!(
        vocal_frames,
        instrumental_frames = target_frames,
        channels,
        "Aligning vocals to instrumental length"
    );

    let overlap = vocal_frames.min(target_frames) * channels;
    let mut samples = instrumental.samples;
    for (out, vocal) in samples[..overlap].iter_mut().zip(&vocals.samples[..overlap]) {
        *out = (*out + *vocal).clamp(-1.0, 1.0);
    }
    // Padding region: silence contributes nothing, instrumental passes through

    Ok(AudioBuffer::new(samples, instrumental.sample_rate, instrumental.channels))
}

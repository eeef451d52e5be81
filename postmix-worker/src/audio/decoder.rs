//! Audio decoding
//!
//! Decodes a file or an in-memory stream to interleaved f32 PCM, keeping the
//! original channel layout. Uses symphonia for format-agnostic decoding.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use thiserror::Error;

use super::AudioBuffer;

/// Decoding errors
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unsupported or corrupt audio ({label}): {message}")]
    Format { label: String, message: String },

    #[error("No audio track found ({0})")]
    NoTrack(String),

    #[error("Decode failed ({label}): {message}")]
    Decode { label: String, message: String },
}

/// Decode an audio file
pub fn decode_file(path: &Path) -> Result<AudioBuffer, DecodeError> {
    tracing::debug!(path = %path.display(), "Decoding audio file");

    let file = std::fs::File::open(path).map_err(|source| DecodeError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    decode_stream(mss, hint, &path.display().to_string())
}

/// Decode an encoded in-memory stream (WAV unless probing says otherwise)
pub fn decode_bytes(bytes: Vec<u8>, label: &str) -> Result<AudioBuffer, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    hint.with_extension("wav");
    decode_stream(mss, hint, label)
}

fn decode_stream(mss: MediaSourceStream, hint: Hint, label: &str) -> Result<AudioBuffer, DecodeError> {
    let format_err = |e: SymphoniaError| DecodeError::Format {
        label: label.to_string(),
        message: e.to_string(),
    };

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(format_err)?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::NoTrack(label.to_string()))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(format_err)?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // End of stream
                break;
            }
            Err(e) => {
                return Err(DecodeError::Decode {
                    label: label.to_string(),
                    message: e.to_string(),
                })
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet).map_err(|e| DecodeError::Decode {
            label: label.to_string(),
            message: e.to_string(),
        })?;

        let spec = decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count());

        append_interleaved(&decoded, &mut samples);
    }

    let (sample_rate, channels) = match (sample_rate, channels) {
        (Some(rate), Some(ch)) if rate > 0 && ch > 0 => (rate, ch as u16),
        _ => {
            return Err(DecodeError::Format {
                label: label.to_string(),
                message: "sample rate or channel layout unknown".to_string(),
            })
        }
    };

    let buffer = AudioBuffer::new(samples, sample_rate, channels);

    tracing::debug!(
        source = label,
        sample_rate,
        channels,
        frames = buffer.frames(),
        duration_seconds = format!("{:.2}", buffer.duration().as_secs_f64()),
        "Audio decoding complete"
    );

    Ok(buffer)
}

/// Append a decoded packet to `out` as interleaved f32
fn append_interleaved(decoded: &AudioBufferRef, out: &mut Vec<f32>) {
    fn push_frames<S>(buf: &symphonia::core::audio::AudioBuffer<S>, out: &mut Vec<f32>)
    where
        S: Sample,
        f32: FromSample<S>,
    {
        let num_channels = buf.spec().channels.count();
        let num_frames = buf.frames();
        out.reserve(num_frames * num_channels);

        for frame_idx in 0..num_frames {
            for ch in 0..num_channels {
                out.push(f32::from_sample(buf.chan(ch)[frame_idx]));
            }
        }
    }

    match decoded {
        AudioBufferRef::U8(buf) => push_frames(buf, out),
        AudioBufferRef::U16(buf) => push_frames(buf, out),
        AudioBufferRef::U24(buf) => push_frames(buf, out),
        AudioBufferRef::U32(buf) => push_frames(buf, out),
        AudioBufferRef::S8(buf) => push_frames(buf, out),
        AudioBufferRef::S16(buf) => push_frames(buf, out),
        AudioBufferRef::S24(buf) => push_frames(buf, out),
        AudioBufferRef::S32(buf) => push_frames(buf, out),
        AudioBufferRef::F32(buf) => push_frames(buf, out),
        AudioBufferRef::F64(buf) => push_frames(buf, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::encode_wav_f32;

    #[test]
    fn test_decode_wav_keeps_channels() {
        let original = AudioBuffer::new(vec![0.25, -0.25, 0.5, -0.5, 0.0, 0.0], 22050, 2);
        let bytes = encode_wav_f32(&original).unwrap();

        let decoded = decode_bytes(bytes, "memory").unwrap();

        assert_eq!(decoded.channels, 2);
        assert_eq!(decoded.sample_rate, 22050);
        assert_eq!(decoded.frames(), 3);
        for (a, b) in decoded.samples.iter().zip(&original.samples) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_decode_garbage_is_format_error() {
        let err = decode_bytes(b"definitely not audio".to_vec(), "garbage").unwrap_err();
        assert!(matches!(err, DecodeError::Format { .. }));
    }

    #[test]
    fn test_decode_missing_file() {
        let err = decode_file(Path::new("/nonexistent/vocals.wav")).unwrap_err();
        assert!(matches!(err, DecodeError::Open { .. }));
    }
}

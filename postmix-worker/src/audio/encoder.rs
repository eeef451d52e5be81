//! WAV encoding
//!
//! In-memory 32-bit float WAV for handing buffers between stages, and 24-bit
//! PCM files for mastered output.

use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use super::AudioBuffer;

/// Largest positive 24-bit sample
const PCM24_MAX: f32 = 8_388_607.0;

/// Encode a buffer as a 32-bit float WAV stream in memory
pub fn encode_wav_f32(buffer: &AudioBuffer) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in &buffer.samples {
            writer.write_sample(*sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Write a buffer as a 24-bit PCM WAV file; samples are clamped to full scale
pub fn write_wav_pcm24(buffer: &AudioBuffer, path: &Path) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 24,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for sample in &buffer.samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * PCM24_MAX).round() as i32)?;
    }
    writer.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm24_file_spec_and_clamping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let buffer = AudioBuffer::new(vec![0.0, 0.5, 2.0, -2.0], 48000, 2);

        write_wav_pcm24(&buffer, &path).unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.bits_per_sample, 24);
        assert_eq!(spec.sample_format, SampleFormat::Int);
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 48000);

        let samples: Vec<i32> = reader.samples::<i32>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 4_194_304, 8_388_607, -8_388_607]);
    }

    #[test]
    fn test_float_stream_header() {
        let bytes = encode_wav_f32(&AudioBuffer::silent(10, 8000, 1)).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
    }
}

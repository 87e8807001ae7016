//! Mono 16-bit PCM WAV encoding and decoding.

use std::io::Cursor;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WavError {
    #[error("wav encoding failed: {0}")]
    Encode(#[source] hound::Error),

    #[error("wav decoding failed: {0}")]
    Decode(#[source] hound::Error),

    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),
}

/// Encode PCM f32 samples in `[-1.0, 1.0]` as a mono 16-bit WAV file.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, WavError> {
    if sample_rate == 0 {
        return Err(WavError::InvalidSampleRate(sample_rate));
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    // WAV header (44 bytes) + 2 bytes per sample
    let mut cursor = Cursor::new(Vec::<u8>::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(WavError::Encode)?;
        const I16_MAX_F32: f32 = i16::MAX as f32;
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * I16_MAX_F32) as i16;
            writer.write_sample(v).map_err(WavError::Encode)?;
        }
        writer.finalize().map_err(WavError::Encode)?;
    }

    Ok(cursor.into_inner())
}

/// Decode a WAV file into mono f32 samples and its sample rate.
///
/// Multi-channel input is downmixed by averaging each frame.
pub fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32), WavError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).map_err(WavError::Decode)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(WavError::Decode)?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(WavError::Decode)?
        }
    };

    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok((samples, spec.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_writes_mono_16bit_header() {
        let bytes = encode_wav(&[0.0, 0.5, -0.5, 1.0], 24_000).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(bytes.len(), 44 + 4 * 2);

        let reader = hound::WavReader::new(Cursor::new(&bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_rate, 24_000);
    }

    #[test]
    fn test_encode_clamps_out_of_range_samples() {
        let bytes = encode_wav(&[3.0, -3.0], 16_000).unwrap();
        let (samples, _) = decode_wav(&bytes).unwrap();
        assert!((samples[0] - 1.0).abs() < 1e-3);
        assert!((samples[1] + 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_encode_rejects_zero_sample_rate() {
        assert!(matches!(
            encode_wav(&[0.0], 0),
            Err(WavError::InvalidSampleRate(0))
        ));
    }

    #[test]
    fn test_decode_downmixes_stereo() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in [0.2f32, 0.4, -0.6, -0.2] {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }

        let (samples, rate) = decode_wav(&cursor.into_inner()).unwrap();
        assert_eq!(rate, 8_000);
        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 0.3).abs() < 1e-6);
        assert!((samples[1] + 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_wav(b"definitely not audio").is_err());
    }
}

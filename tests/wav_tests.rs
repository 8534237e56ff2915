//! Container encoder tests

use hound::{SampleFormat, WavReader};
use padmix::audio::{decode_wav, encode_wav, StereoBuffer, WAV_HEADER_BYTES};
use std::io::Cursor;

/// Generate a stereo test tone
fn generate_tone(frames: usize, sample_rate: u32) -> StereoBuffer {
    let left: Vec<f32> = (0..frames)
        .map(|i| (i as f32 * 0.05).sin() * 0.5)
        .collect();
    let right = left.iter().map(|x| -x).collect();
    StereoBuffer {
        sample_rate,
        left,
        right,
    }
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_buffer_layout() {
        let frames = 1000;
        let bytes = encode_wav(&StereoBuffer::silent(44100, frames)).unwrap();

        assert_eq!(bytes.len(), WAV_HEADER_BYTES + frames * 2 * 2);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(read_u32(&bytes, 4) as usize, bytes.len() - 8);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(read_u32(&bytes, 16), 16);
        assert_eq!(read_u16(&bytes, 20), 1);
        assert_eq!(read_u16(&bytes, 22), 2);
        assert_eq!(read_u32(&bytes, 24), 44100);
        assert_eq!(read_u32(&bytes, 28), 44100 * 4);
        assert_eq!(read_u16(&bytes, 32), 4);
        assert_eq!(read_u16(&bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(read_u32(&bytes, 40) as usize, frames * 4);
        assert!(bytes[44..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_header_reads_back_with_hound() {
        let bytes = encode_wav(&StereoBuffer::silent(44100, 10)).unwrap();
        let reader = WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(spec.sample_format, SampleFormat::Int);
    }

    #[test]
    fn test_out_of_range_samples_clamp() {
        let buffer = StereoBuffer {
            sample_rate: 44100,
            left: vec![1.5, 1.0],
            right: vec![-1.5, -1.0],
        };
        let bytes = encode_wav(&buffer).unwrap();
        let mut reader = WavReader::new(Cursor::new(bytes)).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        // interleaved L0 R0 L1 R1
        assert_eq!(samples, vec![32767, -32768, 32767, -32768]);
    }

    #[test]
    fn test_interleaving_and_decode() {
        let tone = generate_tone(512, 44100);
        let bytes = encode_wav(&tone).unwrap();
        let decoded = decode_wav(&bytes).unwrap();
        assert_eq!(decoded.sample_rate, 44100);
        assert_eq!(decoded.frames(), 512);
        for i in 0..512 {
            assert!((decoded.left[i] - tone.left[i]).abs() < 1e-3);
            assert!((decoded.right[i] - tone.right[i]).abs() < 1e-3);
        }
    }

    #[test]
    fn test_decode_mono_duplicates_channels() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for v in [0i16, 16384, -16384] {
                writer.write_sample(v).unwrap();
            }
            writer.finalize().unwrap();
        }
        let decoded = decode_wav(&cursor.into_inner()).unwrap();
        assert_eq!(decoded.sample_rate, 22050);
        assert_eq!(decoded.left, decoded.right);
        assert!((decoded.left[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_wav(b"RIFF....nope").is_err());
    }
}

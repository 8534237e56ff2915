//! Audio buffers and WAV I/O

use crate::error::Result;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;

/// Bytes of a canonical PCM WAV header
pub const WAV_HEADER_BYTES: usize = 44;

/// Planar stereo audio at a fixed sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct StereoBuffer {
    pub sample_rate: u32,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl StereoBuffer {
    /// Silent buffer of `frames` frames
    pub fn silent(sample_rate: u32, frames: usize) -> Self {
        Self {
            sample_rate,
            left: vec![0.0; frames],
            right: vec![0.0; frames],
        }
    }

    /// Mono material duplicated into both channels
    pub fn from_mono(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            right: samples.clone(),
            left: samples,
        }
    }

    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Absolute peak across both channels
    pub fn peak(&self) -> f32 {
        self.left
            .iter()
            .chain(&self.right)
            .fold(0.0f32, |peak, &x| peak.max(x.abs()))
    }

    /// Add `source * gain` starting at frame `offset`, truncated at the buffer end
    pub fn mix_in(&mut self, source: &StereoBuffer, offset: usize, gain: f32) {
        if offset >= self.frames() {
            return;
        }
        let n = source.frames().min(self.frames() - offset);
        for i in 0..n {
            self.left[offset + i] += source.left[i] * gain;
            self.right[offset + i] += source.right[i] * gain;
        }
    }
}

/// Convert a float sample to 16-bit PCM: clamp to [-1, 1], scale negatives by 32768
/// and non-negatives by 32767, truncating toward zero.
pub fn float_to_pcm16(sample: f32) -> i16 {
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Encode as 16-bit PCM interleaved stereo WAV
pub fn encode_wav(buffer: &StereoBuffer) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: 2,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(
        WAV_HEADER_BYTES + buffer.frames() * 4,
    ));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for (&l, &r) in buffer.left.iter().zip(&buffer.right) {
            writer.write_sample(float_to_pcm16(l))?;
            writer.write_sample(float_to_pcm16(r))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Decode WAV bytes into a stereo buffer; mono is duplicated, extra channels rejected
pub fn decode_wav(bytes: &[u8]) -> std::result::Result<StereoBuffer, String> {
    let mut reader = WavReader::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let spec = reader.spec();

    if spec.channels == 0 || spec.channels > 2 {
        return Err(format!("{} channels not supported", spec.channels));
    }
    if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
        return Err(format!("unsupported bit depth: {}", spec.bits_per_sample));
    }

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_value))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| e.to_string())?
        }
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| e.to_string())?,
    };

    if spec.channels == 2 {
        let mut left = Vec::with_capacity(samples.len() / 2);
        let mut right = Vec::with_capacity(samples.len() / 2);
        for frame in samples.chunks_exact(2) {
            left.push(frame[0]);
            right.push(frame[1]);
        }
        Ok(StereoBuffer {
            sample_rate: spec.sample_rate,
            left,
            right,
        })
    } else {
        Ok(StereoBuffer::from_mono(spec.sample_rate, samples))
    }
}

/// Linear-interpolation resampling of one channel
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).ceil() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            if idx >= last {
                return samples[last];
            }
            let frac = (pos - idx as f64) as f32;
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        })
        .collect()
}

/// Bring a decoded buffer to the render rate
pub fn resample_buffer(buffer: StereoBuffer, to_rate: u32) -> StereoBuffer {
    if buffer.sample_rate == to_rate {
        return buffer;
    }
    StereoBuffer {
        sample_rate: to_rate,
        left: resample_linear(&buffer.left, buffer.sample_rate, to_rate),
        right: resample_linear(&buffer.right, buffer.sample_rate, to_rate),
    }
}

/// Decibels to linear amplitude
pub fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

/// Linear amplitude to decibels, floored at -120 dB
pub fn linear_to_db(x: f32) -> f32 {
    20.0 * x.abs().max(1e-6).log10()
}

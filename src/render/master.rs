//! Master bus: volume, compressor, convolution reverb with a generated impulse

use crate::audio::{db_to_linear, linear_to_db, StereoBuffer};
use crate::config::{CompressorConfig, ReverbConfig};
use rand::Rng;
use rustfft::{num_complex::Complex32, FftPlanner};
use tracing::debug;

/// Floor and calibration used when normalizing an impulse response
const MIN_IMPULSE_POWER: f32 = 0.000125;
const IMPULSE_GAIN_CALIBRATION: f32 = 0.00125;

/// Stereo-linked feed-forward compressor with a soft knee.
///
/// Static curve (threshold T, knee W, ratio R, level x in dB):
/// ```text
/// 2(x - T) < -W      -> x
/// 2|x - T| <= W      -> x + (1/R - 1)(x - T + W/2)^2 / (2W)
/// 2(x - T) > W       -> T + (x - T)/R
/// ```
/// The gain reduction is smoothed with one-pole attack/release followers.
/// Make-up gain, when enabled, is `-0.6 * (curve(0 dB) - 0 dB)`.
pub struct Compressor {
    threshold_db: f32,
    knee_db: f32,
    ratio: f32,
    attack_coeff: f32,
    release_coeff: f32,
    envelope_db: f32,
    make_up_db: f32,
}

impl Compressor {
    pub fn new(config: &CompressorConfig, ratio: f32, sample_rate: u32) -> Self {
        let sr = sample_rate as f32;
        let mut comp = Self {
            threshold_db: config.threshold_db,
            knee_db: config.knee_db,
            ratio: ratio.max(1.0),
            attack_coeff: (-1.0 / (config.attack_sec * sr)).exp(),
            release_coeff: (-1.0 / (config.release_sec * sr)).exp(),
            envelope_db: 0.0,
            make_up_db: 0.0,
        };
        if config.make_up_gain {
            comp.make_up_db = -0.6 * comp.static_curve(0.0);
        }
        comp
    }

    /// Constant gain added after reduction, in dB
    pub fn make_up_db(&self) -> f32 {
        self.make_up_db
    }

    /// Output level for an input level, both in dB
    pub fn static_curve(&self, input_db: f32) -> f32 {
        let over = input_db - self.threshold_db;
        let knee = self.knee_db;
        if 2.0 * over < -knee {
            input_db
        } else if knee > 0.0 && 2.0 * over.abs() <= knee {
            let k = over + knee / 2.0;
            input_db + (1.0 / self.ratio - 1.0) * k * k / (2.0 * knee)
        } else {
            self.threshold_db + over / self.ratio
        }
    }

    /// Gain in dB (<= 0) to apply for a detector level
    fn next_gain_db(&mut self, level: f32) -> f32 {
        let input_db = linear_to_db(level);
        let target = self.static_curve(input_db) - input_db;
        let coeff = if target < self.envelope_db {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope_db = coeff * self.envelope_db + (1.0 - coeff) * target;
        self.envelope_db
    }

    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        if self.ratio <= 1.0 {
            return;
        }
        let mut max_reduction: f32 = 0.0;
        for (l, r) in buffer.left.iter_mut().zip(buffer.right.iter_mut()) {
            let gain_db = self.next_gain_db(l.abs().max(r.abs()));
            max_reduction = max_reduction.min(gain_db);
            let gain = db_to_linear(gain_db + self.make_up_db);
            *l *= gain;
            *r *= gain;
        }
        debug!(
            "Compressor: max gain reduction {:.1} dB, make-up {:.1} dB",
            max_reduction, self.make_up_db
        );
    }
}

/// Exponentially decaying white noise, one vector per channel.
///
/// Drawn fresh from `rng` on every call.
pub fn generate_impulse<R: Rng>(
    rng: &mut R,
    sample_rate: u32,
    config: &ReverbConfig,
) -> [Vec<f32>; 2] {
    let length = ((sample_rate as f32 * config.impulse_sec) as usize).max(1);
    let decay = length as f32 * config.decay_fraction;

    let channel = |rng: &mut R| -> Vec<f32> {
        (0..length)
            .map(|i| rng.gen_range(-1.0f32..1.0) * (-(i as f32) / decay).exp())
            .collect()
    };
    let left = channel(rng);
    let right = channel(rng);
    let mut impulse = [left, right];

    if config.normalize {
        normalize_impulse(&mut impulse);
    }
    impulse
}

/// Scale an impulse so its RMS power maps to a fixed calibration gain
pub fn normalize_impulse(impulse: &mut [Vec<f32>; 2]) {
    let count: usize = impulse.iter().map(Vec::len).sum();
    if count == 0 {
        return;
    }
    let energy: f32 = impulse.iter().flatten().map(|x| x * x).sum();
    let power = (energy / count as f32).sqrt().max(MIN_IMPULSE_POWER);
    let scale = IMPULSE_GAIN_CALIBRATION / power;
    for sample in impulse.iter_mut().flatten() {
        *sample *= scale;
    }
}

/// Linear convolution of `signal` with `ir` by FFT overlap-add, truncated to
/// `signal.len()` samples
pub fn convolve(signal: &[f32], ir: &[f32], planner: &mut FftPlanner<f32>) -> Vec<f32> {
    let out_len = signal.len();
    let mut output = vec![0.0f32; out_len];
    if signal.is_empty() || ir.is_empty() {
        return output;
    }

    let block = ir.len().next_power_of_two();
    let fft_size = block * 2;
    let fft = planner.plan_fft_forward(fft_size);
    let ifft = planner.plan_fft_inverse(fft_size);
    let scale = 1.0 / fft_size as f32;

    let mut ir_spectrum: Vec<Complex32> = ir
        .iter()
        .map(|&x| Complex32::new(x, 0.0))
        .chain(std::iter::repeat(Complex32::new(0.0, 0.0)))
        .take(fft_size)
        .collect();
    fft.process(&mut ir_spectrum);

    let mut frame = vec![Complex32::new(0.0, 0.0); fft_size];
    for (block_index, chunk) in signal.chunks(block).enumerate() {
        if chunk.iter().all(|&x| x == 0.0) {
            continue;
        }
        for (i, slot) in frame.iter_mut().enumerate() {
            *slot = Complex32::new(chunk.get(i).copied().unwrap_or(0.0), 0.0);
        }
        fft.process(&mut frame);
        for (bin, h) in frame.iter_mut().zip(&ir_spectrum) {
            *bin *= *h;
        }
        ifft.process(&mut frame);

        let start = block_index * block;
        for (out, bin) in output[start..].iter_mut().zip(&frame) {
            *out += bin.re * scale;
        }
    }

    output
}

/// Convolve each channel with its own impulse channel
pub fn reverb(input: &StereoBuffer, impulse: &[Vec<f32>; 2]) -> StereoBuffer {
    let mut planner = FftPlanner::new();
    StereoBuffer {
        sample_rate: input.sample_rate,
        left: convolve(&input.left, &impulse[0], &mut planner),
        right: convolve(&input.right, &impulse[1], &mut planner),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_static_curve_regions() {
        let comp = Compressor::new(&CompressorConfig::default(), 4.0, 44100);
        // well below the knee: untouched
        assert!((comp.static_curve(-60.0) + 60.0).abs() < 1e-4);
        // well above the knee: T + over/R
        assert!((comp.static_curve(0.0) - (-24.0 + 24.0 / 4.0)).abs() < 1e-4);
        // continuous at the knee edges
        let upper = -24.0 + 15.0;
        let expected = -24.0 + 15.0 / 4.0;
        assert!((comp.static_curve(upper) - expected).abs() < 1e-3);
    }

    #[test]
    fn test_compressor_reduces_loud_signal() {
        let config = CompressorConfig {
            make_up_gain: false,
            ..CompressorConfig::default()
        };
        let mut comp = Compressor::new(&config, 8.0, 44100);
        let mut buffer = StereoBuffer::from_mono(44100, vec![0.9; 44100]);
        comp.process(&mut buffer);
        assert!(buffer.left[44099] < 0.3);
        assert!(buffer.left[44099] > 0.0);
    }

    #[test]
    fn test_make_up_gain_lifts_quiet_signal() {
        let comp = Compressor::new(&CompressorConfig::default(), 4.0, 44100);
        // curve(0 dB) = -18 dB at -24/30/4:1
        assert!((comp.make_up_db() - 10.8).abs() < 1e-3);

        let mut comp = Compressor::new(&CompressorConfig::default(), 4.0, 44100);
        let mut buffer = StereoBuffer::from_mono(44100, vec![0.01; 4410]);
        comp.process(&mut buffer);
        // -40 dB sits below the knee, so only make-up applies
        let expected = 0.01 * db_to_linear(10.8);
        assert!((buffer.left[4409] - expected).abs() < 1e-4);

        let mut bypassed = Compressor::new(&CompressorConfig::default(), 1.0, 44100);
        let mut buffer = StereoBuffer::from_mono(44100, vec![0.01; 16]);
        bypassed.process(&mut buffer);
        assert_eq!(buffer.left[15], 0.01);
    }

    #[test]
    fn test_convolve_with_unit_impulse_is_identity() {
        let mut planner = FftPlanner::new();
        let signal: Vec<f32> = (0..1000).map(|i| (i as f32 * 0.01).sin()).collect();
        let out = convolve(&signal, &[1.0], &mut planner);
        for (a, b) in signal.iter().zip(&out) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_convolve_delays_by_impulse_offset() {
        let mut planner = FftPlanner::new();
        let mut signal = vec![0.0; 64];
        signal[3] = 1.0;
        let mut ir = vec![0.0; 20];
        ir[10] = 0.5;
        let out = convolve(&signal, &ir, &mut planner);
        assert!((out[13] - 0.5).abs() < 1e-5);
        assert!(out[12].abs() < 1e-5);
    }

    #[test]
    fn test_impulse_shape_and_normalization() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = ReverbConfig {
            normalize: false,
            ..ReverbConfig::default()
        };
        let impulse = generate_impulse(&mut rng, 44100, &config);
        assert_eq!(impulse[0].len(), 88200);
        assert!(impulse.iter().flatten().all(|x| x.abs() < 1.0));
        // decays: tail quieter than head
        let head: f32 = impulse[0][..4410].iter().map(|x| x.abs()).sum();
        let tail: f32 = impulse[0][83790..].iter().map(|x| x.abs()).sum();
        assert!(tail < head * 0.1);

        let mut normalized = impulse.clone();
        normalize_impulse(&mut normalized);
        let count = (normalized[0].len() * 2) as f32;
        let energy: f32 = normalized.iter().flatten().map(|x| x * x).sum();
        assert!(((energy / count).sqrt() - IMPULSE_GAIN_CALIBRATION).abs() < 1e-5);
    }
}

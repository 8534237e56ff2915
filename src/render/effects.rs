//! Shared effects bus: wave-shaper distortion in parallel with a filtered feedback delay

use super::track::coefficients;
use crate::audio::{db_to_linear, StereoBuffer};
use crate::config::EffectsConfig;
use crate::error::Result;
use biquad::{Biquad, DirectForm2Transposed};
use std::f32::consts::PI;
use tracing::debug;

/// Distortion transfer curve sampled over x in [-1, 1]
pub fn distortion_curve(k: f32, samples: usize) -> Vec<f32> {
    let deg = PI / 180.0;
    (0..samples)
        .map(|i| {
            let x = i as f32 * 2.0 / samples as f32 - 1.0;
            (3.0 + k) * x * 20.0 * deg / (PI + k * x.abs())
        })
        .collect()
}

/// Look `x` up in `curve`, interpolating linearly between neighbours and
/// holding the end values outside [-1, 1]
pub fn shape(curve: &[f32], x: f32) -> f32 {
    let n = curve.len();
    if n == 0 {
        return x;
    }
    let v = (n - 1) as f32 * 0.5 * (x + 1.0);
    if v.is_nan() || v <= 0.0 {
        return curve[0];
    }
    if v >= (n - 1) as f32 {
        return curve[n - 1];
    }
    let k = v.floor() as usize;
    let f = v - k as f32;
    (1.0 - f) * curve[k] + f * curve[k + 1]
}

/// Single-channel delay line whose output is fed back through gain and a resonant low-pass
pub struct FeedbackDelay {
    ring: Vec<f32>,
    pos: usize,
    feedback: f32,
    filter: DirectForm2Transposed<f32>,
}

impl FeedbackDelay {
    pub fn new(
        delay_samples: usize,
        feedback: f32,
        filter: DirectForm2Transposed<f32>,
    ) -> Self {
        Self {
            ring: vec![0.0; delay_samples.max(1)],
            pos: 0,
            feedback,
            filter,
        }
    }

    pub fn run(&mut self, input: f32) -> f32 {
        let out = self.ring[self.pos];
        let fed_back = self.filter.run(out * self.feedback);
        self.ring[self.pos] = input + fed_back;
        self.pos = (self.pos + 1) % self.ring.len();
        out
    }
}

/// Process one track's summed raw sources through the bus.
///
/// Returns `(distortion(x) + delay(x)) * amount`, ready to join the track
/// strip ahead of its volume. The caller skips the bus entirely when `amount`
/// is zero.
pub fn process_bus(
    input: &StereoBuffer,
    amount: f32,
    config: &EffectsConfig,
) -> Result<StereoBuffer> {
    let sample_rate = input.sample_rate;
    let curve = distortion_curve(config.distortion_k_scale * amount, config.curve_samples);

    let delay_sec = (config.delay_time_scale * amount).min(config.max_delay_sec);
    let delay_samples = ((delay_sec * sample_rate as f32).round() as usize).max(1);
    let feedback = config.feedback_scale * amount;
    let cutoff = config.filter_base_hz + config.filter_hz_scale * amount;
    // Resonance is given in dB, as a Web Audio low-pass takes it
    let q = db_to_linear(config.filter_base_q + config.filter_q_scale * amount);
    let filter_coeffs = coefficients(biquad::Type::LowPass, sample_rate, cutoff, q)?;

    debug!(
        "Effects bus: amount={:.2} delay={} samples feedback={:.2} filter={:.0}Hz q={:.2}",
        amount, delay_samples, feedback, cutoff, q
    );

    let mut out = StereoBuffer::silent(sample_rate, input.frames());
    for (source, dest) in [
        (&input.left, &mut out.left),
        (&input.right, &mut out.right),
    ] {
        let mut delay = FeedbackDelay::new(
            delay_samples,
            feedback,
            DirectForm2Transposed::<f32>::new(filter_coeffs),
        );
        for (y, &x) in dest.iter_mut().zip(source.iter()) {
            *y = (shape(&curve, x) + delay.run(x)) * amount;
        }
    }
    Ok(out)
}

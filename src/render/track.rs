//! Per-track channel strip: 3-band EQ, stereo panner, output gain

use crate::audio::StereoBuffer;
use crate::config::EqConfig;
use crate::error::{MixError, Result};
use crate::settings::TrackSettings;
use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Q_BUTTERWORTH_F32};
use std::f32::consts::PI;

/// Build biquad coefficients, mapping parameter errors into the render error
pub(crate) fn coefficients(
    filter: biquad::Type<f32>,
    sample_rate: u32,
    f0_hz: f32,
    q: f32,
) -> Result<Coefficients<f32>> {
    Coefficients::<f32>::from_params(filter, (sample_rate as f32).hz(), f0_hz.hz(), q).map_err(
        |e| {
            MixError::RenderEngine(format!(
                "invalid filter at {} Hz (q {}, {} Hz sample rate): {:?}",
                f0_hz, q, sample_rate, e
            ))
        },
    )
}

/// Low shelf -> peaking -> high shelf, one cascade per channel
pub struct ThreeBandEq {
    left: [DirectForm2Transposed<f32>; 3],
    right: [DirectForm2Transposed<f32>; 3],
    flat: bool,
}

impl ThreeBandEq {
    pub fn new(settings: &TrackSettings, config: &EqConfig, sample_rate: u32) -> Result<Self> {
        // Shelves at Q = 1/sqrt(2) match a unit shelf slope
        let low = coefficients(
            biquad::Type::LowShelf(settings.eq_low),
            sample_rate,
            config.low_shelf_hz,
            Q_BUTTERWORTH_F32,
        )?;
        let mid = coefficients(
            biquad::Type::PeakingEQ(settings.eq_mid),
            sample_rate,
            config.mid_peak_hz,
            config.mid_q,
        )?;
        let high = coefficients(
            biquad::Type::HighShelf(settings.eq_high),
            sample_rate,
            config.high_shelf_hz,
            Q_BUTTERWORTH_F32,
        )?;

        let cascade = || {
            [
                DirectForm2Transposed::<f32>::new(low),
                DirectForm2Transposed::<f32>::new(mid),
                DirectForm2Transposed::<f32>::new(high),
            ]
        };

        Ok(Self {
            left: cascade(),
            right: cascade(),
            flat: settings.eq_low == 0.0 && settings.eq_mid == 0.0 && settings.eq_high == 0.0,
        })
    }

    /// All bands at 0 dB
    pub fn is_flat(&self) -> bool {
        self.flat
    }

    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        if self.flat {
            return;
        }
        for (channel, filters) in [
            (&mut buffer.left, &mut self.left),
            (&mut buffer.right, &mut self.right),
        ] {
            for sample in channel.iter_mut() {
                *sample = filters
                    .iter_mut()
                    .fold(*sample, |x, filter| filter.run(x));
            }
        }
    }
}

/// Equal-power stereo panner for stereo input.
///
/// Negative pan folds part of the right channel into the left, positive pan the
/// reverse; centre is a pass-through.
pub fn stereo_pan(buffer: &mut StereoBuffer, pan: f32) {
    let pan = pan.clamp(-1.0, 1.0);
    if pan == 0.0 {
        return;
    }

    if pan < 0.0 {
        let angle = (pan + 1.0) * PI / 2.0;
        let (gain_l, gain_r) = (angle.cos(), angle.sin());
        for (l, r) in buffer.left.iter_mut().zip(buffer.right.iter_mut()) {
            let (in_l, in_r) = (*l, *r);
            *l = in_l + in_r * gain_l;
            *r = in_r * gain_r;
        }
    } else {
        let angle = pan * PI / 2.0;
        let (gain_l, gain_r) = (angle.cos(), angle.sin());
        for (l, r) in buffer.left.iter_mut().zip(buffer.right.iter_mut()) {
            let (in_l, in_r) = (*l, *r);
            *l = in_l * gain_l;
            *r = in_r + in_l * gain_r;
        }
    }
}

pub fn apply_gain(buffer: &mut StereoBuffer, gain: f32) {
    if gain == 1.0 {
        return;
    }
    for sample in buffer.left.iter_mut().chain(buffer.right.iter_mut()) {
        *sample *= gain;
    }
}

/// Run the whole strip over an already summed track: EQ, then pan, then volume.
///
/// `effects_return` joins after the pan so it shares the track's volume stage.
pub fn process_track(
    buffer: &mut StereoBuffer,
    effects_return: Option<&StereoBuffer>,
    settings: &TrackSettings,
    config: &EqConfig,
) -> Result<()> {
    let mut eq = ThreeBandEq::new(settings, config, buffer.sample_rate)?;
    eq.process(buffer);
    stereo_pan(buffer, settings.pan);
    if let Some(ret) = effects_return {
        buffer.mix_in(ret, 0, 1.0);
    }
    apply_gain(buffer, settings.volume);
    Ok(())
}

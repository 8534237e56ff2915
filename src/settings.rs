//! Typed per-track and master mix settings

use crate::error::{MixError, Result};
use crate::patterns::BeatStyle;
use serde::{Deserialize, Serialize};

/// Per-recording channel strip settings, rebuilt for every mix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackSettings {
    /// 0.0 to 1.0
    pub volume: f32,
    /// -1.0 (left) to 1.0 (right)
    pub pan: f32,
    /// Band gains in dB, roughly -12 to +12
    pub eq_low: f32,
    pub eq_mid: f32,
    pub eq_high: f32,
    pub quantize: bool,
}

impl Default for TrackSettings {
    fn default() -> Self {
        Self {
            volume: 0.8,
            pan: 0.0,
            eq_low: 0.0,
            eq_mid: 0.0,
            eq_high: 0.0,
            quantize: false,
        }
    }
}

impl TrackSettings {
    /// Build from mixer slider positions (percent volume/pan, whole dB EQ)
    pub fn from_controls(
        volume_pct: i32,
        pan_pct: i32,
        eq_low_db: i32,
        eq_mid_db: i32,
        eq_high_db: i32,
        quantize: bool,
    ) -> Self {
        Self {
            volume: volume_pct as f32 / 100.0,
            pan: pan_pct as f32 / 100.0,
            eq_low: eq_low_db as f32,
            eq_mid: eq_mid_db as f32,
            eq_high: eq_high_db as f32,
            quantize,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_range("track volume", self.volume, 0.0, 1.0)?;
        check_range("track pan", self.pan, -1.0, 1.0)?;
        check_range("track eq_low", self.eq_low, -24.0, 24.0)?;
        check_range("track eq_mid", self.eq_mid, -24.0, 24.0)?;
        check_range("track eq_high", self.eq_high, -24.0, 24.0)?;
        Ok(())
    }
}

/// Master bus settings, one per mix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterSettings {
    pub volume: f32,
    /// 1.0 to 20.0
    pub compression_ratio: f32,
    /// Wet share of the reverb, 0.0 to 1.0
    pub reverb_mix: f32,
    /// Distortion + delay send amount, 0.0 disables the bus
    pub effects_amount: f32,
}

impl Default for MasterSettings {
    fn default() -> Self {
        Self {
            volume: 0.8,
            compression_ratio: 4.0,
            reverb_mix: 0.2,
            effects_amount: 0.2,
        }
    }
}

impl MasterSettings {
    /// Build from master slider positions
    pub fn from_controls(
        volume_pct: i32,
        compression_ratio: i32,
        reverb_pct: i32,
        effects_pct: i32,
    ) -> Self {
        Self {
            volume: volume_pct as f32 / 100.0,
            compression_ratio: compression_ratio as f32,
            reverb_mix: reverb_pct as f32 / 100.0,
            effects_amount: effects_pct as f32 / 100.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_range("master volume", self.volume, 0.0, 1.0)?;
        check_range("compression ratio", self.compression_ratio, 1.0, 20.0)?;
        check_range("reverb mix", self.reverb_mix, 0.0, 1.0)?;
        check_range("effects amount", self.effects_amount, 0.0, 1.0)?;
        Ok(())
    }
}

/// Backing beat request from the mixer
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatOptions {
    pub enabled: bool,
    pub style: BeatStyle,
    /// Add timing/velocity variations to the generated beat
    pub humanize: bool,
}

fn check_range(name: &str, value: f32, min: f32, max: f32) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(MixError::InvalidSetting(format!(
            "{} = {} outside [{}, {}]",
            name, value, min, max
        )))
    }
}

//! Configuration system for the mixdown engine

use crate::error::{MixError, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub tempo: TempoConfig,
    pub render: RenderConfig,
    pub eq: EqConfig,
    pub compressor: CompressorConfig,
    pub reverb: ReverbConfig,
    pub effects: EffectsConfig,
    pub backing_beat: BackingBeatConfig,
    pub humanize: HumanizeConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            tempo: TempoConfig::default(),
            render: RenderConfig::default(),
            eq: EqConfig::default(),
            compressor: CompressorConfig::default(),
            reverb: ReverbConfig::default(),
            effects: EffectsConfig::default(),
            backing_beat: BackingBeatConfig::default(),
            humanize: HumanizeConfig::default(),
        }
    }
}

/// Tempo defaults and recommended range
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TempoConfig {
    pub default_bpm: f64,
    pub min_bpm: f64,
    pub max_bpm: f64,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            default_bpm: 120.0,
            min_bpm: 60.0,
            max_bpm: 200.0,
        }
    }
}

/// Offline render target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub sample_rate: u32,
    /// Silence appended after the last note
    pub tail_ms: f64,
    /// Shortest mix ever rendered
    pub min_duration_ms: f64,
    /// Duration assumed for notes that carry none
    pub default_note_ms: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            tail_ms: 5000.0,
            min_duration_ms: 10000.0,
            default_note_ms: 500.0,
        }
    }
}

/// Per-track 3-band EQ corner frequencies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EqConfig {
    pub low_shelf_hz: f32,
    pub mid_peak_hz: f32,
    pub mid_q: f32,
    pub high_shelf_hz: f32,
}

impl Default for EqConfig {
    fn default() -> Self {
        Self {
            low_shelf_hz: 320.0,
            mid_peak_hz: 1000.0,
            mid_q: 1.0,
            high_shelf_hz: 3200.0,
        }
    }
}

/// Master bus compressor; ratio comes from the master settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorConfig {
    pub threshold_db: f32,
    pub knee_db: f32,
    pub attack_sec: f32,
    pub release_sec: f32,
    /// Automatic make-up gain of `(1 / full_range_gain)^0.6`, as a browser
    /// dynamics compressor applies. Off leaves the mix about 10.8 dB quieter
    /// at the default threshold, knee and a 4:1 ratio.
    pub make_up_gain: bool,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            threshold_db: -24.0,
            knee_db: 30.0,
            attack_sec: 0.003,
            release_sec: 0.25,
            make_up_gain: true,
        }
    }
}

/// Procedural convolution reverb
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbConfig {
    pub impulse_sec: f32,
    /// Decay constant as a fraction of the impulse length
    pub decay_fraction: f32,
    /// Apply convolver-style power normalization to the impulse
    pub normalize: bool,
}

impl Default for ReverbConfig {
    fn default() -> Self {
        Self {
            impulse_sec: 2.0,
            decay_fraction: 0.3,
            normalize: true,
        }
    }
}

/// Shared distortion + feedback delay bus, all values scaled by the effects amount
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    pub curve_samples: usize,
    pub distortion_k_scale: f32,
    pub max_delay_sec: f32,
    pub delay_time_scale: f32,
    pub feedback_scale: f32,
    pub filter_base_hz: f32,
    pub filter_hz_scale: f32,
    pub filter_base_q: f32,
    pub filter_q_scale: f32,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            curve_samples: 44100,
            distortion_k_scale: 50.0,
            max_delay_sec: 5.0,
            delay_time_scale: 0.3,
            feedback_scale: 0.4,
            filter_base_hz: 1000.0,
            filter_hz_scale: 2000.0,
            filter_base_q: 1.0,
            filter_q_scale: 5.0,
        }
    }
}

/// Generated backing beat track settings and adaptation factors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackingBeatConfig {
    pub volume: f32,
    pub pan: f32,
    pub eq_low: f32,
    pub eq_mid: f32,
    pub eq_high: f32,
    /// Applied when the user already recorded drums
    pub layering_factor: f32,
    /// Applied to kick/snare when piano dominates
    pub piano_emphasis: f32,
}

impl Default for BackingBeatConfig {
    fn default() -> Self {
        Self {
            volume: 0.6,
            pan: 0.0,
            eq_low: 2.0,
            eq_mid: 0.0,
            eq_high: 1.0,
            layering_factor: 0.6,
            piano_emphasis: 1.2,
        }
    }
}

/// Humanization jitter bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HumanizeConfig {
    /// Timing jitter as a fraction of one sixteenth note, each direction
    pub timing_fraction: f64,
    pub velocity_jitter: f32,
    pub velocity_floor: f32,
    pub velocity_ceiling: f32,
}

impl Default for HumanizeConfig {
    fn default() -> Self {
        Self {
            timing_fraction: 0.5,
            velocity_jitter: 0.1,
            velocity_floor: 0.2,
            velocity_ceiling: 1.0,
        }
    }
}

/// Validate configuration parameters
pub fn validate_config(config: &Config) -> Result<()> {
    let tempo = &config.tempo;
    if !(tempo.min_bpm > 0.0 && tempo.min_bpm < tempo.max_bpm) {
        return Err(MixError::ConfigValidation(
            "tempo min_bpm must be > 0 and < max_bpm".to_string(),
        ));
    }
    if tempo.default_bpm < tempo.min_bpm || tempo.default_bpm > tempo.max_bpm {
        return Err(MixError::ConfigValidation(format!(
            "default_bpm {} outside [{}, {}]",
            tempo.default_bpm, tempo.min_bpm, tempo.max_bpm
        )));
    }

    let render = &config.render;
    if render.sample_rate < 8000 {
        return Err(MixError::ConfigValidation(format!(
            "unsupported sample rate {} Hz",
            render.sample_rate
        )));
    }
    if render.tail_ms < 0.0 || render.min_duration_ms <= 0.0 || render.default_note_ms <= 0.0 {
        return Err(MixError::ConfigValidation(
            "render durations must be positive".to_string(),
        ));
    }

    let nyquist = render.sample_rate as f32 / 2.0;
    for (name, hz) in [
        ("low_shelf_hz", config.eq.low_shelf_hz),
        ("mid_peak_hz", config.eq.mid_peak_hz),
        ("high_shelf_hz", config.eq.high_shelf_hz),
    ] {
        if hz <= 0.0 || hz >= nyquist {
            return Err(MixError::ConfigValidation(format!(
                "eq {} = {} must be within (0, {})",
                name, hz, nyquist
            )));
        }
    }

    if config.compressor.attack_sec <= 0.0 || config.compressor.release_sec <= 0.0 {
        return Err(MixError::ConfigValidation(
            "compressor attack/release must be positive".to_string(),
        ));
    }

    if config.reverb.impulse_sec <= 0.0 || config.reverb.decay_fraction <= 0.0 {
        return Err(MixError::ConfigValidation(
            "reverb impulse length and decay must be positive".to_string(),
        ));
    }

    let effects = &config.effects;
    if effects.curve_samples < 2 {
        return Err(MixError::ConfigValidation(
            "distortion curve needs at least 2 samples".to_string(),
        ));
    }
    if effects.delay_time_scale > effects.max_delay_sec {
        return Err(MixError::ConfigValidation(
            "delay_time_scale exceeds max_delay_sec".to_string(),
        ));
    }

    let humanize = &config.humanize;
    if humanize.velocity_floor > humanize.velocity_ceiling {
        return Err(MixError::ConfigValidation(
            "humanize velocity_floor must be <= velocity_ceiling".to_string(),
        ));
    }

    Ok(())
}

/// Load configuration from JSON file
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Save configuration to JSON file
pub fn save_config<P: AsRef<std::path::Path>>(config: &Config, path: P) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

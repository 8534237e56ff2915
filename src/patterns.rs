//! Procedural backing-beat patterns
//!
//! Each style is a hand-designed one-measure template (4 beats) repeated over the
//! requested number of measures. Output is fully deterministic.

use crate::error::MixError;
use crate::event::{Event, Instrument};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const KICK: &str = "kick";
pub const SNARE: &str = "snare";
pub const HIHAT_CLOSED: &str = "hihat-closed";
pub const HIHAT_OPEN: &str = "hihat-open";
pub const CRASH: &str = "crash";
pub const TOM1: &str = "tom1";
pub const TOM2: &str = "tom2";

/// Rhythm style of the generated beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeatStyle {
    #[default]
    Basic,
    HipHop,
    Electronic,
    Afrobeat,
}

impl BeatStyle {
    pub const ALL: [BeatStyle; 4] = [
        BeatStyle::Basic,
        BeatStyle::HipHop,
        BeatStyle::Electronic,
        BeatStyle::Afrobeat,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BeatStyle::Basic => "basic",
            BeatStyle::HipHop => "hiphop",
            BeatStyle::Electronic => "electronic",
            BeatStyle::Afrobeat => "afrobeat",
        }
    }
}

impl fmt::Display for BeatStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BeatStyle {
    type Err = MixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BeatStyle::ALL
            .into_iter()
            .find(|style| style.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| MixError::InvalidSetting(format!("unknown beat style '{}'", s)))
    }
}

/// Velocity scaling applied uniformly to a generated pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intensity {
    Normal,
    /// Quieter beat for layering under existing drums
    Subtle,
}

impl Intensity {
    pub fn multiplier(&self) -> f32 {
        match self {
            Intensity::Normal => 1.0,
            Intensity::Subtle => 0.7,
        }
    }
}

/// Collects hits for one pattern, all relative to the current measure start
struct PatternBuilder {
    beat_ms: f64,
    velocity_scale: f32,
    measure_start: f64,
    events: Vec<Event>,
}

impl PatternBuilder {
    fn new(beat_ms: f64, intensity: Intensity) -> Self {
        Self {
            beat_ms,
            velocity_scale: intensity.multiplier(),
            measure_start: 0.0,
            events: Vec::new(),
        }
    }

    fn start_measure(&mut self, measure: u32) {
        self.measure_start = measure as f64 * self.beat_ms * 4.0;
    }

    /// `beat` is zero-based within the measure (0.0 = beat 1, 1.5 = the "and" of 2)
    fn hit(&mut self, note: &str, beat: f64, duration_ms: f64, velocity: f32) {
        let event = Event::new(
            Instrument::Drums,
            note,
            self.measure_start + self.beat_ms * beat,
        )
        .with_duration(duration_ms)
        .with_velocity(velocity * self.velocity_scale);
        self.events.push(event);
    }
}

/// Generate `measures` measures of `style` at the given beat length
pub fn generate(style: BeatStyle, beat_ms: f64, measures: u32, intensity: Intensity) -> Vec<Event> {
    let mut p = PatternBuilder::new(beat_ms, intensity);

    for measure in 0..measures {
        p.start_measure(measure);
        match style {
            BeatStyle::Basic => basic_measure(&mut p),
            BeatStyle::HipHop => hiphop_measure(&mut p, measure),
            BeatStyle::Electronic => electronic_measure(&mut p),
            BeatStyle::Afrobeat => afrobeat_measure(&mut p, measure),
        }
    }

    p.events
}

fn basic_measure(p: &mut PatternBuilder) {
    p.hit(KICK, 0.0, 150.0, 0.8);
    p.hit(KICK, 2.0, 150.0, 0.8);
    p.hit(SNARE, 1.0, 150.0, 0.7);
    p.hit(SNARE, 3.0, 150.0, 0.7);
    for i in 0..8 {
        p.hit(HIHAT_CLOSED, i as f64 / 2.0, 100.0, 0.6);
    }
}

fn hiphop_measure(p: &mut PatternBuilder, measure: u32) {
    p.hit(KICK, 0.0, 150.0, 0.9);
    p.hit(KICK, 2.5, 150.0, 0.8);
    if measure % 2 == 1 {
        p.hit(KICK, 1.5, 150.0, 0.7);
    }
    p.hit(SNARE, 1.0, 150.0, 0.8);
    p.hit(SNARE, 3.0, 150.0, 0.8);
    for i in 0..16 {
        let velocity = if i % 4 == 0 { 0.7 } else { 0.5 };
        p.hit(HIHAT_CLOSED, i as f64 / 4.0, 80.0, velocity);
    }
    if measure % 8 == 0 {
        p.hit(CRASH, 0.0, 300.0, 0.6);
    }
}

fn electronic_measure(p: &mut PatternBuilder) {
    for beat in 0..4 {
        p.hit(KICK, beat as f64, 150.0, 0.9);
    }
    p.hit(SNARE, 1.0, 150.0, 0.7);
    p.hit(SNARE, 3.0, 150.0, 0.7);
    for i in 0..16 {
        let velocity = match i {
            i if i % 4 == 0 => 0.8,
            i if i % 2 == 0 => 0.6,
            _ => 0.5,
        };
        p.hit(HIHAT_CLOSED, i as f64 / 4.0, 60.0, velocity);
    }
    // open hats on the offbeat eighths
    for i in (1..8).step_by(2) {
        p.hit(HIHAT_OPEN, i as f64 / 2.0, 120.0, 0.5);
    }
}

fn afrobeat_measure(p: &mut PatternBuilder, measure: u32) {
    p.hit(KICK, 0.0, 150.0, 0.9);
    p.hit(KICK, 1.5, 150.0, 0.8);
    p.hit(KICK, 3.0, 150.0, 0.85);
    p.hit(SNARE, 1.0, 150.0, 0.8);
    p.hit(SNARE, 3.0, 150.0, 0.8);
    for i in 0..8 {
        let velocity = if i % 2 == 0 { 0.7 } else { 0.5 };
        p.hit(HIHAT_CLOSED, i as f64 / 2.0, 100.0, velocity);
    }
    // tom fill closing each 4-measure phrase
    if measure % 4 == 3 {
        p.hit(TOM1, 2.0, 150.0, 0.7);
        p.hit(TOM1, 2.5, 150.0, 0.75);
        p.hit(TOM2, 2.75, 150.0, 0.8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_names_round_trip() {
        for style in BeatStyle::ALL {
            assert_eq!(style.name().parse::<BeatStyle>().unwrap(), style);
        }
        assert!("polka".parse::<BeatStyle>().is_err());
    }

    #[test]
    fn test_subtle_scales_velocity() {
        let normal = generate(BeatStyle::Basic, 500.0, 1, Intensity::Normal);
        let subtle = generate(BeatStyle::Basic, 500.0, 1, Intensity::Subtle);
        for (n, s) in normal.iter().zip(&subtle) {
            assert!((s.velocity - n.velocity * 0.7).abs() < 1e-6);
        }
    }
}

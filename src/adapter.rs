//! Backing-beat adaptation to the recorded material

use crate::config::BackingBeatConfig;
use crate::event::{Event, Instrument, Recording};
use crate::patterns::{self, BeatStyle, Intensity, KICK, SNARE};
use crate::quantize::beat_ms;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Which instrument carries most of the recorded notes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DominantInstrument {
    Drums,
    Piano,
    Balanced,
    None,
}

/// Recorded notes per beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    Low,
    Medium,
    High,
}

/// Analysis of the current recordings, recomputed for every mix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatInfo {
    pub has_drums: bool,
    pub has_piano: bool,
    pub dominant_instrument: DominantInstrument,
    pub density: Density,
    /// Multiple of 4, at least 4
    pub measures: u32,
    pub duration_ms: f64,
    /// Percussion hits per note key
    pub hit_counts: BTreeMap<String, usize>,
}

impl BeatInfo {
    /// Hits recorded for one note key
    pub fn hits(&self, note: &str) -> usize {
        self.hit_counts.get(note).copied().unwrap_or(0)
    }

    /// All hi-hat variants together
    pub fn hihat_hits(&self) -> usize {
        self.hit_counts
            .iter()
            .filter(|(note, _)| note.contains("hihat"))
            .map(|(_, count)| count)
            .sum()
    }
}

/// Inspect non-mixed recordings to decide how the backing beat should sit
pub fn analyze(recordings: &[Recording], bpm: f64) -> BeatInfo {
    let mut hit_counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut has_drums = false;
    let mut has_piano = false;
    let mut drum_notes = 0usize;
    let mut piano_notes = 0usize;
    let mut total_notes = 0usize;
    let mut max_time: f64 = 0.0;

    for recording in recordings.iter().filter(|r| !r.is_mixed()) {
        if recording.notes.is_empty() {
            continue;
        }

        if recording.instrument.is_percussive() {
            has_drums = true;
            drum_notes += recording.notes.len();
            for note in &recording.notes {
                *hit_counts.entry(note.note.clone()).or_insert(0) += 1;
            }
        } else if recording.instrument == Instrument::Piano {
            has_piano = true;
            piano_notes += recording.notes.len();
        }

        total_notes += recording.notes.len();
        max_time = recording
            .notes
            .iter()
            .fold(max_time, |acc, note| acc.max(note.time));
    }

    let dominant_instrument = if drum_notes == 0 && piano_notes == 0 {
        DominantInstrument::None
    } else if drum_notes > piano_notes {
        DominantInstrument::Drums
    } else if piano_notes > drum_notes {
        DominantInstrument::Piano
    } else {
        DominantInstrument::Balanced
    };

    let beat = beat_ms(bpm);
    let duration_in_beats = max_time / beat;

    // zero-length material: no meaningful rate, fall back to the defaults
    let (measures, density) = if duration_in_beats > 0.0 && duration_in_beats.is_finite() {
        let groups = (duration_in_beats / 4.0).ceil().min((u32::MAX / 4) as f64) as u32;
        let measures = groups.saturating_mul(4).max(4);
        let notes_per_beat = total_notes as f64 / duration_in_beats;
        let density = if notes_per_beat < 1.0 {
            Density::Low
        } else if notes_per_beat > 3.0 {
            Density::High
        } else {
            Density::Medium
        };
        (measures, density)
    } else {
        (4, Density::Medium)
    };

    let info = BeatInfo {
        has_drums,
        has_piano,
        dominant_instrument,
        density,
        measures,
        duration_ms: measures as f64 * 4.0 * beat,
        hit_counts,
    };
    debug!(
        "Beat analysis: dominant={:?} density={:?} measures={}",
        info.dominant_instrument, info.density, info.measures
    );
    info
}

/// Generate a beat covering `target_duration_ms`, tuned to the analysis.
///
/// Existing drums get a subtle, further attenuated beat; piano-dominated material
/// gets its kick and snare emphasised. Both adjustments stack.
pub fn create_adaptive_beat(
    info: &BeatInfo,
    style: BeatStyle,
    bpm: f64,
    target_duration_ms: f64,
    config: &BackingBeatConfig,
) -> Vec<Event> {
    let beat = beat_ms(bpm);
    let measures = ((target_duration_ms / (beat * 4.0)).ceil() as u32).max(4);
    let intensity = if info.has_drums {
        Intensity::Subtle
    } else {
        Intensity::Normal
    };

    let mut events = patterns::generate(style, beat, measures, intensity);

    if info.has_drums {
        for event in &mut events {
            event.velocity = (event.velocity * config.layering_factor).clamp(0.0, 1.0);
        }
    }

    if info.dominant_instrument == DominantInstrument::Piano {
        for event in events
            .iter_mut()
            .filter(|e| e.note == KICK || e.note == SNARE)
        {
            event.velocity = (event.velocity * config.piano_emphasis).clamp(0.0, 1.0);
        }
    }

    debug!(
        "Generated {} backing beat: {} measures, {} hits",
        style,
        measures,
        events.len()
    );
    events
}

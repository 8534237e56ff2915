//! Timed note events and recordings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Instrument a recording (and each of its events) belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Instrument {
    Drums,
    Piano,
    TalkingDrums,
    /// Output of a previous mixdown; carries audio, never notes
    Mixed,
}

impl Instrument {
    /// Percussive instruments get short one-shot defaults
    pub fn is_percussive(&self) -> bool {
        matches!(self, Instrument::Drums | Instrument::TalkingDrums)
    }

    /// Note duration used when the pad did not report one
    pub fn default_duration_ms(&self) -> f64 {
        if self.is_percussive() {
            150.0
        } else {
            500.0
        }
    }

    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Instrument::Drums => "drums",
            Instrument::Piano => "piano",
            Instrument::TalkingDrums => "talking-drums",
            Instrument::Mixed => "mixed",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn default_velocity() -> f32 {
    1.0
}

/// A single timed trigger of one sample-backed sound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "EventRecord")]
pub struct Event {
    pub instrument: Instrument,
    /// Sample lookup key (e.g. "kick", "C4")
    pub note: String,
    /// Offset from recording start in milliseconds
    pub time: f64,
    /// Milliseconds; `None` when the pad did not report one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default = "default_velocity")]
    pub velocity: f32,
    /// Set by the quantizer, informational only
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub quantized: bool,
}

/// Wire form of [`Event`]; converted through the constructors so loaded
/// events obey the same clamps as recorded ones
#[derive(Deserialize)]
struct EventRecord {
    instrument: Instrument,
    note: String,
    time: f64,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default = "default_velocity")]
    velocity: f32,
    #[serde(default)]
    quantized: bool,
}

impl From<EventRecord> for Event {
    fn from(record: EventRecord) -> Self {
        let time = if record.time.is_finite() { record.time } else { 0.0 };
        let mut event = Event::new(record.instrument, record.note, time)
            .with_velocity(record.velocity);
        event.duration = record.duration.filter(|d| d.is_finite() && *d > 0.0);
        event.quantized = record.quantized;
        event
    }
}

impl Event {
    /// Create an event at full velocity with no explicit duration
    pub fn new(instrument: Instrument, note: impl Into<String>, time: f64) -> Self {
        Self {
            instrument,
            note: note.into(),
            time: time.max(0.0),
            duration: None,
            velocity: 1.0,
            quantized: false,
        }
    }

    pub fn with_duration(mut self, duration_ms: f64) -> Self {
        self.duration = Some(duration_ms);
        self
    }

    /// Velocity is clamped into [0, 1]; NaN becomes silent
    pub fn with_velocity(mut self, velocity: f32) -> Self {
        self.velocity = if velocity.is_nan() {
            0.0
        } else {
            velocity.clamp(0.0, 1.0)
        };
        self
    }

    /// Duration, falling back to the instrument default
    pub fn effective_duration(&self) -> f64 {
        self.duration
            .unwrap_or_else(|| self.instrument.default_duration_ms())
    }

    /// Time at which this event stops sounding, using `fallback_ms` for missing durations
    pub fn end_time(&self, fallback_ms: f64) -> f64 {
        self.time + self.duration.unwrap_or(fallback_ms)
    }
}

/// One take from a record session, or a rendered mix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recording {
    pub instrument: Instrument,
    /// Insertion order, not necessarily sorted by time
    pub notes: Vec<Event>,
    /// Total length in milliseconds
    pub duration: f64,
    #[serde(default = "now")]
    pub timestamp: SystemTime,
    /// Encoded WAV bytes for mixed recordings
    #[serde(skip)]
    pub audio: Option<Arc<Vec<u8>>>,
}

fn now() -> SystemTime {
    SystemTime::now()
}

impl Recording {
    pub fn new(instrument: Instrument, notes: Vec<Event>, duration: f64) -> Self {
        Self {
            instrument,
            notes,
            duration,
            timestamp: SystemTime::now(),
            audio: None,
        }
    }

    /// A rendered mix: no note events, just the encoded payload
    pub fn mixed(duration: f64, audio: Arc<Vec<u8>>) -> Self {
        Self {
            instrument: Instrument::Mixed,
            notes: Vec::new(),
            duration,
            timestamp: SystemTime::now(),
            audio: Some(audio),
        }
    }

    pub fn is_mixed(&self) -> bool {
        self.instrument == Instrument::Mixed
    }

    /// Latest end time over all notes; 0 for an empty recording
    pub fn last_note_end(&self, fallback_ms: f64) -> f64 {
        // Latest-starting note decides, as the mixer measures it
        self.notes
            .iter()
            .fold(None::<&Event>, |latest, note| match latest {
                Some(l) if l.time >= note.time => Some(l),
                _ => Some(note),
            })
            .map(|note| note.end_time(fallback_ms))
            .unwrap_or(0.0)
    }

    /// Notes sorted by time, stable on ties
    pub fn sorted_notes(&self) -> Vec<Event> {
        let mut notes = self.notes.clone();
        notes.sort_by(|a, b| a.time.total_cmp(&b.time));
        notes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_defaults() {
        let drum = Event::new(Instrument::Drums, "kick", -5.0);
        assert_eq!(drum.time, 0.0);
        assert_eq!(drum.velocity, 1.0);
        assert_eq!(drum.effective_duration(), 150.0);

        let piano = Event::new(Instrument::Piano, "C4", 10.0).with_velocity(1.7);
        assert_eq!(piano.velocity, 1.0);
        assert_eq!(piano.effective_duration(), 500.0);
    }

    #[test]
    fn test_event_json_defaults() {
        let event: Event =
            serde_json::from_str(r#"{"instrument":"drums","note":"snare","time":250}"#).unwrap();
        assert_eq!(event.velocity, 1.0);
        assert_eq!(event.duration, None);
        assert!(!event.quantized);
    }

    #[test]
    fn test_loaded_events_are_clamped() {
        let event: Event = serde_json::from_str(
            r#"{"instrument":"drums","note":"kick","time":-20,"velocity":1.5,"duration":-3}"#,
        )
        .unwrap();
        assert_eq!(event.time, 0.0);
        assert_eq!(event.velocity, 1.0);
        assert_eq!(event.duration, None);

        let event: Event = serde_json::from_str(
            r#"{"instrument":"piano","note":"C4","time":120,"velocity":-0.4,"quantized":true}"#,
        )
        .unwrap();
        assert_eq!(event.velocity, 0.0);
        assert_eq!(event.time, 120.0);
        assert!(event.quantized);
    }

    #[test]
    fn test_last_note_end_uses_latest_start() {
        let rec = Recording::new(
            Instrument::Piano,
            vec![
                Event::new(Instrument::Piano, "C4", 100.0).with_duration(2000.0),
                Event::new(Instrument::Piano, "E4", 900.0),
            ],
            1000.0,
        );
        // latest start is E4 at 900, default 500 => 1400 (not 2100)
        assert_eq!(rec.last_note_end(500.0), 1400.0);
    }
}

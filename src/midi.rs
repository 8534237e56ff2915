//! Recording export: Standard MIDI File and JSON

use crate::error::{MixError, Result};
use crate::event::{Event, Instrument, Recording};
use crate::patterns::{CRASH, HIHAT_CLOSED, HIHAT_OPEN, KICK, SNARE, TOM1, TOM2};
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use tracing::{debug, warn};

/// Pulses per quarter note
const PPQ: u16 = 960;
const DRUM_CHANNEL: u8 = 9;
const PIANO_CHANNEL: u8 = 0;

/// General MIDI percussion key for a pad note
pub fn drum_key(note: &str) -> Option<u8> {
    match note {
        KICK => Some(36),
        SNARE => Some(38),
        HIHAT_CLOSED => Some(42),
        HIHAT_OPEN => Some(46),
        CRASH => Some(49),
        TOM1 => Some(48),
        TOM2 => Some(45),
        _ => None,
    }
}

/// MIDI key for a note name like "C4", "F#3" or "Bb5" (C4 = 60)
pub fn pitch_key(note: &str) -> Option<u8> {
    let mut chars = note.chars();
    let base: i32 = match chars.next()?.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let rest = chars.as_str();
    let (accidental, octave) = if let Some(o) = rest.strip_prefix('#') {
        (1, o)
    } else if let Some(o) = rest.strip_prefix('b') {
        (-1, o)
    } else {
        (0, rest)
    };
    let octave: i32 = octave.parse().ok()?;
    let key = (octave + 1) * 12 + base + accidental;
    u8::try_from(key).ok().filter(|&k| k <= 127)
}

/// Channel and key an event is exported on, or `None` when it has no MIDI mapping
pub fn event_key(event: &Event) -> Option<(u8, u8)> {
    match event.instrument {
        Instrument::Drums => drum_key(&event.note).map(|key| (DRUM_CHANNEL, key)),
        Instrument::TalkingDrums => {
            let key = drum_key(&event.note).unwrap_or(if event.note.contains("high") {
                50
            } else {
                47
            });
            Some((DRUM_CHANNEL, key))
        }
        Instrument::Piano => pitch_key(&event.note).map(|key| (PIANO_CHANNEL, key)),
        Instrument::Mixed => None,
    }
}

fn midi_velocity(velocity: f32) -> u8 {
    (velocity.clamp(0.0, 1.0) * 127.0).round().clamp(1.0, 127.0) as u8
}

fn ms_to_ticks(ms: f64, bpm: f64) -> u32 {
    (ms.max(0.0) / 60_000.0 * bpm * PPQ as f64).round() as u32
}

/// Convert a recording's notes into a single-track Standard MIDI File.
///
/// Drums go to channel 10 with GM percussion keys, piano to channel 1. Every
/// event gets a note-off after its effective duration.
pub fn export_recording_midi(recording: &Recording, bpm: f64) -> Result<Vec<u8>> {
    if recording.is_mixed() {
        return Err(MixError::MidiExport(
            "mixed recordings carry audio, not notes".to_string(),
        ));
    }
    if !(bpm.is_finite() && bpm > 0.0) {
        return Err(MixError::InvalidSetting(format!("bpm must be > 0, got {}", bpm)));
    }

    // (tick, is_note_on, channel, key, velocity); note-offs sort first on ties
    let mut messages: Vec<(u32, bool, u8, u8, u8)> = Vec::new();
    for event in recording.sorted_notes() {
        let Some((channel, key)) = event_key(&event) else {
            warn!("No MIDI mapping for {} note '{}', skipping", event.instrument, event.note);
            continue;
        };
        let on = ms_to_ticks(event.time, bpm);
        let off = ms_to_ticks(event.time + event.effective_duration(), bpm).max(on + 1);
        messages.push((on, true, channel, key, midi_velocity(event.velocity)));
        messages.push((off, false, channel, key, 0));
    }
    messages.sort_by_key(|&(tick, is_on, ..)| (tick, is_on));

    let tempo_uspq = (60_000_000.0 / bpm).round() as u32;
    let mut track = vec![
        TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(tempo_uspq))),
        },
        TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::TimeSignature(4, 2, 24, 8)),
        },
    ];

    let mut current_tick = 0u32;
    for &(tick, is_on, channel, key, vel) in &messages {
        let message = if is_on {
            MidiMessage::NoteOn {
                key: u7::from(key),
                vel: u7::from(vel),
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::from(key),
                vel: u7::from(0),
            }
        };
        track.push(TrackEvent {
            delta: u28::from(tick - current_tick),
            kind: TrackEventKind::Midi {
                channel: u4::from(channel),
                message,
            },
        });
        current_tick = tick;
    }

    track.push(TrackEvent {
        delta: u28::from(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header {
            format: Format::SingleTrack,
            timing: Timing::Metrical(u15::from(PPQ)),
        },
        tracks: vec![track],
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| MixError::MidiExport(format!("failed to write MIDI data: {:?}", e)))?;
    debug!(
        "Exported {} notes as {} MIDI bytes",
        messages.len() / 2,
        bytes.len()
    );
    Ok(bytes)
}

/// Pretty JSON of a recording; any audio payload is omitted
pub fn export_recording_json(recording: &Recording) -> Result<String> {
    Ok(serde_json::to_string_pretty(recording)?)
}

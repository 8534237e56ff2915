//! Snap event times onto a sixteenth-note grid

use crate::event::Event;
use tracing::debug;

/// Sixteenth-note length in milliseconds at `bpm`
pub fn sixteenth_ms(bpm: f64) -> f64 {
    60000.0 / bpm / 4.0
}

/// Quarter-note length in milliseconds at `bpm`
pub fn beat_ms(bpm: f64) -> f64 {
    60000.0 / bpm
}

/// Move every event to the nearest sixteenth-note grid line.
///
/// Halfway points round up. `bpm` must be positive; the input is left untouched and
/// new events are returned with `quantized` set.
pub fn quantize(events: &[Event], bpm: f64) -> Vec<Event> {
    let grid = sixteenth_ms(bpm);
    let mut max_drift_ms: f64 = 0.0;

    let quantized: Vec<Event> = events
        .iter()
        .map(|event| {
            let time = snap(event.time, grid);
            max_drift_ms = max_drift_ms.max((time - event.time).abs());
            Event {
                time,
                quantized: true,
                ..event.clone()
            }
        })
        .collect();

    debug!(
        "Quantized {} events to {:.2}ms grid, max drift {:.2}ms",
        quantized.len(),
        grid,
        max_drift_ms
    );
    quantized
}

fn snap(time: f64, grid: f64) -> f64 {
    let slots = (time / grid + 0.5).floor();
    (slots * grid).max(0.0)
}

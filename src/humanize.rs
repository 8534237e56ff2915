//! Bounded random timing/velocity variation for generated beats

use crate::config::HumanizeConfig;
use crate::event::Event;
use crate::quantize::sixteenth_ms;
use rand::Rng;

/// Jitter each event's time by up to half a sixteenth note and its velocity by up to
/// ±0.1 (defaults), keeping time ≥ 0 and velocity inside the configured floor/ceiling.
pub fn humanize<R: Rng>(
    events: &[Event],
    bpm: f64,
    config: &HumanizeConfig,
    rng: &mut R,
) -> Vec<Event> {
    let max_shift = sixteenth_ms(bpm) * config.timing_fraction;
    let max_velocity_shift = config.velocity_jitter;

    events
        .iter()
        .map(|event| {
            let time_jitter = if max_shift > 0.0 {
                rng.gen_range(-max_shift..=max_shift)
            } else {
                0.0
            };
            let velocity_jitter = if max_velocity_shift > 0.0 {
                rng.gen_range(-max_velocity_shift..=max_velocity_shift)
            } else {
                0.0
            };

            Event {
                time: (event.time + time_jitter).max(0.0),
                velocity: (event.velocity + velocity_jitter)
                    .clamp(config.velocity_floor, config.velocity_ceiling),
                ..event.clone()
            }
        })
        .collect()
}

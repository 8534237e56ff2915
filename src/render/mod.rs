//! Offline signal-graph renderer
//!
//! Every track's events are summed into a dry stereo buffer (velocity weighted)
//! and run through that track's channel strip. When the effects amount is
//! non-zero the raw sources also go through the distortion/delay bus, whose
//! return joins the strip ahead of the track volume. Tracks are summed into
//! the master bus, which applies volume, compression and reverb.

pub mod effects;
pub mod master;
pub mod track;

use crate::audio::StereoBuffer;
use crate::config::Config;
use crate::error::{MixError, Result};
use crate::mix_plan::MixPlan;
use crate::samples::{SampleCache, SampleResolver};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Cloneable flag for aborting a render from another thread
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Caller controls over a render
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl RenderOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Tracks elapsed time and cancellation for one render
struct Watchdog<'a> {
    started: Instant,
    options: &'a RenderOptions,
}

impl<'a> Watchdog<'a> {
    fn new(options: &'a RenderOptions) -> Self {
        Self {
            started: Instant::now(),
            options,
        }
    }

    fn check(&self) -> Result<()> {
        if self
            .options
            .cancel
            .as_ref()
            .is_some_and(CancelToken::is_cancelled)
        {
            return Err(MixError::Cancelled);
        }
        if let Some(timeout) = self.options.timeout {
            if self.started.elapsed() > timeout {
                return Err(MixError::TimedOut(timeout));
            }
        }
        Ok(())
    }
}

/// Rendered mix plus bookkeeping
#[derive(Debug, Clone)]
pub struct MixRender {
    pub buffer: StereoBuffer,
    /// Events that made it into the mix
    pub scheduled: usize,
    /// Events dropped because their sample could not be fetched or decoded
    pub skipped: usize,
}

/// Render a plan to a stereo buffer of exactly `plan.frame_count(sample_rate)` frames.
///
/// Sample failures skip the single event; cancellation, timeout and engine
/// errors abort with no output.
pub fn render<R: Rng>(
    plan: &MixPlan,
    resolver: &dyn SampleResolver,
    config: &Config,
    rng: &mut R,
    options: &RenderOptions,
) -> Result<MixRender> {
    let watchdog = Watchdog::new(options);
    watchdog.check()?;

    let sample_rate = config.render.sample_rate;
    let frames = plan.frame_count(sample_rate);
    let amount = plan.master.effects_amount;

    let mut cache = SampleCache::new(resolver, sample_rate);
    let mut master_input = StereoBuffer::silent(sample_rate, frames);
    let mut scheduled = 0usize;
    let mut skipped = 0usize;

    for (track_index, track) in plan.tracks.iter().enumerate() {
        let mut dry = StereoBuffer::silent(sample_rate, frames);
        let mut send = (amount > 0.0).then(|| StereoBuffer::silent(sample_rate, frames));

        for event in track.recording.sorted_notes() {
            watchdog.check()?;

            let sample = match cache.get(&event.note) {
                Ok(sample) => sample,
                Err(e) => {
                    warn!(
                        "Skipping {} '{}' at {:.0}ms: {}",
                        event.instrument, event.note, event.time, e
                    );
                    skipped += 1;
                    continue;
                }
            };

            let start = (event.time / 1000.0 * sample_rate as f64).round() as usize;
            dry.mix_in(&sample, start, event.velocity);
            if let Some(bus) = send.as_mut() {
                bus.mix_in(&sample, start, 1.0);
            }
            scheduled += 1;
        }

        watchdog.check()?;
        let effects_return = send
            .map(|bus| effects::process_bus(&bus, amount, &config.effects))
            .transpose()?;
        track::process_track(&mut dry, effects_return.as_ref(), &track.settings, &config.eq)?;
        master_input.mix_in(&dry, 0, 1.0);
        debug!(
            "Track {} ({}{}): {} events",
            track_index,
            track.recording.instrument,
            if track.is_generated() { ", backing beat" } else { "" },
            track.recording.notes.len()
        );
    }

    watchdog.check()?;
    let buffer = process_master(master_input, plan, config, rng, &watchdog)?;

    info!(
        "Rendered {} frames ({:.0}ms): {} events scheduled, {} skipped, {} samples decoded",
        buffer.frames(),
        buffer.duration_ms(),
        scheduled,
        skipped,
        cache.len()
    );

    Ok(MixRender {
        buffer,
        scheduled,
        skipped,
    })
}

/// Volume -> compressor -> dry/wet reverb split
fn process_master<R: Rng>(
    mut input: StereoBuffer,
    plan: &MixPlan,
    config: &Config,
    rng: &mut R,
    watchdog: &Watchdog<'_>,
) -> Result<StereoBuffer> {
    let settings = &plan.master;
    let sample_rate = input.sample_rate;

    track::apply_gain(&mut input, settings.volume);
    master::Compressor::new(&config.compressor, settings.compression_ratio, sample_rate)
        .process(&mut input);
    watchdog.check()?;

    let wet_share = settings.reverb_mix;
    if wet_share <= 0.0 {
        return Ok(input);
    }

    let impulse = master::generate_impulse(rng, sample_rate, &config.reverb);
    let mut wet = master::reverb(&input, &impulse);
    watchdog.check()?;

    track::apply_gain(&mut input, 1.0 - wet_share);
    track::apply_gain(&mut wet, wet_share);
    input.mix_in(&wet, 0, 1.0);
    Ok(input)
}

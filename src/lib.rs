//! Offline Mixdown and Beat Generation Engine
//!
//! Takes timed note-event recordings from a browser-style instrument studio,
//! optionally layers an adaptive backing beat under them and renders a stereo
//! 16-bit WAV mixdown through per-track EQ/pan/gain, a shared effects bus and a
//! compressed, reverberated master bus.

pub mod adapter;
pub mod audio;
pub mod config;
pub mod error;
pub mod event;
pub mod humanize;
pub mod midi;
pub mod mix_plan;
pub mod patterns;
pub mod quantize;
pub mod render;
pub mod samples;
pub mod settings;
pub mod studio;

pub use adapter::{BeatInfo, Density, DominantInstrument};
pub use audio::StereoBuffer;
pub use config::Config;
pub use error::{ErrorKind, MixError, Result};
pub use event::{Event, Instrument, Recording};
pub use mix_plan::{MixPlan, MixRequest};
pub use patterns::BeatStyle;
pub use render::{CancelToken, RenderOptions};
pub use samples::{DirectoryResolver, MemoryResolver, SampleResolver};
pub use settings::{BeatOptions, MasterSettings, TrackSettings};
pub use studio::Studio;

use rand::Rng;
use std::sync::Arc;
use tracing::info;

/// Result of one mixdown
#[derive(Debug, Clone)]
pub struct MixOutput {
    /// Encoded 16-bit stereo WAV
    pub wav: Arc<Vec<u8>>,
    pub frames: usize,
    pub duration_ms: f64,
    pub track_count: usize,
    pub scheduled_events: usize,
    pub skipped_events: usize,
    /// Analysis behind the backing beat, when one was added
    pub beat_info: Option<BeatInfo>,
    /// Index of the mixed recording when the mix was appended to a studio
    pub recording_index: Option<usize>,
}

/// Main processing pipeline for a mixdown
pub struct Mixdown {
    config: Config,
}

impl Mixdown {
    /// Create a new mixer with the given configuration
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Plan, render and encode a mix of `recordings`
    pub fn run<R: Rng>(
        &self,
        recordings: &[Recording],
        request: &MixRequest,
        resolver: &dyn SampleResolver,
        rng: &mut R,
        options: &RenderOptions,
    ) -> Result<MixOutput> {
        // Plan: filter, quantize, size, backing beat
        let plan = mix_plan::build_plan(recordings, request, &self.config, rng)?;

        // Render the signal graph
        let rendered = render::render(&plan, resolver, &self.config, rng, options)?;

        // Encode
        let wav = audio::encode_wav(&rendered.buffer)?;
        info!(
            "Mixdown complete: {} tracks, {} frames, {} bytes",
            plan.tracks.len(),
            rendered.buffer.frames(),
            wav.len()
        );

        Ok(MixOutput {
            wav: Arc::new(wav),
            frames: rendered.buffer.frames(),
            duration_ms: rendered.buffer.duration_ms(),
            track_count: plan.tracks.len(),
            scheduled_events: rendered.scheduled,
            skipped_events: rendered.skipped,
            beat_info: plan.beat_info,
            recording_index: None,
        })
    }
}

impl Default for Mixdown {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

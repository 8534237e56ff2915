//! Assemble the list of tracks a mixdown renders

use crate::adapter::{analyze, create_adaptive_beat, BeatInfo};
use crate::config::Config;
use crate::error::{MixError, Result};
use crate::event::{Instrument, Recording};
use crate::humanize::humanize;
use crate::quantize::quantize;
use crate::settings::{BeatOptions, MasterSettings, TrackSettings};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Everything the mixer UI hands over for one mixdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixRequest {
    pub bpm: f64,
    /// Keyed by index into the recordings collection
    pub track_settings: BTreeMap<usize, TrackSettings>,
    pub master: MasterSettings,
    pub beat: BeatOptions,
}

impl MixRequest {
    pub fn new(bpm: f64) -> Self {
        Self {
            bpm,
            track_settings: BTreeMap::new(),
            master: MasterSettings::default(),
            beat: BeatOptions::default(),
        }
    }

    pub fn with_track(mut self, index: usize, settings: TrackSettings) -> Self {
        self.track_settings.insert(index, settings);
        self
    }

    pub fn with_master(mut self, master: MasterSettings) -> Self {
        self.master = master;
        self
    }

    pub fn with_beat(mut self, beat: BeatOptions) -> Self {
        self.beat = beat;
        self
    }
}

/// One track ready to render
#[derive(Debug, Clone)]
pub struct MixTrack {
    pub recording: Recording,
    pub settings: TrackSettings,
    /// Index in the recordings collection; `None` for the generated beat
    pub source_index: Option<usize>,
}

impl MixTrack {
    pub fn is_generated(&self) -> bool {
        self.source_index.is_none()
    }
}

/// The single input to the renderer; never empty
#[derive(Debug, Clone)]
pub struct MixPlan {
    pub tracks: Vec<MixTrack>,
    pub master: MasterSettings,
    pub bpm: f64,
    /// Render length including tail and minimum floor
    pub duration_ms: f64,
    pub beat_info: Option<BeatInfo>,
}

impl MixPlan {
    /// Frames needed to hold `duration_ms` at `sample_rate`
    pub fn frame_count(&self, sample_rate: u32) -> usize {
        (self.duration_ms / 1000.0 * sample_rate as f64).ceil() as usize
    }

    pub fn total_events(&self) -> usize {
        self.tracks.iter().map(|t| t.recording.notes.len()).sum()
    }
}

/// Build the mix plan: drop mixed recordings and recordings without settings,
/// quantize where requested, size the render and append the backing beat.
pub fn build_plan<R: Rng>(
    recordings: &[Recording],
    request: &MixRequest,
    config: &Config,
    rng: &mut R,
) -> Result<MixPlan> {
    let bpm = request.bpm;
    if !(bpm.is_finite() && bpm > 0.0) {
        return Err(MixError::InvalidSetting(format!("bpm must be > 0, got {}", bpm)));
    }
    if bpm < config.tempo.min_bpm || bpm > config.tempo.max_bpm {
        warn!(
            "bpm {} outside recommended range {}-{}",
            bpm, config.tempo.min_bpm, config.tempo.max_bpm
        );
    }
    request.master.validate()?;

    let mut tracks = Vec::new();
    let mut skipped = 0usize;
    let mut max_duration: f64 = 0.0;

    for (index, recording) in recordings.iter().enumerate() {
        if recording.is_mixed() {
            continue;
        }
        let Some(settings) = request.track_settings.get(&index) else {
            warn!("Recording {} ({}) has no track settings, skipping", index, recording.instrument);
            skipped += 1;
            continue;
        };
        settings.validate()?;

        let notes = if settings.quantize {
            quantize(&recording.notes, bpm)
        } else {
            recording.notes.clone()
        };

        let processed = Recording {
            notes,
            ..recording.clone()
        };
        if !processed.notes.is_empty() {
            max_duration = max_duration.max(processed.last_note_end(config.render.default_note_ms));
        }

        tracks.push(MixTrack {
            recording: processed,
            settings: *settings,
            source_index: Some(index),
        });
    }

    let duration_ms = (max_duration + config.render.tail_ms).max(config.render.min_duration_ms);

    let mut beat_info = None;
    if request.beat.enabled && !tracks.is_empty() {
        let user_recordings: Vec<Recording> =
            tracks.iter().map(|t| t.recording.clone()).collect();
        let analysis = analyze(&user_recordings, bpm);

        let mut beat = create_adaptive_beat(
            &analysis,
            request.beat.style,
            bpm,
            duration_ms,
            &config.backing_beat,
        );
        if request.beat.humanize {
            beat = humanize(&beat, bpm, &config.humanize, rng);
        }

        let bb = &config.backing_beat;
        tracks.push(MixTrack {
            recording: Recording::new(Instrument::Drums, beat, duration_ms),
            settings: TrackSettings {
                volume: bb.volume,
                pan: bb.pan,
                eq_low: bb.eq_low,
                eq_mid: bb.eq_mid,
                eq_high: bb.eq_high,
                quantize: false,
            },
            source_index: None,
        });
        beat_info = Some(analysis);
    } else if request.beat.enabled {
        debug!("Backing beat requested but no user tracks to layer it under");
    }

    if tracks.is_empty() {
        return Err(MixError::NoValidTracks { skipped });
    }

    let plan = MixPlan {
        tracks,
        master: request.master,
        bpm,
        duration_ms,
        beat_info,
    };
    info!(
        "Mix plan: {} tracks, {} events, {:.0}ms at {} bpm",
        plan.tracks.len(),
        plan.total_events(),
        plan.duration_ms,
        bpm
    );
    Ok(plan)
}

//! Recording session state and the recordings collection

use crate::config::Config;
use crate::error::{MixError, Result};
use crate::event::{Event, Instrument, Recording};
use crate::mix_plan::MixRequest;
use crate::render::RenderOptions;
use crate::samples::SampleResolver;
use crate::{MixOutput, Mixdown};
use parking_lot::Mutex;
use rand::Rng;
use std::time::Instant;
use tracing::{debug, info};

enum State {
    Idle,
    Recording {
        instrument: Instrument,
        started: Instant,
        notes: Vec<Event>,
    },
    Mixing,
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::Recording { .. } => "recording",
            State::Mixing => "mixing",
        }
    }
}

struct Inner {
    state: State,
    recordings: Vec<Recording>,
}

/// One studio session: at most one recording or mix in progress at a time.
///
/// All methods take `&self`; share it across threads with `Arc<Studio>`.
pub struct Studio {
    mixdown: Mixdown,
    inner: Mutex<Inner>,
}

/// Puts the studio back to idle when a mix finishes, however it finishes
struct MixingGuard<'a> {
    inner: &'a Mutex<Inner>,
}

impl Drop for MixingGuard<'_> {
    fn drop(&mut self) {
        self.inner.lock().state = State::Idle;
    }
}

impl Studio {
    pub fn new(config: Config) -> Self {
        Self {
            mixdown: Mixdown::new(config),
            inner: Mutex::new(Inner {
                state: State::Idle,
                recordings: Vec::new(),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        self.mixdown.config()
    }

    /// "idle", "recording" or "mixing"
    pub fn state_name(&self) -> &'static str {
        self.inner.lock().state.name()
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.inner.lock().state, State::Recording { .. })
    }

    pub fn is_mixing(&self) -> bool {
        matches!(self.inner.lock().state, State::Mixing)
    }

    pub fn start_recording(&self, instrument: Instrument) -> Result<()> {
        if instrument == Instrument::Mixed {
            return Err(MixError::InvalidSetting(
                "cannot record the mixed instrument".to_string(),
            ));
        }
        let mut inner = self.inner.lock();
        if !matches!(inner.state, State::Idle) {
            return Err(MixError::Busy {
                attempted: "start recording",
                state: inner.state.name(),
            });
        }
        inner.state = State::Recording {
            instrument,
            started: Instant::now(),
            notes: Vec::new(),
        };
        info!("Recording {} started", instrument);
        Ok(())
    }

    /// Record a note at the current time offset. Returns false when ignored.
    pub fn record_note(&self, instrument: Instrument, note: &str, duration_ms: Option<f64>) -> bool {
        self.push_note(instrument, note, None, duration_ms)
    }

    /// Record a note at an explicit offset from the start of the take
    pub fn record_note_at(
        &self,
        instrument: Instrument,
        note: &str,
        time_ms: f64,
        duration_ms: Option<f64>,
    ) -> bool {
        self.push_note(instrument, note, Some(time_ms), duration_ms)
    }

    fn push_note(
        &self,
        instrument: Instrument,
        note: &str,
        time_ms: Option<f64>,
        duration_ms: Option<f64>,
    ) -> bool {
        let mut inner = self.inner.lock();
        let State::Recording {
            instrument: recording_instrument,
            started,
            notes,
        } = &mut inner.state
        else {
            debug!("Ignoring {} '{}': not recording", instrument, note);
            return false;
        };
        if *recording_instrument != instrument {
            debug!(
                "Ignoring {} '{}': recording {}",
                instrument, note, recording_instrument
            );
            return false;
        }

        let time = time_ms.unwrap_or_else(|| started.elapsed().as_secs_f64() * 1000.0);
        let duration = duration_ms.unwrap_or_else(|| instrument.default_duration_ms());
        notes.push(Event::new(instrument, note, time).with_duration(duration));
        true
    }

    /// Finish the take. Nothing is stored when no notes were played.
    pub fn stop_recording(&self) -> Result<Recording> {
        let mut inner = self.inner.lock();
        let (instrument, started, notes) = match std::mem::replace(&mut inner.state, State::Idle) {
            State::Recording {
                instrument,
                started,
                notes,
            } => (instrument, started, notes),
            other => {
                let state = other.name();
                inner.state = other;
                return Err(MixError::Busy {
                    attempted: "stop recording",
                    state,
                });
            }
        };

        if notes.is_empty() {
            info!("Recording {} stopped with no notes", instrument);
            return Err(MixError::NoNotesRecorded);
        }

        let elapsed = started.elapsed().as_secs_f64() * 1000.0;
        let mut recording = Recording::new(instrument, notes, elapsed);
        // explicitly timed notes may run past the wall clock
        recording.duration = recording
            .duration
            .max(recording.last_note_end(instrument.default_duration_ms()));
        info!(
            "Recording {} stopped: {} notes, {:.0}ms",
            instrument,
            recording.notes.len(),
            recording.duration
        );
        inner.recordings.push(recording.clone());
        Ok(recording)
    }

    /// Snapshot of all recordings, in insertion order
    pub fn recordings(&self) -> Vec<Recording> {
        self.inner.lock().recordings.clone()
    }

    pub fn recording_count(&self) -> usize {
        self.inner.lock().recordings.len()
    }

    pub fn remove_recording(&self, index: usize) -> Result<Recording> {
        let mut inner = self.inner.lock();
        if index >= inner.recordings.len() {
            return Err(MixError::RecordingNotFound(index));
        }
        Ok(inner.recordings.remove(index))
    }

    /// Drop every recording, mixed ones included; returns how many were removed.
    /// Refused while a mix is running, since the mix appends its result.
    pub fn clear_recordings(&self) -> Result<usize> {
        let mut inner = self.inner.lock();
        if matches!(inner.state, State::Mixing) {
            return Err(MixError::Busy {
                attempted: "clear recordings",
                state: inner.state.name(),
            });
        }
        let count = inner.recordings.len();
        inner.recordings.clear();
        info!("Cleared {} recordings", count);
        Ok(count)
    }

    /// Append an existing recording (e.g. loaded from a session file); returns its index
    pub fn add_recording(&self, recording: Recording) -> usize {
        let mut inner = self.inner.lock();
        inner.recordings.push(recording);
        inner.recordings.len() - 1
    }

    /// Mix every recording with track settings, append the result as a mixed
    /// recording and return it. Track settings are keyed by recording index.
    pub fn mix<R: Rng>(
        &self,
        request: &MixRequest,
        resolver: &dyn SampleResolver,
        rng: &mut R,
        options: &RenderOptions,
    ) -> Result<MixOutput> {
        let recordings = {
            let mut inner = self.inner.lock();
            if !matches!(inner.state, State::Idle) {
                return Err(MixError::Busy {
                    attempted: "mix",
                    state: inner.state.name(),
                });
            }
            inner.state = State::Mixing;
            inner.recordings.clone()
        };
        let _guard = MixingGuard { inner: &self.inner };

        let mut output = self
            .mixdown
            .run(&recordings, request, resolver, rng, options)?;

        let index = {
            let mut inner = self.inner.lock();
            inner
                .recordings
                .push(Recording::mixed(output.duration_ms, output.wav.clone()));
            inner.recordings.len() - 1
        };
        output.recording_index = Some(index);
        Ok(output)
    }
}

impl Default for Studio {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

//! Error types for the mixdown engine

use std::time::Duration;
use thiserror::Error;

/// How a failure should be surfaced to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Shown to the user; the operation aborts cleanly with no output
    UserRecoverable,
    /// A single resource failed; rendering skips it and continues
    ResourceFailure,
    /// The whole mix is aborted
    Fatal,
}

/// Error type for recording, mixing and export operations
#[derive(Debug, Error)]
pub enum MixError {
    /// E001: Mix plan ended up with zero tracks
    #[error("E001: No valid recordings found to mix ({skipped} recordings had no track settings)")]
    NoValidTracks { skipped: usize },
    /// E002: Recording stopped without any notes
    #[error("E002: No notes were recorded")]
    NoNotesRecorded,
    /// E003: A settings value is outside its allowed range
    #[error("E003: Invalid setting - {0}")]
    InvalidSetting(String),
    /// E004: Re-entrant state transition
    #[error("E004: Studio is busy - cannot {attempted} while {state}")]
    Busy {
        attempted: &'static str,
        state: &'static str,
    },
    /// E005: Recording index does not exist
    #[error("E005: No recording at index {0}")]
    RecordingNotFound(usize),
    /// E006: Sample bytes could not be fetched
    #[error("E006: Failed to fetch sample '{note}' - {reason}")]
    SampleFetch { note: String, reason: String },
    /// E007: Sample bytes could not be decoded to PCM
    #[error("E007: Failed to decode sample '{note}' - {reason}")]
    SampleDecode { note: String, reason: String },
    /// E008: Engine-level failure while rendering
    #[error("E008: Render engine failure - {0}")]
    RenderEngine(String),
    /// E009: Caller cancelled the render
    #[error("E009: Render cancelled")]
    Cancelled,
    /// E010: Render exceeded the caller-supplied timeout
    #[error("E010: Render timed out after {0:?}")]
    TimedOut(Duration),
    /// E011: WAV serialization failed
    #[error("E011: WAV encode error - {0}")]
    WavEncode(String),
    /// E012: MIDI serialization failed
    #[error("E012: MIDI export error - {0}")]
    MidiExport(String),
    /// E013: Configuration validation failed
    #[error("E013: Configuration validation failed - {0}")]
    ConfigValidation(String),
    /// E014: File I/O error
    #[error("E014: File I/O error - {0}")]
    Io(#[from] std::io::Error),
    /// E015: JSON (de)serialization error
    #[error("E015: JSON serialization error - {0}")]
    Json(#[from] serde_json::Error),
}

impl MixError {
    /// Classify this error for the caller
    pub fn kind(&self) -> ErrorKind {
        match self {
            MixError::NoValidTracks { .. }
            | MixError::NoNotesRecorded
            | MixError::InvalidSetting(_)
            | MixError::Busy { .. }
            | MixError::RecordingNotFound(_)
            | MixError::ConfigValidation(_) => ErrorKind::UserRecoverable,
            MixError::SampleFetch { .. } | MixError::SampleDecode { .. } => {
                ErrorKind::ResourceFailure
            }
            MixError::RenderEngine(_)
            | MixError::Cancelled
            | MixError::TimedOut(_)
            | MixError::WavEncode(_)
            | MixError::MidiExport(_)
            | MixError::Io(_)
            | MixError::Json(_) => ErrorKind::Fatal,
        }
    }

    /// True when the message can be shown to the user as-is
    pub fn is_user_recoverable(&self) -> bool {
        self.kind() == ErrorKind::UserRecoverable
    }
}

impl From<hound::Error> for MixError {
    fn from(err: hound::Error) -> Self {
        MixError::WavEncode(err.to_string())
    }
}

/// Result type alias for mixdown operations
pub type Result<T> = std::result::Result<T, MixError>;

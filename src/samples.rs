//! Sample lookup and decoding
//!
//! The engine never touches the filesystem itself: every note key is turned into
//! WAV bytes by a [`SampleResolver`], then decoded once per render through
//! [`SampleCache`].

use crate::audio::{decode_wav, resample_buffer, StereoBuffer};
use crate::error::{MixError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Byte source for the audio sample behind a note key
pub trait SampleResolver {
    fn fetch(&self, note: &str) -> Result<Vec<u8>>;
}

/// Reads `<root>/<note>.wav`
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// File a note key maps to, or `None` for keys that would escape the root
    pub fn path_for(&self, note: &str) -> Option<PathBuf> {
        let safe = !note.is_empty()
            && !note.contains(|c: char| c == '/' || c == '\\')
            && note != "."
            && note != "..";
        safe.then(|| self.root.join(format!("{}.wav", note)))
    }
}

impl SampleResolver for DirectoryResolver {
    fn fetch(&self, note: &str) -> Result<Vec<u8>> {
        let path = self.path_for(note).ok_or_else(|| MixError::SampleFetch {
            note: note.to_string(),
            reason: "invalid note key".to_string(),
        })?;
        std::fs::read(&path).map_err(|e| MixError::SampleFetch {
            note: note.to_string(),
            reason: format!("{}: {}", path.display(), e),
        })
    }
}

/// In-memory samples keyed by note
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    samples: HashMap<String, Arc<Vec<u8>>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, note: impl Into<String>, bytes: Vec<u8>) {
        self.samples.insert(note.into(), Arc::new(bytes));
    }

    pub fn with_sample(mut self, note: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(note, bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl SampleResolver for MemoryResolver {
    fn fetch(&self, note: &str) -> Result<Vec<u8>> {
        self.samples
            .get(note)
            .map(|bytes| bytes.as_ref().clone())
            .ok_or_else(|| MixError::SampleFetch {
                note: note.to_string(),
                reason: "no sample registered".to_string(),
            })
    }
}

/// Decoded samples for one render, already at the render rate
pub struct SampleCache<'a> {
    resolver: &'a dyn SampleResolver,
    sample_rate: u32,
    decoded: HashMap<String, Arc<StereoBuffer>>,
}

impl<'a> SampleCache<'a> {
    pub fn new(resolver: &'a dyn SampleResolver, sample_rate: u32) -> Self {
        Self {
            resolver,
            sample_rate,
            decoded: HashMap::new(),
        }
    }

    /// Fetch, decode and resample `note`, reusing earlier work.
    /// Failures are not cached; each failing event reports its own error.
    pub fn get(&mut self, note: &str) -> Result<Arc<StereoBuffer>> {
        if let Some(buffer) = self.decoded.get(note) {
            return Ok(Arc::clone(buffer));
        }

        let bytes = self.resolver.fetch(note)?;
        let buffer = decode_wav(&bytes).map_err(|reason| MixError::SampleDecode {
            note: note.to_string(),
            reason,
        })?;
        if buffer.is_empty() {
            return Err(MixError::SampleDecode {
                note: note.to_string(),
                reason: "no audio frames".to_string(),
            });
        }

        let source_rate = buffer.sample_rate;
        let buffer = Arc::new(resample_buffer(buffer, self.sample_rate));
        debug!(
            "Decoded sample '{}': {} frames ({} Hz -> {} Hz)",
            note,
            buffer.frames(),
            source_rate,
            self.sample_rate
        );
        self.decoded.insert(note.to_string(), Arc::clone(&buffer));
        Ok(buffer)
    }

    pub fn len(&self) -> usize {
        self.decoded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoded.is_empty()
    }
}

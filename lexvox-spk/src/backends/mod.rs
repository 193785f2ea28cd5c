//! Speech backend implementations

pub mod custom;
pub mod espeak;

use crate::config::NarrationOptions;
use crate::engine::EventSink;
use crate::error::SpeechError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Engine-allocated handle for one utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtteranceId(pub u64);

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "utterance-{}", self.0)
    }
}

/// Voice enumerated by a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub id: String,
    pub name: String,
    /// Language tag, e.g. "pt-BR"
    pub locale: String,
}

impl Voice {
    pub fn new(id: impl Into<String>, name: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            locale: locale.into(),
        }
    }
}

/// Normalized text plus the options it should be spoken with
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub options: NarrationOptions,
}

/// Playback events a backend reports for an utterance
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    Started,
    Paused,
    Resumed,
    /// Playback reached the given character offset of the utterance text
    Boundary { char_index: usize },
    Ended,
    Failed(String),
}

/// Trait for platform speech backends
///
/// Control calls must return promptly; playback progress is reported
/// through the [`EventSink`] handed to `start_utterance`, from any thread.
pub trait SpeechBackend: Send + Sync {
    /// Get backend name
    fn name(&self) -> &str;

    /// Check if the backend can speak on this host
    fn is_available(&self) -> bool;

    /// Get available voices
    fn list_voices(&self) -> Result<Vec<Voice>, SpeechError>;

    /// Begin speaking; events for `id` are delivered through `events`
    fn start_utterance(
        &self,
        id: UtteranceId,
        utterance: &Utterance,
        events: EventSink,
    ) -> Result<(), SpeechError>;

    fn pause(&self, id: UtteranceId) -> Result<(), SpeechError>;

    fn resume(&self, id: UtteranceId) -> Result<(), SpeechError>;

    /// Abandon the utterance; no further events for `id` are expected
    fn cancel(&self, id: UtteranceId) -> Result<(), SpeechError>;
}

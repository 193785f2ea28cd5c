//! Custom speech backend
//! Lets a host plug in its own platform speech (a browser bridge, a mobile
//! TTS service) without implementing the trait by hand

use crate::backends::{SpeechBackend, Utterance, UtteranceId, Voice};
use crate::engine::EventSink;
use crate::error::SpeechError;
use std::sync::Arc;

/// Playback control requested by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Pause,
    Resume,
    Cancel,
}

type StartFn = dyn Fn(UtteranceId, &Utterance, EventSink) -> Result<(), SpeechError> + Send + Sync;
type ControlFn = dyn Fn(UtteranceId, Control) -> Result<(), SpeechError> + Send + Sync;
type VoicesFn = dyn Fn() -> Result<Vec<Voice>, SpeechError> + Send + Sync;
type AvailableFn = dyn Fn() -> bool + Send + Sync;

/// Closure-backed speech backend
pub struct CustomBackend {
    name: String,
    start_fn: Arc<StartFn>,
    control_fn: Arc<ControlFn>,
    voices_fn: Arc<VoicesFn>,
    is_available_fn: Arc<AvailableFn>,
}

impl CustomBackend {
    /// Create a new custom backend
    pub fn new<F1, F2, F3, F4>(
        name: impl Into<String>,
        start_fn: F1,
        control_fn: F2,
        voices_fn: F3,
        is_available_fn: F4,
    ) -> Self
    where
        F1: Fn(UtteranceId, &Utterance, EventSink) -> Result<(), SpeechError> + Send + Sync + 'static,
        F2: Fn(UtteranceId, Control) -> Result<(), SpeechError> + Send + Sync + 'static,
        F3: Fn() -> Result<Vec<Voice>, SpeechError> + Send + Sync + 'static,
        F4: Fn() -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            start_fn: Arc::new(start_fn),
            control_fn: Arc::new(control_fn),
            voices_fn: Arc::new(voices_fn),
            is_available_fn: Arc::new(is_available_fn),
        }
    }

    /// A backend that reports itself unavailable
    pub fn unavailable(name: impl Into<String>) -> Self {
        Self::new(
            name,
            |_, _, _| Err(SpeechError::Unsupported("No speech capability".to_string())),
            |_, _| Ok(()),
            || Ok(Vec::new()),
            || false,
        )
    }
}

impl SpeechBackend for CustomBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        (self.is_available_fn)()
    }

    fn list_voices(&self) -> Result<Vec<Voice>, SpeechError> {
        (self.voices_fn)()
    }

    fn start_utterance(
        &self,
        id: UtteranceId,
        utterance: &Utterance,
        events: EventSink,
    ) -> Result<(), SpeechError> {
        (self.start_fn)(id, utterance, events)
    }

    fn pause(&self, id: UtteranceId) -> Result<(), SpeechError> {
        (self.control_fn)(id, Control::Pause)
    }

    fn resume(&self, id: UtteranceId) -> Result<(), SpeechError> {
        (self.control_fn)(id, Control::Resume)
    }

    fn cancel(&self, id: UtteranceId) -> Result<(), SpeechError> {
        (self.control_fn)(id, Control::Cancel)
    }
}

//! Shared test backend and helpers

#![allow(dead_code)]

use lexvox_spk::{
    BackendEvent, EventSink, NarrationConfig, NarrationEngine, NarrationState, SpeechBackend,
    SpeechError, Subscription, Utterance, UtteranceId, Voice,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Start(UtteranceId, String),
    Pause(UtteranceId),
    Resume(UtteranceId),
    Cancel(UtteranceId),
}

/// Backend that records every call and lets tests drive events by hand
pub struct RecordingBackend {
    /// Emit `Started` from inside `start_utterance`
    pub auto_start: bool,
    /// Emit `Paused`/`Resumed` from inside `pause`/`resume`
    pub auto_control: bool,
    pub available: bool,
    pub fail_start: bool,
    pub fail_voices: bool,
    pub voices: Vec<Voice>,
    calls: Mutex<Vec<Call>>,
    sinks: Mutex<HashMap<UtteranceId, EventSink>>,
    utterances: Mutex<Vec<Utterance>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            auto_start: true,
            auto_control: true,
            available: true,
            fail_start: false,
            fail_voices: false,
            voices: vec![
                Voice::new("en-us", "English (America)", "en-US"),
                Voice::new("pt-br", "Portuguese (Brazil)", "pt-BR"),
                Voice::new("pt-pt", "Portuguese (Portugal)", "pt-PT"),
            ],
            calls: Mutex::new(Vec::new()),
            sinks: Mutex::new(HashMap::new()),
            utterances: Mutex::new(Vec::new()),
        }
    }

    /// No automatic events; the test emits everything
    pub fn manual() -> Self {
        Self {
            auto_start: false,
            auto_control: false,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn utterances(&self) -> Vec<Utterance> {
        self.utterances.lock().clone()
    }

    pub fn last_utterance(&self) -> Option<Utterance> {
        self.utterances.lock().last().cloned()
    }

    pub fn last_id(&self) -> Option<UtteranceId> {
        self.sinks.lock().keys().max().copied()
    }

    pub fn emit(&self, id: UtteranceId, event: BackendEvent) {
        let sink = self.sinks.lock().get(&id).cloned();
        sink.expect("no sink for utterance").emit(event);
    }

    fn emit_if(&self, enabled: bool, id: UtteranceId, event: BackendEvent) {
        if enabled {
            self.emit(id, event);
        }
    }
}

impl SpeechBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn list_voices(&self) -> Result<Vec<Voice>, SpeechError> {
        if self.fail_voices {
            return Err(SpeechError::Backend("voice enumeration failed".to_string()));
        }
        Ok(self.voices.clone())
    }

    fn start_utterance(
        &self,
        id: UtteranceId,
        utterance: &Utterance,
        events: EventSink,
    ) -> Result<(), SpeechError> {
        assert_eq!(events.utterance_id(), id);
        self.calls.lock().push(Call::Start(id, utterance.text.clone()));
        self.utterances.lock().push(utterance.clone());
        self.sinks.lock().insert(id, events);

        if self.fail_start {
            return Err(SpeechError::Backend("refused".to_string()));
        }
        self.emit_if(self.auto_start, id, BackendEvent::Started);
        Ok(())
    }

    fn pause(&self, id: UtteranceId) -> Result<(), SpeechError> {
        self.calls.lock().push(Call::Pause(id));
        self.emit_if(self.auto_control, id, BackendEvent::Paused);
        Ok(())
    }

    fn resume(&self, id: UtteranceId) -> Result<(), SpeechError> {
        self.calls.lock().push(Call::Resume(id));
        self.emit_if(self.auto_control, id, BackendEvent::Resumed);
        Ok(())
    }

    fn cancel(&self, id: UtteranceId) -> Result<(), SpeechError> {
        self.calls.lock().push(Call::Cancel(id));
        Ok(())
    }
}

pub fn engine_with(backend: &Arc<RecordingBackend>) -> NarrationEngine {
    NarrationEngine::new(backend.clone(), NarrationConfig::default())
}

/// Subscribe a listener that stores every state it receives
pub fn record_states(engine: &NarrationEngine) -> (Arc<Mutex<Vec<NarrationState>>>, Subscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let subscription = engine.subscribe(move |state| sink.lock().push(state.clone()));
    (seen, subscription)
}

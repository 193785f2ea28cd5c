//! Narration engine: playback state machine over a speech backend

use crate::article::Article;
use crate::backends::espeak::EspeakBackend;
use crate::backends::{BackendEvent, SpeechBackend, Utterance, UtteranceId, Voice};
use crate::config::{NarrationConfig, NarrationOptions};
use crate::error::SpeechError;
use crate::normalize::normalize_for_narration;
use crate::state::{NarrationState, PlaybackStatus};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Locale tags matched by [`NarrationEngine::portuguese_voices`]
pub const PORTUGUESE_LOCALES: [&str; 2] = ["pt-BR", "pt-PT"];

/// Whether the engine can speak at all, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Supported,
    /// No usable backend, or narration disabled; every operation is a no-op
    Unsupported,
}

type Listener = Arc<dyn Fn(&NarrationState) + Send + Sync>;

/// Drives one narration session at a time and broadcasts its state
///
/// Cloning yields another handle to the same engine. The in-flight
/// utterance is cancelled once the last handle is dropped.
#[derive(Clone)]
pub struct NarrationEngine {
    shared: Arc<Shared>,
}

struct Shared {
    backend: Arc<dyn SpeechBackend>,
    config: NarrationConfig,
    capability: Capability,
    // Serializes public operations and backend events, including listener
    // delivery. Re-entrant so listeners and synchronous backends can call back in.
    dispatch: ReentrantMutex<()>,
    current: Mutex<Option<ActiveUtterance>>,
    state: RwLock<NarrationState>,
    listeners: RwLock<Vec<(u64, Listener)>>,
    // Snapshots raised while listeners are running are queued here so every
    // subscriber sees them in order.
    pending: Mutex<VecDeque<NarrationState>>,
    delivering: AtomicBool,
    next_utterance: AtomicU64,
    next_listener: AtomicU64,
    watch: broadcast::Sender<NarrationState>,
}

struct ActiveUtterance {
    id: UtteranceId,
    text: String,
}

impl NarrationEngine {
    /// Create an engine over `backend`
    ///
    /// Capability is probed once here; an unavailable backend or a disabled
    /// config yields an engine whose operations do nothing.
    pub fn new(backend: Arc<dyn SpeechBackend>, config: NarrationConfig) -> Self {
        let capability = if !config.enabled {
            info!("Narration disabled in config");
            Capability::Unsupported
        } else if backend.is_available() {
            info!("Narration backend '{}' available", backend.name());
            Capability::Supported
        } else {
            warn!("Narration backend '{}' not available on this host", backend.name());
            Capability::Unsupported
        };

        let (watch, _) = broadcast::channel(config.event_buffer.max(1));

        Self {
            shared: Arc::new(Shared {
                backend,
                config,
                capability,
                dispatch: ReentrantMutex::new(()),
                current: Mutex::new(None),
                state: RwLock::new(NarrationState::idle()),
                listeners: RwLock::new(Vec::new()),
                pending: Mutex::new(VecDeque::new()),
                delivering: AtomicBool::new(false),
                next_utterance: AtomicU64::new(0),
                next_listener: AtomicU64::new(0),
                watch,
            }),
        }
    }

    /// Validate `config` and build an engine over the espeak-ng backend
    pub fn from_config(config: NarrationConfig) -> Result<Self, SpeechError> {
        config.validate().map_err(SpeechError::Config)?;
        let backend = Arc::new(EspeakBackend::new(&config.espeak));
        Ok(Self::new(backend, config))
    }

    pub fn capability(&self) -> Capability {
        self.shared.capability
    }

    pub fn is_supported(&self) -> bool {
        self.shared.capability == Capability::Supported
    }

    pub fn backend_name(&self) -> &str {
        self.shared.backend.name()
    }

    pub fn config(&self) -> &NarrationConfig {
        &self.shared.config
    }

    /// Current state snapshot
    pub fn state(&self) -> NarrationState {
        self.shared.state.read().clone()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.shared.state.read().status()
    }

    /// Speak `text`, cancelling whatever is currently being spoken
    ///
    /// Returns immediately. The engine reports `Speaking` once the backend
    /// acknowledges the start; a backend that refuses the utterance leaves
    /// the engine idle.
    pub fn speak(&self, text: &str, options: &NarrationOptions) {
        let shared = &self.shared;
        let _dispatch = shared.dispatch.lock();

        if shared.capability == Capability::Unsupported {
            debug!("Narration unsupported, ignoring speak request");
            return;
        }

        shared.cancel_current();

        let utterance = Utterance {
            text: normalize_for_narration(text),
            options: options.resolve(shared.config.option_policy, &shared.config.defaults),
        };
        let id = UtteranceId(shared.next_utterance.fetch_add(1, Ordering::Relaxed) + 1);

        *shared.current.lock() = Some(ActiveUtterance {
            id,
            text: utterance.text.clone(),
        });

        let events = EventSink {
            id,
            target: Arc::downgrade(shared),
        };

        debug!(
            %id,
            chars = utterance.text.chars().count(),
            rate = utterance.options.rate,
            language = %utterance.options.language,
            "Starting utterance"
        );

        if let Err(e) = shared.backend.start_utterance(id, &utterance, events) {
            error!(%id, "Failed to start utterance: {}", e);
            shared.finish(id);
        }
    }

    /// Speak `text` with the configured default options
    pub fn speak_with_defaults(&self, text: &str) {
        let options = self.shared.config.defaults.clone();
        self.speak(text, &options);
    }

    /// Narrate a statute article, preferring a Portuguese voice when the
    /// configured defaults do not name one.
    pub fn narrate_article(&self, article: &Article) {
        let mut options = self.shared.config.defaults.clone();
        if options.voice.is_none() {
            options.voice = self.portuguese_voices().into_iter().next().map(|voice| voice.id);
        }
        self.speak(&article.narration_text(), &options);
    }

    /// Ask the backend to pause; only acts while speaking and not paused
    pub fn pause(&self) {
        let shared = &self.shared;
        let _dispatch = shared.dispatch.lock();

        if shared.state.read().status() != PlaybackStatus::Speaking {
            return;
        }
        if let Some(id) = shared.current_id() {
            if let Err(e) = shared.backend.pause(id) {
                warn!(%id, "Failed to pause narration: {}", e);
            }
        }
    }

    /// Ask the backend to resume; only acts while paused
    pub fn resume(&self) {
        let shared = &self.shared;
        let _dispatch = shared.dispatch.lock();

        if shared.state.read().status() != PlaybackStatus::Paused {
            return;
        }
        if let Some(id) = shared.current_id() {
            if let Err(e) = shared.backend.resume(id) {
                warn!(%id, "Failed to resume narration: {}", e);
            }
        }
    }

    /// Cancel the current utterance and report idle immediately
    pub fn stop(&self) {
        let _dispatch = self.shared.dispatch.lock();
        self.shared.cancel_current();
    }

    /// Pause when speaking, resume when paused, nothing when idle
    pub fn toggle(&self) {
        let _dispatch = self.shared.dispatch.lock();
        match self.status() {
            PlaybackStatus::Speaking => self.pause(),
            PlaybackStatus::Paused => self.resume(),
            PlaybackStatus::Idle => {}
        }
    }

    /// Register a listener called with the full state on every transition
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&NarrationState) + Send + Sync + 'static,
    {
        let id = self.shared.next_listener.fetch_add(1, Ordering::Relaxed);
        self.shared.listeners.write().push((id, Arc::new(listener)));
        Subscription {
            id,
            target: Arc::downgrade(&self.shared),
        }
    }

    /// Receive state snapshots over a broadcast channel
    pub fn watch(&self) -> broadcast::Receiver<NarrationState> {
        self.shared.watch.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.read().len()
    }

    /// All voices the backend reports; empty when unsupported or on failure
    pub fn voices(&self) -> Vec<Voice> {
        if self.shared.capability == Capability::Unsupported {
            return Vec::new();
        }
        match self.shared.backend.list_voices() {
            Ok(voices) => voices,
            Err(e) => {
                warn!("Failed to list voices: {}", e);
                Vec::new()
            }
        }
    }

    /// Voices whose locale contains any of `locales`, in backend order
    pub fn voices_for_locales(&self, locales: &[&str]) -> Vec<Voice> {
        self.voices()
            .into_iter()
            .filter(|voice| locales.iter().any(|locale| voice.locale.contains(locale)))
            .collect()
    }

    /// Brazilian and European Portuguese voices
    pub fn portuguese_voices(&self) -> Vec<Voice> {
        self.voices_for_locales(&PORTUGUESE_LOCALES)
    }
}

impl fmt::Debug for NarrationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NarrationEngine")
            .field("backend", &self.shared.backend.name())
            .field("capability", &self.shared.capability)
            .field("state", &*self.shared.state.read())
            .finish()
    }
}

impl Shared {
    fn current_id(&self) -> Option<UtteranceId> {
        self.current.lock().as_ref().map(|active| active.id)
    }

    fn cancel_current(&self) {
        let active = self.current.lock().take();
        if let Some(active) = active {
            debug!(id = %active.id, "Cancelling utterance");
            if let Err(e) = self.backend.cancel(active.id) {
                warn!(id = %active.id, "Failed to cancel utterance: {}", e);
            }
        }
        self.transition(|state| *state = NarrationState::idle());
    }

    /// Retire `id` if it is still current and report idle
    fn finish(&self, id: UtteranceId) {
        let finished = {
            let mut current = self.current.lock();
            match current.as_ref() {
                Some(active) if active.id == id => current.take(),
                _ => None,
            }
        };
        if finished.is_some() {
            self.transition(|state| *state = NarrationState::idle());
        }
    }

    fn handle_event(&self, id: UtteranceId, event: BackendEvent) {
        let _dispatch = self.dispatch.lock();

        if self.current_id() != Some(id) {
            debug!(%id, ?event, "Ignoring event for inactive utterance");
            return;
        }

        match event {
            BackendEvent::Started => {
                let text = self
                    .current
                    .lock()
                    .as_ref()
                    .map(|active| active.text.clone())
                    .unwrap_or_default();
                self.transition(|state| *state = NarrationState::speaking(text));
            }
            BackendEvent::Paused => self.transition(|state| {
                if state.is_speaking {
                    state.is_paused = true;
                }
            }),
            BackendEvent::Resumed => self.transition(|state| state.is_paused = false),
            BackendEvent::Boundary { char_index } => self.transition(|state| {
                if state.is_speaking {
                    state.position = char_index.min(state.text.chars().count());
                }
            }),
            BackendEvent::Ended => {
                debug!(%id, "Utterance finished");
                self.finish(id);
            }
            BackendEvent::Failed(reason) => {
                error!(%id, "Speech backend error: {}", reason);
                self.finish(id);
            }
        }
    }

    /// Apply `update` and notify if the state actually changed
    fn transition(&self, update: impl FnOnce(&mut NarrationState)) {
        let snapshot = {
            let mut state = self.state.write();
            let before = state.clone();
            update(&mut state);
            if *state == before {
                return;
            }
            state.clone()
        };

        debug!(status = %snapshot.status(), position = snapshot.position, "Narration state changed");
        self.notify(snapshot);
    }

    /// Deliver `state` to listeners and watchers
    ///
    /// Only called under the dispatch lock. A transition triggered from inside
    /// a listener is queued and delivered by the outermost call.
    fn notify(&self, state: NarrationState) {
        self.pending.lock().push_back(state);
        if self.delivering.swap(true, Ordering::AcqRel) {
            return;
        }

        loop {
            let next = self.pending.lock().pop_front();
            let Some(state) = next else { break };

            // No receivers is not an error
            let _ = self.watch.send(state.clone());

            let listeners: Vec<(u64, Listener)> = self
                .listeners
                .read()
                .iter()
                .map(|(id, listener)| (*id, Arc::clone(listener)))
                .collect();

            for (id, listener) in listeners {
                // A listener removed earlier in this round is skipped
                let registered = self.listeners.read().iter().any(|(other, _)| *other == id);
                if !registered {
                    continue;
                }
                // A panicking listener must not stall delivery for everyone else
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener(&state)));
                if outcome.is_err() {
                    error!(listener = id, status = %state.status(), "Narration listener panicked");
                }
            }
        }

        self.delivering.store(false, Ordering::Release);
    }

    fn remove_listener(&self, id: u64) -> bool {
        let _dispatch = self.dispatch.lock();
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(other, _)| *other != id);
        listeners.len() != before
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(active) = self.current.get_mut().take() {
            if let Err(e) = self.backend.cancel(active.id) {
                warn!(id = %active.id, "Failed to cancel utterance on shutdown: {}", e);
            }
        }
    }
}

/// Handle a backend uses to report events for one utterance
///
/// Events may be emitted from any thread. The sink does not keep the
/// engine alive; events emitted after the engine is gone are dropped.
#[derive(Clone)]
pub struct EventSink {
    id: UtteranceId,
    target: Weak<Shared>,
}

impl EventSink {
    pub fn utterance_id(&self) -> UtteranceId {
        self.id
    }

    pub fn emit(&self, event: BackendEvent) {
        match self.target.upgrade() {
            Some(shared) => shared.handle_event(self.id, event),
            None => debug!(id = %self.id, ?event, "Engine gone, dropping backend event"),
        }
    }

    /// Whether the engine that issued this sink still exists
    pub fn is_attached(&self) -> bool {
        self.target.strong_count() > 0
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("id", &self.id)
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Returned by [`NarrationEngine::subscribe`]
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    target: Weak<Shared>,
}

impl Subscription {
    /// Remove the listener. Calling this again, or after the engine is
    /// gone, does nothing.
    pub fn unsubscribe(&self) {
        if let Some(shared) = self.target.upgrade() {
            if shared.remove_listener(self.id) {
                debug!(listener = self.id, "Listener unsubscribed");
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.target
            .upgrade()
            .map(|shared| shared.listeners.read().iter().any(|(id, _)| *id == self.id))
            .unwrap_or(false)
    }
}

//! lexvox-spk: Narration for statute text
//!
//! Provides:
//! - A narration engine with idle/speaking/paused playback state
//! - Text normalization for Portuguese legal idioms
//! - State change subscriptions (callbacks or a broadcast channel)
//! - Pluggable speech backends (espeak-ng, or host-supplied closures)

pub mod article;
pub mod backends;
pub mod config;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod state;

pub use article::Article;
pub use backends::{BackendEvent, SpeechBackend, Utterance, UtteranceId, Voice};
pub use config::{NarrationConfig, NarrationOptions, OptionPolicy};
pub use engine::{Capability, EventSink, NarrationEngine, Subscription, PORTUGUESE_LOCALES};
pub use error::SpeechError;
pub use normalize::normalize_for_narration;
pub use state::{NarrationState, PlaybackStatus};

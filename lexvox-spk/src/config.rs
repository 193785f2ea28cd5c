//! Configuration for narration

use crate::error::SpeechError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Rate bounds accepted by the clamp policy
pub const RATE_RANGE: (f32, f32) = (0.1, 10.0);
/// Pitch bounds accepted by the clamp policy
pub const PITCH_RANGE: (f32, f32) = (0.0, 2.0);
/// Volume bounds accepted by the clamp policy
pub const VOLUME_RANGE: (f32, f32) = (0.0, 1.0);

/// Narration configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NarrationConfig {
    /// Enable narration (a disabled engine reports itself unsupported)
    pub enabled: bool,

    /// Options used when the caller does not supply its own
    pub defaults: NarrationOptions,

    /// How out-of-range rate/pitch/volume values are handled
    pub option_policy: OptionPolicy,

    /// Capacity of the broadcast channel behind `NarrationEngine::watch`
    pub event_buffer: usize,

    /// espeak-ng backend settings
    pub espeak: EspeakConfig,
}

/// Per-utterance playback options
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NarrationOptions {
    /// Speaking rate multiplier (typical 0.1-10, 1.0 is normal)
    pub rate: f32,

    /// Pitch (0-2, 1.0 is normal)
    pub pitch: f32,

    /// Volume (0-1)
    pub volume: f32,

    /// Language tag (e.g., "pt-BR")
    pub language: String,

    /// Voice identifier; `None` selects the backend default
    pub voice: Option<String>,
}

/// Policy for rate/pitch/volume values outside their documented ranges
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OptionPolicy {
    /// Pin values into range; non-finite values fall back to the defaults
    #[default]
    Clamp,
    /// Hand values to the backend untouched and let it decide
    PassThrough,
}

/// espeak-ng backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EspeakConfig {
    /// Executable name or path
    pub program: PathBuf,

    /// Words per minute at rate 1.0 (80-500)
    pub base_words_per_minute: u32,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // Reading view settings: slightly slow, neutral pitch, full volume
            defaults: NarrationOptions {
                rate: 0.9,
                ..NarrationOptions::default()
            },
            option_policy: OptionPolicy::Clamp,
            event_buffer: 64,
            espeak: EspeakConfig::default(),
        }
    }
}

impl Default for NarrationOptions {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            language: "pt-BR".to_string(),
            voice: None,
        }
    }
}

impl Default for EspeakConfig {
    fn default() -> Self {
        Self {
            program: PathBuf::from("espeak-ng"),
            base_words_per_minute: 175,
        }
    }
}

impl NarrationOptions {
    pub fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// Apply an out-of-range policy, returning the options handed to the backend
    ///
    /// Under [`OptionPolicy::Clamp`] non-finite values are replaced by the
    /// matching value of `fallback` (normally the configured defaults).
    pub fn resolve(&self, policy: OptionPolicy, fallback: &NarrationOptions) -> NarrationOptions {
        match policy {
            OptionPolicy::PassThrough => self.clone(),
            OptionPolicy::Clamp => {
                let builtin = NarrationOptions::default();
                let rate = clamp_or(fallback.rate, RATE_RANGE, builtin.rate);
                let pitch = clamp_or(fallback.pitch, PITCH_RANGE, builtin.pitch);
                let volume = clamp_or(fallback.volume, VOLUME_RANGE, builtin.volume);
                NarrationOptions {
                    rate: clamp_or(self.rate, RATE_RANGE, rate),
                    pitch: clamp_or(self.pitch, PITCH_RANGE, pitch),
                    volume: clamp_or(self.volume, VOLUME_RANGE, volume),
                    language: self.language.clone(),
                    voice: self.voice.clone(),
                }
            }
        }
    }

    /// Validate options strictly against their documented ranges
    pub fn validate(&self) -> Result<(), String> {
        check_range("Rate", self.rate, RATE_RANGE)?;
        check_range("Pitch", self.pitch, PITCH_RANGE)?;
        check_range("Volume", self.volume, VOLUME_RANGE)?;

        // Language tag format: "pt", "pt-BR", "pt-br"
        if self.language.is_empty() {
            return Err("Language code cannot be empty".to_string());
        }

        if self.language.len() > 32 {
            return Err("Language code too long (max 32 chars)".to_string());
        }

        if !self.language.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err("Language code contains invalid characters (only alphanumeric and '-' allowed)".to_string());
        }

        if let Some(ref voice) = self.voice {
            if voice.is_empty() {
                return Err("Voice cannot be empty if provided".to_string());
            }

            if voice.len() > 256 {
                return Err("Voice too long (max 256 chars)".to_string());
            }

            if voice.chars().any(|c| c == '\0' || c.is_control()) {
                return Err("Voice contains invalid characters".to_string());
            }
        }

        Ok(())
    }
}

fn clamp_or(value: f32, (min, max): (f32, f32), fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

fn check_range(label: &str, value: f32, (min, max): (f32, f32)) -> Result<(), String> {
    if !value.is_finite() || !(min..=max).contains(&value) {
        return Err(format!("{} must be between {} and {}", label, min, max));
    }
    Ok(())
}

impl NarrationConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        self.defaults.validate()?;

        if self.event_buffer == 0 {
            return Err("Event buffer must be greater than 0".to_string());
        }

        if self.event_buffer > 10_000 {
            return Err("Event buffer too large (max 10000)".to_string());
        }

        if !(80..=500).contains(&self.espeak.base_words_per_minute) {
            return Err("espeak words per minute must be between 80 and 500".to_string());
        }

        let program = self.espeak.program.to_string_lossy();
        if program.is_empty() {
            return Err("espeak program cannot be empty".to_string());
        }
        if program.chars().any(|c| c == '\0' || c.is_control()) {
            return Err("espeak program contains invalid characters".to_string());
        }

        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, SpeechError> {
        let config: NarrationConfig = toml::from_str(source)?;
        config.validate().map_err(SpeechError::Config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SpeechError> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    /// Load from `path` if given, else from the default location if it exists,
    /// else fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, SpeechError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// `<config dir>/lexvox/narration.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("lexvox").join("narration.toml"))
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String, SpeechError> {
        toml::to_string_pretty(self)
            .map_err(|e| SpeechError::Config(format!("Failed to serialize config: {}", e)))
    }
}

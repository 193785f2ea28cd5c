//! Narration playback state

use serde::{Deserialize, Serialize};

/// Snapshot of an engine's playback state
///
/// Listeners always receive the full record, never a diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationState {
    /// Playback has started and has not ended or been stopped
    pub is_speaking: bool,

    /// Playback is suspended; only ever true while `is_speaking`
    pub is_paused: bool,

    /// Normalized text being spoken; empty when idle
    pub text: String,

    /// Character offset into `text` (best effort, backend-reported)
    pub position: usize,
}

/// Coarse playback status derived from a [`NarrationState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    Idle,
    Speaking,
    Paused,
}

impl NarrationState {
    pub fn idle() -> Self {
        Self::default()
    }

    pub(crate) fn speaking(text: String) -> Self {
        Self {
            is_speaking: true,
            is_paused: false,
            text,
            position: 0,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        match (self.is_speaking, self.is_paused) {
            (false, _) => PlaybackStatus::Idle,
            (true, false) => PlaybackStatus::Speaking,
            (true, true) => PlaybackStatus::Paused,
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.is_speaking
    }

    /// Text not yet spoken, starting at `position`
    pub fn remaining_text(&self) -> &str {
        match self.text.char_indices().nth(self.position) {
            Some((offset, _)) => &self.text[offset..],
            None => "",
        }
    }
}

impl std::fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Speaking => "speaking",
            PlaybackStatus::Paused => "paused",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_flags() {
        assert_eq!(NarrationState::idle().status(), PlaybackStatus::Idle);

        let mut state = NarrationState::speaking("artigo um".to_string());
        assert_eq!(state.status(), PlaybackStatus::Speaking);

        state.is_paused = true;
        assert_eq!(state.status(), PlaybackStatus::Paused);
    }

    #[test]
    fn test_remaining_text_counts_characters() {
        let mut state = NarrationState::speaking("parágrafo 3".to_string());
        state.position = 5;
        assert_eq!(state.remaining_text(), "rafo 3");

        state.position = 100;
        assert_eq!(state.remaining_text(), "");
    }
}

//! Statute article narration text

use serde::{Deserialize, Serialize};

/// A statute article as shown in the reading view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Article number as printed, e.g. "5º" or "121"
    pub number: String,
    pub content: String,
}

impl Article {
    pub fn new(number: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            content: content.into(),
        }
    }

    /// Text spoken for the article: its heading followed by the body.
    ///
    /// The result is raw; the engine normalizes it before narration.
    pub fn narration_text(&self) -> String {
        let number = self.number.trim();
        let content = self.content.trim();
        if number.is_empty() {
            return content.to_string();
        }
        format!("Artigo {}. {}", number, content)
    }
}

//! Text normalization for spoken legal text
//!
//! Rewrites statute idioms so a speech backend reads them naturally:
//! short Roman numerals become Portuguese cardinals, `art.`/`inc.`/`§`
//! are spelled out, emoji are dropped and spacing is tidied.
//!
//! Abbreviations are matched with optional whitespace before the dot
//! (`art .`, `Inc .`), since stray spaces are tidied away later and
//! would otherwise leave an unexpanded `art.` behind.
//!
//! The pass is pure and its output is a fixed point: normalizing an
//! already normalized string returns it unchanged.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

static EMOJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"[\x{1F600}-\x{1F64F}\x{1F300}-\x{1F5FF}\x{1F680}-\x{1F6FF}",
        r"\x{1F700}-\x{1F77F}\x{1F780}-\x{1F7FF}\x{1F800}-\x{1F8FF}",
        r"\x{1F900}-\x{1F9FF}\x{1FA00}-\x{1FA6F}\x{1FA70}-\x{1FAFF}",
        r"\x{2600}-\x{26FF}\x{2700}-\x{27BF}]",
    ))
    .expect("Invalid regex pattern")
});

static ROMAN_NUMERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(I{1,3})\b").expect("Invalid regex pattern"));

static ABBREVIATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(art|inc)\s*\.").expect("Invalid regex pattern"));

static PARAGRAPH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"§\s*(\d+)").expect("Invalid regex pattern"));

static WHITESPACE_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

static SPACE_BEFORE_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([.,;:!?])").expect("Invalid regex pattern"));

/// Normalize statute text for narration.
///
/// ```
/// use lexvox_spk::normalize_for_narration;
///
/// assert_eq!(
///     normalize_for_narration("art. 5º, inc. II"),
///     "artigo 5º, inciso dois"
/// );
/// assert_eq!(normalize_for_narration("§ 3 do caput"), "parágrafo 3 do caput");
/// ```
pub fn normalize_for_narration(text: &str) -> String {
    // Emoji go first so that stripping them can never glue together
    // fragments the later steps would have matched.
    let text = strip_emoji(text);
    let text = spell_roman_numerals(&text);
    let text = expand_abbreviations(&text);
    let text = collapse_whitespace(&text);
    tighten_punctuation(&text).into_owned()
}

/// Cardinal word for the Roman numerals read aloud; anything past III is
/// left for the backend.
pub fn roman_numeral_word(numeral: &str) -> Option<&'static str> {
    match numeral {
        "I" => Some("um"),
        "II" => Some("dois"),
        "III" => Some("três"),
        _ => None,
    }
}

fn strip_emoji(text: &str) -> Cow<'_, str> {
    EMOJI.replace_all(text, "")
}

fn spell_roman_numerals(text: &str) -> Cow<'_, str> {
    ROMAN_NUMERAL.replace_all(text, |caps: &Captures| {
        roman_numeral_word(&caps[1])
            .map(str::to_string)
            .unwrap_or_else(|| caps[0].to_string())
    })
}

fn expand_abbreviations(text: &str) -> String {
    let expanded = ABBREVIATION.replace_all(text, |caps: &Captures| {
        let word = if caps[1].eq_ignore_ascii_case("art") {
            "artigo"
        } else {
            "inciso"
        };
        // "art.5º" needs a separator once the dot is gone
        let end = caps.get(0).map_or(text.len(), |m| m.end());
        match text[end..].chars().next() {
            Some(next) if is_word_char(next) => format!("{} ", word),
            _ => word.to_string(),
        }
    });

    // "parágrafo único" and "caput" already read correctly and are left alone.
    PARAGRAPH
        .replace_all(&expanded, "parágrafo ${1}")
        .into_owned()
}

fn collapse_whitespace(text: &str) -> Cow<'_, str> {
    WHITESPACE_RUN.replace_all(text, " ")
}

fn tighten_punctuation(text: &str) -> Cow<'_, str> {
    SPACE_BEFORE_PUNCTUATION.replace_all(text, "${1}")
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

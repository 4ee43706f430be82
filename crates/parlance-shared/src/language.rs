//! Supported languages and the heuristic source-language detector used by
//! the translation gateway when no explicit source language is known.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParlanceError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ja,
    Ko,
    Zh,
    Es,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::En,
        Language::Ja,
        Language::Ko,
        Language::Zh,
        Language::Es,
    ];

    /// ISO 639-1 code, as used by the translation providers.
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ja => "ja",
            Language::Ko => "ko",
            Language::Zh => "zh",
            Language::Es => "es",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = ParlanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|lang| lang.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParlanceError::UnsupportedLanguage(s.to_string()))
    }
}

const SPANISH_MARKS: &[char] = &['á', 'é', 'í', 'ó', 'ú', 'ñ', 'ü', '¿', '¡'];

const SPANISH_WORDS: &[&str] = &[
    "hola", "gracias", "buenos", "dias", "noches", "si", "no", "muchas", "adios", "hasta",
    "luego", "que", "como", "estas", "bien", "mal", "mucho", "poco", "todo", "nada", "donde",
    "cuando", "quien", "porque",
];

fn is_hangul(c: char) -> bool {
    matches!(c, '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}' | '\u{AC00}'..='\u{D7AF}')
}

fn is_kana(c: char) -> bool {
    matches!(c, '\u{3040}'..='\u{309F}' | '\u{30A0}'..='\u{30FF}')
}

fn is_han(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}')
}

fn looks_spanish(text: &str) -> bool {
    let lower = text.to_lowercase();
    if lower.chars().any(|c| SPANISH_MARKS.contains(&c)) {
        return true;
    }

    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .collect();

    words.iter().any(|w| SPANISH_WORDS.contains(w))
        || words.windows(2).any(|pair| pair == ["por", "favor"])
}

/// Classify `text` into one of the supported languages.
///
/// Distinctive scripts are checked first (Hangul, then kana, then Han
/// ideographs without kana); Latin text is Spanish when it carries Spanish
/// diacritics or common Spanish words, and English otherwise.
pub fn detect_language(text: &str) -> Language {
    let has_kana = text.chars().any(is_kana);

    if text.chars().any(is_hangul) {
        Language::Ko
    } else if has_kana {
        Language::Ja
    } else if text.chars().any(is_han) {
        Language::Zh
    } else if looks_spanish(text) {
        Language::Es
    } else {
        Language::En
    }
}

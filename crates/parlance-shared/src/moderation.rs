use serde::{Deserialize, Serialize};

use crate::language::Language;

const ENGLISH_TERMS: &[&str] = &[
    "fuck", "shit", "bitch", "ass", "damn", "bastard", "crap", "dick", "pussy", "cock", "whore",
    "slut", "fag", "nigger",
];

const SPANISH_TERMS: &[&str] = &[
    "puta", "mierda", "coño", "joder", "cabrón", "pendejo", "chingada", "puto", "verga", "culo",
    "maricon", "mamón", "carajo", "pinche", "hijo de puta", "hija de puta", "me cago",
    "gilipollas",
];

const CHINESE_TERMS: &[&str] = &[
    "傻逼", "操", "妈的", "草泥马", "婊子", "狗屎", "他妈的", "妈逼", "贱人", "混蛋", "白痴",
    "蠢货", "笨蛋", "王八蛋", "去你妈", "滚", "废物", "垃圾", "臭婊子",
];

const JAPANESE_TERMS: &[&str] = &[
    "ばか", "バカ", "馬鹿", "くそ", "クソ", "糞", "しね", "シネ", "死ね", "あほ", "アホ", "阿呆",
    "ちくしょう", "チクショウ", "畜生", "きちがい", "キチガイ", "気違い", "ぶす", "ブス",
];

/// Why a message was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    Empty,
    Profanity { language: Language },
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::Empty => f.write_str("Message cannot be empty"),
            RejectReason::Profanity { .. } => {
                f.write_str("Message contains inappropriate language")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationVerdict {
    pub is_valid: bool,
    pub reason: Option<RejectReason>,
}

impl ModerationVerdict {
    fn pass() -> Self {
        Self {
            is_valid: true,
            reason: None,
        }
    }

    fn reject(reason: RejectReason) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason),
        }
    }
}

// Local word-list filter. Matching is plain substring matching, so a listed
// term inside a longer word also matches.
#[derive(Debug, Clone)]
pub struct ContentModerator {
    lists: Vec<(Language, Vec<String>)>,
}

impl ContentModerator {
    pub fn new() -> Self {
        let lists = [
            (Language::En, ENGLISH_TERMS),
            (Language::Es, SPANISH_TERMS),
            (Language::Zh, CHINESE_TERMS),
            (Language::Ja, JAPANESE_TERMS),
        ]
        .into_iter()
        .map(|(lang, terms)| (lang, terms.iter().map(|t| t.to_lowercase()).collect()))
        .collect();

        Self { lists }
    }

    /// Check a message before it is sent. Fails closed on blank input.
    pub fn validate(&self, text: &str) -> ModerationVerdict {
        if text.trim().is_empty() {
            return ModerationVerdict::reject(RejectReason::Empty);
        }

        match self.matching_language(text) {
            Some(language) => ModerationVerdict::reject(RejectReason::Profanity { language }),
            None => ModerationVerdict::pass(),
        }
    }

    pub fn contains_profanity(&self, text: &str) -> bool {
        self.matching_language(text).is_some()
    }

    /// Replace every listed term with one `*` per character.
    pub fn mask_profanity(&self, text: &str) -> String {
        let original: Vec<char> = text.chars().collect();
        let folded: Vec<char> = original.iter().map(|c| fold(*c)).collect();
        let mut masked = vec![false; original.len()];

        for term in self.lists.iter().flat_map(|(_, terms)| terms) {
            let needle: Vec<char> = term.chars().map(fold).collect();
            if needle.is_empty() || needle.len() > folded.len() {
                continue;
            }
            for start in 0..=folded.len() - needle.len() {
                if folded[start..start + needle.len()] == needle[..] {
                    masked[start..start + needle.len()].fill(true);
                }
            }
        }

        original
            .into_iter()
            .zip(masked)
            .map(|(c, hide)| if hide { '*' } else { c })
            .collect()
    }

    fn matching_language(&self, text: &str) -> Option<Language> {
        let lower = text.to_lowercase();
        self.lists
            .iter()
            .find(|(_, terms)| terms.iter().any(|t| lower.contains(t.as_str())))
            .map(|(lang, _)| *lang)
    }
}

impl Default for ContentModerator {
    fn default() -> Self {
        Self::new()
    }
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

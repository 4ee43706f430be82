//! Best-effort translation through two HTTP providers.
//!
//! The gateway never fails: when both providers come back empty-handed the
//! caller simply gets the original text.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use parlance_shared::{detect_language, Language, MessageId};

use crate::config::ChatConfig;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum TranslationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned no translation")]
    Empty,

    #[error("Unexpected provider response: {0}")]
    UnexpectedResponse(String),
}

#[async_trait]
pub trait TranslationProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, TranslationError>;
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(PROVIDER_TIMEOUT)
        .build()
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Providers
// ---------------------------------------------------------------------------

/// Google Translate's keyless `gtx` endpoint.
pub struct GoogleTranslateProvider {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleTranslateProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TranslationProvider for GoogleTranslateProvider {
    fn name(&self) -> &str {
        "google"
    }

    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, TranslationError> {
        let url = format!("{}/translate_a/single", self.base_url);
        let body: Value = self
            .client
            .get(url)
            .query(&[
                ("client", "gtx"),
                ("sl", source.code()),
                ("tl", target.code()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // The translation is the first segment of the first sentence block.
        let translated = body
            .get(0)
            .and_then(|sentences| sentences.get(0))
            .and_then(|segment| segment.get(0))
            .and_then(Value::as_str)
            .ok_or_else(|| TranslationError::UnexpectedResponse(truncate(&body)))?;

        if translated.trim().is_empty() {
            return Err(TranslationError::Empty);
        }
        Ok(translated.to_string())
    }
}

/// The MyMemory public API.
pub struct MyMemoryProvider {
    client: reqwest::Client,
    base_url: String,
}

impl MyMemoryProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TranslationProvider for MyMemoryProvider {
    fn name(&self) -> &str {
        "mymemory"
    }

    async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
    ) -> Result<String, TranslationError> {
        let url = format!("{}/get", self.base_url);
        let langpair = format!("{}|{}", source.code(), target.code());
        let body: Value = self
            .client
            .get(url)
            .query(&[("q", text), ("langpair", langpair.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        // responseStatus arrives as a number on success and sometimes as a
        // string on errors.
        let status = match body.get("responseStatus") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        };
        if status != Some(200) {
            return Err(TranslationError::UnexpectedResponse(truncate(&body)));
        }

        let translated = body
            .pointer("/responseData/translatedText")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if translated.trim().is_empty() {
            return Err(TranslationError::Empty);
        }
        Ok(translated.to_string())
    }
}

fn truncate(body: &Value) -> String {
    let mut s = body.to_string();
    if s.len() > 200 {
        let mut end = 200;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s.truncate(end);
    }
    s
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct TranslationGateway {
    primary: Arc<dyn TranslationProvider>,
    secondary: Arc<dyn TranslationProvider>,
}

impl TranslationGateway {
    pub fn new(
        primary: Arc<dyn TranslationProvider>,
        secondary: Arc<dyn TranslationProvider>,
    ) -> Self {
        Self { primary, secondary }
    }

    pub fn from_config(config: &ChatConfig) -> Self {
        Self::new(
            Arc::new(GoogleTranslateProvider::new(&config.primary_translate_url)),
            Arc::new(MyMemoryProvider::new(&config.secondary_translate_url)),
        )
    }

    /// Translate `text` into `target`.
    ///
    /// Without a source hint the source language is detected from the text.
    /// Blank text and text already in the target language come back
    /// unchanged without any provider call.
    pub async fn translate(
        &self,
        text: &str,
        target: Language,
        source_hint: Option<Language>,
    ) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        let source = source_hint.unwrap_or_else(|| detect_language(text));
        if source == target {
            return text.to_string();
        }

        for provider in [&self.primary, &self.secondary] {
            match provider.translate(text, source, target).await {
                Ok(translated) if !translated.trim().is_empty() => {
                    debug!(provider = provider.name(), %source, %target, "Translated");
                    return translated;
                }
                Ok(_) => warn!(provider = provider.name(), "Provider returned empty text"),
                Err(e) => warn!(provider = provider.name(), error = %e, "Translation failed"),
            }
        }

        warn!(%source, %target, "All translation providers failed, keeping original");
        text.to_string()
    }
}

/// Translations already produced during one subscription session.
#[derive(Debug, Default, Clone)]
pub struct TranslationCache {
    entries: HashMap<MessageId, String>,
}

impl TranslationCache {
    pub fn get(&self, id: &MessageId) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn insert(&mut self, id: MessageId, text: String) {
        self.entries.insert(id, text);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Background translations for one subscription.
///
/// Each message is translated at most once per queue; finished results land
/// in the queue's [`TranslationCache`].  Dropping the queue aborts whatever
/// is still running.
pub struct TranslationQueue {
    gateway: TranslationGateway,
    cache: TranslationCache,
    in_flight: HashSet<MessageId>,
    pending: JoinSet<(MessageId, String)>,
}

impl TranslationQueue {
    pub fn new(gateway: TranslationGateway) -> Self {
        Self {
            gateway,
            cache: TranslationCache::default(),
            in_flight: HashSet::new(),
            pending: JoinSet::new(),
        }
    }

    /// Start translating a message unless it is cached or already running.
    pub fn request(&mut self, id: &MessageId, text: &str, target: Language, hint: Option<Language>) {
        if self.cache.contains(id) || !self.in_flight.insert(id.clone()) {
            return;
        }

        let gateway = self.gateway.clone();
        let id = id.clone();
        let text = text.to_string();
        self.pending.spawn(async move {
            let translated = gateway.translate(&text, target, hint).await;
            (id, translated)
        });
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Wait for the next finished translation and cache it.  Returns `None`
    /// when nothing is left running.
    pub async fn finished(&mut self) -> Option<(MessageId, String)> {
        while let Some(joined) = self.pending.join_next().await {
            match joined {
                Ok((id, text)) => {
                    self.in_flight.remove(&id);
                    self.cache.insert(id.clone(), text.clone());
                    return Some((id, text));
                }
                Err(e) => warn!(error = %e, "Translation task failed"),
            }
        }
        None
    }

    pub fn get(&self, id: &MessageId) -> Option<&str> {
        self.cache.get(id)
    }
}

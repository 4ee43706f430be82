//! Chat-core configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the core can start with zero
//! configuration for local development.

use std::path::PathBuf;
use std::time::Duration;

use parlance_shared::constants::{
    EXPO_PUSH_URL, GOOGLE_TRANSLATE_URL, MYMEMORY_URL, PROFILE_LOAD_ATTEMPTS,
    PROFILE_RETRY_DELAY_MS,
};
use parlance_store::{Database, StoreError};

/// Chat-core configuration.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Base URL of the primary translation provider.
    /// Env: `PARLANCE_PRIMARY_TRANSLATE_URL`
    /// Default: `https://translate.googleapis.com`
    pub primary_translate_url: String,

    /// Base URL of the fallback translation provider.
    /// Env: `PARLANCE_SECONDARY_TRANSLATE_URL`
    /// Default: `https://api.mymemory.translated.net`
    pub secondary_translate_url: String,

    /// Push notification endpoint.
    /// Env: `PARLANCE_PUSH_URL`
    pub push_url: String,

    /// When false, notifications are dropped instead of sent.
    /// Env: `PARLANCE_PUSH_ENABLED` (true/false)
    /// Default: `true`
    pub push_enabled: bool,

    /// Attempts made by profile load right after signup.
    /// Env: `PARLANCE_PROFILE_LOAD_ATTEMPTS`
    /// Default: `3`
    pub profile_load_attempts: u32,

    /// Pause between profile load attempts.
    /// Env: `PARLANCE_PROFILE_RETRY_DELAY_MS`
    /// Default: `500`
    pub profile_retry_delay: Duration,

    /// Location of the SQLite store.
    /// Env: `PARLANCE_DATABASE_PATH`
    /// Default: the platform data directory.
    pub database_path: Option<PathBuf>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            primary_translate_url: GOOGLE_TRANSLATE_URL.to_string(),
            secondary_translate_url: MYMEMORY_URL.to_string(),
            push_url: EXPO_PUSH_URL.to_string(),
            push_enabled: true,
            profile_load_attempts: PROFILE_LOAD_ATTEMPTS,
            profile_retry_delay: Duration::from_millis(PROFILE_RETRY_DELAY_MS),
            database_path: None,
        }
    }
}

impl ChatConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults for any variable that is unset or unparseable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable
    /// source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup("PARLANCE_PRIMARY_TRANSLATE_URL") {
            config.primary_translate_url = val;
        }

        if let Some(val) = lookup("PARLANCE_SECONDARY_TRANSLATE_URL") {
            config.secondary_translate_url = val;
        }

        if let Some(val) = lookup("PARLANCE_PUSH_URL") {
            config.push_url = val;
        }

        if let Some(val) = lookup("PARLANCE_PUSH_ENABLED") {
            config.push_enabled = val != "false" && val != "0";
        }

        if let Some(val) = lookup("PARLANCE_PROFILE_LOAD_ATTEMPTS") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => config.profile_load_attempts = n,
                _ => {
                    tracing::warn!(
                        "Invalid PARLANCE_PROFILE_LOAD_ATTEMPTS '{}', using default {}",
                        val,
                        config.profile_load_attempts
                    );
                }
            }
        }

        if let Some(val) = lookup("PARLANCE_PROFILE_RETRY_DELAY_MS") {
            match val.parse::<u64>() {
                Ok(ms) => config.profile_retry_delay = Duration::from_millis(ms),
                Err(_) => {
                    tracing::warn!(
                        "Invalid PARLANCE_PROFILE_RETRY_DELAY_MS '{}', using default",
                        val
                    );
                }
            }
        }

        if let Some(val) = lookup("PARLANCE_DATABASE_PATH") {
            if !val.is_empty() {
                config.database_path = Some(PathBuf::from(val));
            }
        }

        config
    }

    /// Open the configured store.
    pub fn open_store(&self) -> Result<Database, StoreError> {
        match &self.database_path {
            Some(path) => Database::open_at(path),
            None => Database::new(),
        }
    }
}

use std::time::Duration;
use std::{env, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;

use crate::errors::{AppError, AppResult};

pub const DEFAULT_PLACES_API_BASE: &str = "https://maps.googleapis.com/maps/api/place";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_FALLBACK_MODELS: &[&str] = &["gemini-1.5-flash", "gemini-1.5-pro"];
const DEFAULT_RECORD_DELAY_MS: u64 = 2_000;
const DEFAULT_CHECKPOINT_EVERY: usize = 5;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub google_maps_api_key: Option<SecretString>,
    pub gemini_api_key: Option<SecretString>,
    pub places_api_base: String,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub gemini_fallback_models: Vec<String>,
    pub record_delay_ms: u64,
    pub checkpoint_every: usize,
    pub http_timeout_secs: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicAppConfig {
    pub places_api_base: String,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub gemini_fallback_models: Vec<String>,
    pub record_delay_ms: u64,
    pub checkpoint_every: usize,
    pub http_timeout_secs: u64,
    pub has_google_maps_key: bool,
    pub has_gemini_key: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            google_maps_api_key: None,
            gemini_api_key: None,
            places_api_base: DEFAULT_PLACES_API_BASE.to_string(),
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_fallback_models: DEFAULT_FALLBACK_MODELS
                .iter()
                .map(|model| model.to_string())
                .collect(),
            record_delay_ms: DEFAULT_RECORD_DELAY_MS,
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        let defaults = Self::default();
        Self {
            google_maps_api_key: parse_secret("GOOGLE_MAPS_API_KEY"),
            gemini_api_key: parse_secret("GEMINI_API_KEY"),
            places_api_base: parse_string("PLACES_API_BASE", defaults.places_api_base),
            gemini_api_base: parse_string("GEMINI_API_BASE", defaults.gemini_api_base),
            gemini_model: parse_string("GEMINI_MODEL", defaults.gemini_model),
            gemini_fallback_models: env::var("GEMINI_FALLBACK_MODELS")
                .ok()
                .map(|value| parse_model_list(&value))
                .unwrap_or(defaults.gemini_fallback_models),
            record_delay_ms: parse_u64("RECORD_DELAY_MS", defaults.record_delay_ms),
            checkpoint_every: parse_usize("CHECKPOINT_EVERY", defaults.checkpoint_every).max(1),
            http_timeout_secs: parse_u64("HTTP_TIMEOUT_SECS", defaults.http_timeout_secs).max(1),
        }
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            places_api_base: self.places_api_base.clone(),
            gemini_api_base: self.gemini_api_base.clone(),
            gemini_model: self.gemini_model.clone(),
            gemini_fallback_models: self.gemini_fallback_models.clone(),
            record_delay_ms: self.record_delay_ms,
            checkpoint_every: self.checkpoint_every,
            http_timeout_secs: self.http_timeout_secs,
            has_google_maps_key: self.google_maps_api_key.is_some(),
            has_gemini_key: self.gemini_api_key.is_some(),
        }
    }

    /// Returns both API keys, or a configuration error naming every missing one.
    pub fn require_credentials(&self) -> AppResult<(SecretString, SecretString)> {
        match (&self.google_maps_api_key, &self.gemini_api_key) {
            (Some(maps), Some(gemini)) => Ok((maps.clone(), gemini.clone())),
            (maps, gemini) => {
                let mut missing = Vec::new();
                if maps.is_none() {
                    missing.push("GOOGLE_MAPS_API_KEY");
                }
                if gemini.is_none() {
                    missing.push("GEMINI_API_KEY");
                }
                Err(AppError::Config(format!(
                    "missing API credentials: {}",
                    missing.join(", ")
                )))
            }
        }
    }

    /// Primary model first, then the fallbacks in order, without duplicates.
    pub fn model_chain(&self) -> Vec<String> {
        let mut chain: Vec<String> = Vec::with_capacity(1 + self.gemini_fallback_models.len());
        for model in std::iter::once(&self.gemini_model).chain(&self.gemini_fallback_models) {
            let model = model.trim();
            if !model.is_empty() && !chain.iter().any(|existing| existing == model) {
                chain.push(model.to_string());
            }
        }
        chain
    }

    pub fn record_delay(&self) -> Duration {
        Duration::from_millis(self.record_delay_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn load_dotenv_if_applicable() {
    if parse_bool("DISABLE_DOTENV", false) {
        debug!("skipping .env load");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn parse_model_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|model| !model.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_secret(key: &str) -> Option<SecretString> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| SecretString::from(v.trim().to_string()))
}

fn parse_string(key: &str, default: String) -> String {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

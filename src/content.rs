use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};

pub const TARGET_WORDS: usize = 200;
pub const MAX_WORDS: usize = 220;
const MAX_ERROR_BODY_CHARS: usize = 300;
const PROBE_PROMPT: &str = "Hello, this is a test message.";

/// Structured inputs for one About section.
#[derive(Debug, Clone, Copy)]
pub struct AboutRequest<'a> {
    pub name: &'a str,
    pub address: &'a str,
    pub telephone: Option<&'a str>,
    pub maps_url: Option<&'a str>,
    pub review_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedText {
    pub text: String,
    pub model: String,
}

#[async_trait]
pub trait TextGeneration: Send + Sync {
    /// Must return `AppError::ModelUnavailable` when the service does not
    /// know `model`, so the caller can move to the next one.
    async fn generate(&self, model: &str, prompt: &str) -> AppResult<String>;
}

#[derive(Clone)]
pub struct ContentGenerator {
    inner: Arc<dyn TextGeneration>,
    models: Vec<String>,
}

impl ContentGenerator {
    pub fn new(config: &AppConfig, api_key: SecretString) -> AppResult<Self> {
        let client = GeminiClient::new(config, api_key)?;
        Self::from_generation(Arc::new(client), config.model_chain())
    }

    pub fn from_generation(inner: Arc<dyn TextGeneration>, models: Vec<String>) -> AppResult<Self> {
        if models.is_empty() {
            return Err(AppError::Config("no text generation model configured".into()));
        }
        Ok(Self { inner, models })
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub async fn about_section(&self, request: &AboutRequest<'_>) -> AppResult<GeneratedText> {
        let prompt = build_about_prompt(request);
        let generated = self.generate_with_fallback(&prompt).await?;
        let text = clamp_words(generated.text.trim(), MAX_WORDS);
        if text.is_empty() {
            return Err(AppError::Generation(format!(
                "model `{}` returned an empty response",
                generated.model
            )));
        }
        debug!(
            model = %generated.model,
            words = text.split_whitespace().count(),
            "generated about section"
        );
        Ok(GeneratedText {
            text,
            model: generated.model,
        })
    }

    pub async fn probe(&self) -> AppResult<GeneratedText> {
        self.generate_with_fallback(PROBE_PROMPT).await
    }

    /// Only `ModelUnavailable` moves on to the next model; anything else
    /// surfaces immediately.
    async fn generate_with_fallback(&self, prompt: &str) -> AppResult<GeneratedText> {
        for model in &self.models {
            match self.inner.generate(model, prompt).await {
                Ok(text) => {
                    return Ok(GeneratedText {
                        text,
                        model: model.clone(),
                    })
                }
                Err(AppError::ModelUnavailable(name)) => {
                    warn!(model = %name, "model unavailable; trying next configured model");
                }
                Err(err) => return Err(err),
            }
        }
        Err(AppError::Generation(format!(
            "no configured model is available (tried: {})",
            self.models.join(", ")
        )))
    }
}

pub fn build_about_prompt(request: &AboutRequest<'_>) -> String {
    let mut details = format!(
        "- Business Name: {}\n- Location: {}\n",
        request.name.trim(),
        request.address.trim()
    );
    if let Some(phone) = request.telephone.filter(|v| !v.trim().is_empty()) {
        details.push_str(&format!("- Telephone: {}\n", phone.trim()));
    }
    if let Some(url) = request.maps_url.filter(|v| !v.trim().is_empty()) {
        details.push_str(&format!("- Google Maps listing: {}\n", url.trim()));
    }
    if let Some(score) = request.review_score {
        details.push_str(&format!("- Google Review Score: {score:.1}\n"));
    }

    format!(
        "Write a professional, engaging {TARGET_WORDS}-word 'About Us' section for a business \
with the following details:\n{details}\n\
The content should be informative, highlight the business's commitment to quality and \
customer service, and mention the review score only if it is 4.0 or higher. Keep the tone \
professional but warm. Do not invent details such as a founding year, specific services or \
team members that are not listed above. Reply with a single paragraph of plain prose: no \
headings, no bullet points and no placeholder text in brackets."
    )
}

/// Caps `text` at `limit` words, marking the cut with a trailing ellipsis.
pub fn clamp_words(text: &str, limit: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= limit {
        return words.join(" ");
    }
    format!("{}...", words[..limit].join(" "))
}

struct GeminiClient {
    http: reqwest::Client,
    api_key: SecretString,
    api_base: String,
}

impl GeminiClient {
    fn new(config: &AppConfig, api_key: SecretString) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()?;
        Ok(Self {
            http,
            api_key,
            api_base: config.gemini_api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[async_trait]
impl TextGeneration for GeminiClient {
    async fn generate(&self, model: &str, prompt: &str) -> AppResult<String> {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.7,
                top_p: 0.95,
                top_k: 40,
                max_output_tokens: 400,
            },
        };

        let response = self
            .http
            .post(format!("{}/models/{}:generateContent", self.api_base, model))
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(AppError::ModelUnavailable(model.to_string()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let excerpt: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(AppError::Generation(format!("HTTP {status}: {excerpt}")));
        }

        let parsed: GenerateResponse = response.json().await?;
        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(AppError::Generation(format!("prompt blocked: {reason}")));
        }
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .ok_or_else(|| AppError::Generation("response contained no candidates".into()))?;
        Ok(text)
    }
}

//! Gemini planner backend.
//!
//! Calls `models/{model}:generateContent` with a JSON response type. Each
//! model gets a bounded number of retries on transient errors before the next
//! model in the fallback list is tried.

use std::time::{Duration, Instant, SystemTime};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::planner::{PlannerConfig, PlannerError, PlannerRequest, SchedulePlanner};
use crate::metrics;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Fallback order used when `GEMINI_MODELS` is unset.
pub const DEFAULT_MODELS: [&str; 3] = ["gemini-2.5-flash", "gemini-2.5-flash-lite", "gemini-2.5-pro"];

/// Longest error body kept in a [`PlannerError::Http`].
const MAX_ERROR_BODY: usize = 500;

/// Gemini endpoint settings.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub models: Vec<String>,
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl GeminiConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let models: Vec<String> = std::env::var("GEMINI_MODELS")
            .map(|s| {
                s.split(',')
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            api_key: std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            models: if models.is_empty() { defaults.models } else { models },
            base_url: std::env::var("GEMINI_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    system_instruction: Content<'a>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate, parts concatenated.
    fn into_text(self) -> Option<(String, Option<String>)> {
        let candidate = self.candidates.into_iter().next()?;
        let text: String = candidate
            .content?
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect();
        if text.trim().is_empty() {
            return None;
        }
        Some((text, candidate.finish_reason))
    }
}

/// [`SchedulePlanner`] backed by the Gemini REST API.
pub struct GeminiPlanner {
    http: Client,
    config: GeminiConfig,
    planner: PlannerConfig,
}

impl GeminiPlanner {
    pub fn new(config: GeminiConfig, planner: PlannerConfig) -> Result<Self, PlannerError> {
        if config.api_key.is_none() {
            warn!("GEMINI_API_KEY not set; schedule builds will fail until it is configured");
        }

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PlannerError::Network(e.to_string()))?;

        Ok(Self { http, config, planner })
    }

    pub fn from_env() -> Result<Self, PlannerError> {
        Self::new(GeminiConfig::from_env(), PlannerConfig::from_env())
    }

    async fn call_model(
        &self,
        api_key: &str,
        model: &str,
        request: &PlannerRequest,
    ) -> Result<String, PlannerError> {
        let url = format!("{}/models/{}:generateContent", self.config.base_url, model);
        let body = GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: &request.user_prompt }],
            }],
            system_instruction: Content {
                role: None,
                parts: vec![Part { text: &request.system_prompt }],
            },
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                max_output_tokens: request.max_tokens,
                temperature: request.temperature,
            },
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PlannerError::Timeout(self.planner.timeout)
                } else {
                    PlannerError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| PlannerError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(PlannerError::Http {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| PlannerError::InvalidResponse(e.to_string()))?;
        let (text, finish_reason) = parsed.into_text().ok_or(PlannerError::EmptyResponse)?;

        if finish_reason.as_deref() == Some("MAX_TOKENS") {
            warn!(model, "Gemini output hit the token limit and may be truncated");
        }
        Ok(text)
    }

    /// Call one model, retrying transient failures with backoff.
    async fn call_with_retry(
        &self,
        api_key: &str,
        model: &str,
        request: &PlannerRequest,
    ) -> Result<String, PlannerError> {
        let mut attempt = 0;
        loop {
            let start = Instant::now();
            let result = tokio::time::timeout(self.planner.timeout, self.call_model(api_key, model, request))
                .await
                .unwrap_or(Err(PlannerError::Timeout(self.planner.timeout)));

            let outcome = match &result {
                Ok(_) => "success",
                Err(e) if e.is_transient() => "transient_error",
                Err(_) => "error",
            };
            metrics::record_planner_call(model, outcome, start.elapsed().as_secs_f64());

            match result {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.planner.max_retries => {
                    attempt += 1;
                    let delay = with_jitter(self.planner.backoff(attempt));
                    warn!(
                        model,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient planner error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl SchedulePlanner for GeminiPlanner {
    async fn plan(&self, request: PlannerRequest) -> Result<String, PlannerError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| PlannerError::NotConfigured("GEMINI_API_KEY is not set".to_string()))?;

        let mut last_error = None;
        for model in &self.config.models {
            info!(model = %model, "Requesting schedule plan from Gemini");
            match self.call_with_retry(api_key, model, &request).await {
                Ok(text) => {
                    info!(model = %model, chars = text.len(), "Gemini returned a plan");
                    return Ok(text);
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "Gemini model failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(PlannerError::Exhausted(Box::new(
            last_error.unwrap_or_else(|| PlannerError::NotConfigured("no Gemini models configured".to_string())),
        )))
    }
}

/// Add up to 25% of `delay` using the clock's sub-second nanos.
fn with_jitter(delay: Duration) -> Duration {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    delay + delay.mul_f64((nanos % 1000) as f64 / 4000.0)
}

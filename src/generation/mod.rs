//! Abstractions for issuing analysis prompts to a generative text service.
//!
//! The pipeline talks to the model exclusively through [`GenerationClient`], one call per
//! metric per attempt. The Gemini adapter issues `generateContent` requests directly over HTTP
//! and returns the candidate text untouched; JSON repair happens in the processing layer.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced while requesting a generation.
#[derive(Debug, Error)]
pub enum GenerationClientError {
    /// Provider could not be reached.
    #[error("Generation provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate content: {0}")]
    GenerationFailed(String),
    /// Provider response could not be decoded.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Sampling temperature.
    pub temperature: f32,
    /// Top-k sampling cutoff.
    pub top_k: u32,
    /// Nucleus sampling cutoff.
    pub top_p: f32,
    /// Upper bound on generated tokens.
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_k: 40,
            top_p: 0.8,
            max_output_tokens: 2048,
        }
    }
}

/// Request payload passed to the generation provider.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Instruction text assembled by the analysis driver.
    pub prompt: String,
    /// Fixed sampling configuration.
    pub config: GenerationConfig,
}

/// Interface implemented by generative text providers.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate a textual completion for the prompt.
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError>;
}

/// Build the Gemini-backed client described by the configuration.
pub fn get_generation_client(
    config: &Config,
) -> Result<Arc<dyn GenerationClient>, GenerationClientError> {
    let client = GeminiClient::new(
        config.gemini_base_url.clone(),
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    )?;
    Ok(Arc::new(client))
}

/// HTTP client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    /// Create a client targeting `base_url` with the given credential and model.
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
    ) -> Result<Self, GenerationClientError> {
        let http = Client::builder()
            .user_agent("docinsight/analysis")
            .build()
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to construct HTTP client: {error}"
                ))
            })?;
        tracing::debug!(base_url = %base_url, model = %model, "Initialized Gemini client");
        Ok(Self {
            http,
            base_url,
            api_key,
            model,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: [GeminiContent<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: [GeminiPart<'a>; 1],
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationClientError> {
        let payload = GeminiRequest {
            contents: [GeminiContent {
                parts: [GeminiPart {
                    text: &request.prompt,
                }],
            }],
            generation_config: request.config,
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                GenerationClientError::ProviderUnavailable(format!(
                    "failed to reach Gemini at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GenerationClientError::ProviderUnavailable(format!(
                "Gemini endpoint {} returned 404",
                self.endpoint()
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationClientError::GenerationFailed(format!(
                "Gemini returned {status}: {body}"
            )));
        }

        let body: GeminiResponse = response.json().await.map_err(|error| {
            GenerationClientError::InvalidResponse(format!(
                "failed to decode Gemini response: {error}"
            ))
        })?;

        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenerationClientError::InvalidResponse(
                "Gemini response contained no candidate text".into(),
            ));
        }

        Ok(text)
    }
}

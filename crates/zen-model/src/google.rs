// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    catalog::ModelCapability,
    error::ProviderError,
    provider::ModelProvider,
    retry::{with_retries, RetryPolicy},
    types::{GenerateRequest, GenerateResponse, ThinkingMode, Usage},
};

const GOOGLE_API_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini thinking budgets differ per model tier; Pro gets the larger one.
const PRO_MAX_THINKING_TOKENS: u32 = 32_768;
const FLASH_MAX_THINKING_TOKENS: u32 = 24_576;

pub struct GoogleDriver {
    api_key: String,
    base_url: String,
    models: Vec<ModelCapability>,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl GoogleDriver {
    pub fn new(api_key: String, models: Vec<ModelCapability>) -> Self {
        Self {
            api_key,
            base_url: GOOGLE_API_URL.into(),
            models,
            retry: RetryPolicy::default(),
            client: reqwest::Client::new(),
        }
    }

    fn resolve(&self, name: &str) -> Option<&ModelCapability> {
        let lower = name.to_lowercase();
        self.models
            .iter()
            .find(|m| m.id.to_lowercase() == lower)
            .or_else(|| {
                self.models
                    .iter()
                    .find(|m| m.aliases.iter().any(|a| a.to_lowercase() == lower))
            })
    }

    fn thinking_budget(model: &ModelCapability, mode: ThinkingMode) -> u32 {
        let max = if model.id.contains("pro") {
            PRO_MAX_THINKING_TOKENS
        } else {
            FLASH_MAX_THINKING_TOKENS
        };
        (max as f32 * mode.budget_fraction()) as u32
    }

    /// Assemble the `generateContent` request body.
    ///
    /// Returns `(canonical_model, body)`.
    pub(crate) fn build_body(
        &self,
        request: &GenerateRequest,
    ) -> Result<(String, Value), ProviderError> {
        let model = self.resolve(&request.model).ok_or_else(|| {
            ProviderError::InvalidRequest(format!(
                "model '{}' is not served by the google driver",
                request.model
            ))
        })?;

        if !request.images.is_empty() && !model.supports_vision {
            return Err(ProviderError::Unsupported {
                model: model.id.clone(),
                feature: "vision".into(),
            });
        }

        let mut parts = vec![json!({ "text": request.prompt })];
        for img in &request.images {
            let (mime, data) = img.mime_and_data();
            parts.push(json!({
                "inline_data": { "mime_type": mime, "data": data }
            }));
        }

        let temperature = model
            .temperature
            .clamp(request.temperature.unwrap_or_else(|| model.temperature.default_value()));
        let max_out = request
            .max_output_tokens
            .unwrap_or(model.max_output_tokens)
            .min(model.max_output_tokens);

        let mut generation_config = json!({
            "temperature": temperature,
            "maxOutputTokens": max_out,
        });
        // Thinking budget only applies to models that expose it; for the
        // rest the field is silently dropped rather than rejected.
        if model.supports_thinking {
            let mode = request.thinking.unwrap_or_default();
            generation_config["thinkingConfig"] = json!({
                "thinkingBudget": Self::thinking_budget(model, mode),
            });
        }

        let mut body = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": generation_config,
        });
        if let Some(system) = &request.system {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }

        Ok((model.id.clone(), body))
    }

    /// Parse a `generateContent` response.
    pub(crate) fn parse_response(
        &self,
        canonical: &str,
        body: &Value,
    ) -> Result<GenerateResponse, ProviderError> {
        if let Some(reason) = body["promptFeedback"]["blockReason"].as_str() {
            return Err(ProviderError::SafetyBlocked {
                reason: reason.to_string(),
            });
        }

        let candidate = body["candidates"].get(0).ok_or_else(|| {
            ProviderError::Transient("google returned no candidates".to_string())
        })?;

        if candidate["finishReason"].as_str() == Some("SAFETY") {
            return Err(ProviderError::SafetyBlocked {
                reason: "SAFETY".into(),
            });
        }

        let content = candidate["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let input = body["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0) as u32;
        let output = body["usageMetadata"]["candidatesTokenCount"]
            .as_u64()
            .unwrap_or(0) as u32;

        let mut metadata = serde_json::Map::new();
        if let Some(reason) = candidate["finishReason"].as_str() {
            metadata.insert("finish_reason".into(), json!(reason));
        }
        if let Some(thinking) = body["usageMetadata"]["thoughtsTokenCount"].as_u64() {
            metadata.insert("thinking_tokens".into(), json!(thinking));
        }

        Ok(GenerateResponse {
            content,
            usage: Usage::new(input, output),
            model: canonical.to_string(),
            provider: "google".into(),
            metadata,
        })
    }

    async fn attempt(&self, canonical: &str, body: &Value) -> Result<GenerateResponse, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, canonical
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("google request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status("google", status.as_u16(), text));
        }

        let parsed: Value = response.json().await.map_err(|e| {
            ProviderError::Transient(format!("google returned unparseable body: {e}"))
        })?;

        self.parse_response(canonical, &parsed)
    }
}

#[async_trait]
impl ModelProvider for GoogleDriver {
    fn tag(&self) -> &str {
        "google"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        let (canonical, body) = self.build_body(&request)?;
        debug!(
            model = %canonical,
            thinking = ?request.thinking,
            images = request.images.len(),
            "sending generateContent request"
        );
        let policy = self.retry.with_thinking(request.thinking);
        with_retries("google", policy, || self.attempt(&canonical, &body)).await
    }

    fn supports_model(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    fn capabilities(&self, name: &str) -> Option<ModelCapability> {
        self.resolve(name).cloned()
    }

    fn known_models(&self) -> Vec<ModelCapability> {
        self.models.clone()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Shared driver for every OpenAI-compatible chat completions API.
//!
//! Four of the configured backends speak the same `/chat/completions` wire
//! format: OpenAI itself, X.AI, the OpenRouter aggregator and any local
//! custom endpoint (Ollama, vLLM, LM Studio).  This module provides a single
//! driver that each of them configures with its own URL, auth and catalogue
//! slice.
//!
//! Alias handling is load-bearing here: the outbound request's `model` field
//! must always carry the canonical name.  Sending a shorthand like `mini`
//! to the upstream API is a 404 at best and a silently wrong model at
//! worst, so [`OpenAiCompatDriver::build_body`] resolves before it
//! serializes and the wire tests pin that down.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    catalog::ModelCapability,
    error::ProviderError,
    provider::ModelProvider,
    retry::{with_retries, RetryPolicy},
    types::{GenerateRequest, GenerateResponse, Usage},
};

pub(crate) struct OpenAiCompatDriver {
    tag: &'static str,
    api_key: Option<String>,
    chat_url: String,
    extra_headers: Vec<(String, String)>,
    /// Catalogue slice this driver owns.
    models: Vec<ModelCapability>,
    /// Aggregator behaviour: accept any model name and forward it verbatim.
    accepts_any_model: bool,
    retry: RetryPolicy,
    client: reqwest::Client,
}

const OPENAI_API_URL: &str = "https://api.openai.com/v1";
const XAI_API_URL: &str = "https://api.x.ai/v1";
const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1";

impl OpenAiCompatDriver {
    pub fn openai(api_key: String, models: Vec<ModelCapability>) -> Self {
        Self::new("openai", Some(api_key), OPENAI_API_URL, vec![], models, false)
    }

    pub fn xai(api_key: String, models: Vec<ModelCapability>) -> Self {
        Self::new("xai", Some(api_key), XAI_API_URL, vec![], models, false)
    }

    /// OpenRouter is the catch-all: any model name the native drivers do not
    /// own is forwarded to it verbatim.
    pub fn openrouter(api_key: String, models: Vec<ModelCapability>) -> Self {
        let headers = vec![
            ("HTTP-Referer".to_string(), "https://github.com/zen-mcp/zen".to_string()),
            ("X-Title".to_string(), "zen".to_string()),
        ];
        Self::new("openrouter", Some(api_key), OPENROUTER_API_URL, headers, models, true)
    }

    /// Local OpenAI-compatible endpoint; most need no key.
    pub fn custom(base_url: &str, api_key: Option<String>, models: Vec<ModelCapability>) -> Self {
        Self::new("custom", api_key, base_url, vec![], models, true)
    }

    fn new(
        tag: &'static str,
        api_key: Option<String>,
        base_url: &str,
        extra_headers: Vec<(String, String)>,
        models: Vec<ModelCapability>,
        accepts_any_model: bool,
    ) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            tag,
            api_key,
            chat_url: format!("{base}/chat/completions"),
            extra_headers,
            models,
            accepts_any_model,
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

    /// Assemble the outbound request body.
    ///
    /// Returns `(canonical_model, body)`.  Catalogued names are resolved to
    /// their canonical form; unknown names are forwarded verbatim only when
    /// this driver is a catch-all.
    pub(crate) fn build_body(
        &self,
        request: &GenerateRequest,
    ) -> Result<(String, Value), ProviderError> {
        let capability = self.resolve(&request.model);
        let canonical = match &capability {
            Some(m) => m.id.clone(),
            None if self.accepts_any_model => request.model.clone(),
            None => {
                return Err(ProviderError::InvalidRequest(format!(
                    "model '{}' is not served by the {} driver",
                    request.model, self.tag
                )))
            }
        };

        if !request.images.is_empty() && !capability.map(|m| m.supports_vision).unwrap_or(false) {
            return Err(ProviderError::Unsupported {
                model: canonical,
                feature: "vision".into(),
            });
        }

        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        if request.images.is_empty() {
            messages.push(json!({ "role": "user", "content": request.prompt }));
        } else {
            let mut parts = vec![json!({ "type": "text", "text": request.prompt })];
            for img in &request.images {
                parts.push(json!({
                    "type": "image_url",
                    "image_url": { "url": img.data_url }
                }));
            }
            messages.push(json!({ "role": "user", "content": parts }));
        }

        let mut body = json!({
            "model": canonical,
            "messages": messages,
            "stream": false,
        });

        if let Some(m) = capability {
            let temperature = m
                .temperature
                .clamp(request.temperature.unwrap_or_else(|| m.temperature.default_value()));
            body["temperature"] = json!(temperature);

            let max_out = request
                .max_output_tokens
                .unwrap_or(m.max_output_tokens)
                .min(m.max_output_tokens);
            // OpenAI renamed the field for its reasoning models; the old key
            // is rejected there, the new key is rejected elsewhere.
            let max_tokens_key = if self.tag == "openai" {
                "max_completion_tokens"
            } else {
                "max_tokens"
            };
            body[max_tokens_key] = json!(max_out);
        } else {
            if let Some(t) = request.temperature {
                body["temperature"] = json!(t);
            }
            if let Some(max_out) = request.max_output_tokens {
                body["max_tokens"] = json!(max_out);
            }
        }

        Ok((canonical, body))
    }

    /// Parse the upstream response body into a [`GenerateResponse`].
    pub(crate) fn parse_response(
        &self,
        canonical: &str,
        body: &Value,
    ) -> Result<GenerateResponse, ProviderError> {
        let choice = body["choices"]
            .get(0)
            .ok_or_else(|| ProviderError::Transient(format!("{} returned no choices", self.tag)))?;

        let finish_reason = choice["finish_reason"].as_str().unwrap_or("");
        if finish_reason == "content_filter" {
            return Err(ProviderError::SafetyBlocked {
                reason: "content_filter".into(),
            });
        }

        let content = choice["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        let input = body["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32;
        let output = body["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32;

        let mut metadata = serde_json::Map::new();
        if !finish_reason.is_empty() {
            metadata.insert("finish_reason".into(), json!(finish_reason));
        }
        if let Some(id) = body["id"].as_str() {
            metadata.insert("upstream_id".into(), json!(id));
        }

        Ok(GenerateResponse {
            content,
            // Some gateways report a total that disagrees with the parts;
            // recompute so input + output == total always holds.
            usage: Usage::new(input, output),
            model: canonical.to_string(),
            provider: self.tag.to_string(),
            metadata,
        })
    }

    async fn attempt(&self, canonical: &str, body: &Value) -> Result<GenerateResponse, ProviderError> {
        let mut http = self.client.post(&self.chat_url).json(body);
        if let Some(key) = &self.api_key {
            http = http.bearer_auth(key);
        }
        for (name, value) in &self.extra_headers {
            http = http.header(name.as_str(), value.as_str());
        }

        let response = http
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("{} request failed: {e}", self.tag)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(self.tag, status.as_u16(), text));
        }

        let parsed: Value = response.json().await.map_err(|e| {
            ProviderError::Transient(format!("{} returned unparseable body: {e}", self.tag))
        })?;

        self.parse_response(canonical, &parsed)
    }
}

#[async_trait]
impl ModelProvider for OpenAiCompatDriver {
    fn tag(&self) -> &str {
        self.tag
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        let (canonical, body) = self.build_body(&request)?;
        debug!(
            provider = self.tag,
            model = %canonical,
            prompt_chars = request.prompt.len(),
            images = request.images.len(),
            "sending chat completion request"
        );
        let policy = self.retry.with_thinking(request.thinking);
        with_retries(self.tag, policy, || self.attempt(&canonical, &body)).await
    }

    fn supports_model(&self, name: &str) -> bool {
        self.accepts_any_model || self.resolve(name).is_some()
    }

    fn capabilities(&self, name: &str) -> Option<ModelCapability> {
        self.resolve(name).cloned()
    }

    fn known_models(&self) -> Vec<ModelCapability> {
        self.models.clone()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

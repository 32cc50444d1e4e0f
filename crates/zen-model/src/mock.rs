// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
    catalog::{ModelCapability, ModelCategory, TemperatureConstraint},
    error::ProviderError,
    provider::ModelProvider,
    types::{GenerateRequest, GenerateResponse, Usage},
};

/// Capability record for the default mock model.
pub fn mock_capability() -> ModelCapability {
    ModelCapability {
        id: "mock-model".into(),
        name: "Mock".into(),
        provider: "mock".into(),
        context_window: 32_768,
        max_output_tokens: 4_096,
        supports_thinking: false,
        supports_vision: true,
        max_image_bytes: 1024 * 1024,
        temperature: TemperatureConstraint::default(),
        aliases: vec!["mock".into()],
        category: ModelCategory::Fast,
        description: "Deterministic in-process driver for tests".into(),
    }
}

/// Deterministic mock driver.  Echoes the prompt back as the response.
#[derive(Default)]
pub struct MockDriver;

#[async_trait]
impl ModelProvider for MockDriver {
    fn tag(&self) -> &str {
        "mock"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        Ok(GenerateResponse {
            content: format!("MOCK: {}", request.prompt),
            usage: Usage::new(10, 10),
            model: "mock-model".into(),
            provider: "mock".into(),
            metadata: serde_json::Map::new(),
        })
    }

    fn supports_model(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case("mock-model") || name.eq_ignore_ascii_case("mock")
    }

    fn capabilities(&self, name: &str) -> Option<ModelCapability> {
        self.supports_model(name).then(mock_capability)
    }

    fn known_models(&self) -> Vec<ModelCapability> {
        vec![mock_capability()]
    }
}

/// A pre-scripted mock driver.  Each `generate` call pops the next outcome
/// from the front of the queue, so tests can specify exact response and
/// error sequences without network access.  The last request is captured
/// for inspection.
pub struct ScriptedMockDriver {
    tag: &'static str,
    models: Vec<ModelCapability>,
    /// Aggregator behaviour: claim every model name.
    catch_all: bool,
    scripts: Mutex<Vec<Result<GenerateResponse, ProviderError>>>,
    /// The most recent [`GenerateRequest`] seen by this driver.
    pub last_request: Arc<Mutex<Option<GenerateRequest>>>,
}

impl ScriptedMockDriver {
    pub fn new(scripts: Vec<Result<GenerateResponse, ProviderError>>) -> Self {
        Self {
            tag: "mock",
            models: vec![mock_capability()],
            catch_all: false,
            scripts: Mutex::new(scripts),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Convenience: a driver that always answers with `content`.
    pub fn always_text(content: impl Into<String>) -> Self {
        let content = content.into();
        let response = GenerateResponse {
            content,
            usage: Usage::new(5, 5),
            model: "mock-model".into(),
            provider: "mock".into(),
            metadata: serde_json::Map::new(),
        };
        Self::new(vec![Ok(response)])
    }

    /// Override the models this mock claims to serve (for router tests).
    pub fn with_models(mut self, models: Vec<ModelCapability>) -> Self {
        self.models = models;
        self
    }

    /// Override the driver tag (for router priority tests).
    pub fn with_tag(mut self, tag: &'static str) -> Self {
        self.tag = tag;
        self
    }

    /// Claim every model name, like the aggregator gateway does.
    pub fn with_catch_all(mut self) -> Self {
        self.catch_all = true;
        self
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
}

#[async_trait]
impl ModelProvider for ScriptedMockDriver {
    fn tag(&self) -> &str {
        self.tag
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError> {
        *self.last_request.lock().unwrap() = Some(request);
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.is_empty() {
            // Fallback when all scripts are consumed.
            return Ok(GenerateResponse {
                content: "[no more scripts]".into(),
                usage: Usage::new(1, 1),
                model: "mock-model".into(),
                provider: self.tag.into(),
                metadata: serde_json::Map::new(),
            });
        }
        scripts.remove(0)
    }

    fn supports_model(&self, name: &str) -> bool {
        self.catch_all || self.resolve(name).is_some()
    }

    fn capabilities(&self, name: &str) -> Option<ModelCapability> {
        self.resolve(name).cloned()
    }

    fn known_models(&self) -> Vec<ModelCapability> {
        self.models.clone()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

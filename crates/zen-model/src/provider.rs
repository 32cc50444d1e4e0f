// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use crate::{
    catalog::ModelCapability,
    error::ProviderError,
    types::{GenerateRequest, GenerateResponse},
};

/// Uniform surface every provider driver implements.
///
/// Drivers are constructed once at startup from configuration and held for
/// the process lifetime; all methods take `&self`.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Stable driver tag ("google", "openai", "xai", "openrouter", "custom").
    fn tag(&self) -> &str;

    /// Run one whole (non-streamed) completion.
    ///
    /// The driver resolves aliases to canonical names, validates the
    /// temperature against the model's constraint, applies the thinking
    /// budget only when supported, rejects images on text-only models, and
    /// retries rate limits / transient failures internally.
    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ProviderError>;

    /// Estimate the token count of `text` for `model`.
    ///
    /// The default is the ⌈chars/4⌉ heuristic used throughout the server;
    /// drivers with a real tokenizer may override.  Must be monotone in
    /// text length.
    fn count_tokens(&self, text: &str, _model: &str) -> usize {
        text.len().div_ceil(4).max(1)
    }

    /// True iff this driver owns a model that `name` resolves to.
    fn supports_model(&self, name: &str) -> bool;

    /// Capability record for a model this driver owns.
    fn capabilities(&self, name: &str) -> Option<ModelCapability>;

    /// Every capability this driver serves, declaration order.
    fn known_models(&self) -> Vec<ModelCapability>;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

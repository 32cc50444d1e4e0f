// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
pub mod catalog;
pub mod error;
pub mod mock;
pub mod retry;
pub mod router;
mod google;
mod openai_compat;
mod provider;
mod types;

pub use catalog::{Catalog, CatalogError, ModelCapability, ModelCategory, TemperatureConstraint};
pub use error::{ProviderError, RouteError};
pub use google::GoogleDriver;
pub use mock::{MockDriver, ScriptedMockDriver};
pub use provider::ModelProvider;
pub use retry::RetryPolicy;
pub use router::{PickedModel, ProviderRouter};
pub use types::{GenerateRequest, GenerateResponse, ImageData, ThinkingMode, Usage};

use std::sync::Arc;

use tracing::info;

use openai_compat::OpenAiCompatDriver;
use zen_config::Config;

/// Capability synthesized for a custom endpoint model the user did not
/// catalogue.  Conservative defaults: modest window, text only.
fn synthetic_custom_capability(name: &str) -> ModelCapability {
    ModelCapability {
        id: name.to_string(),
        name: name.to_string(),
        provider: "custom".into(),
        context_window: 32_768,
        max_output_tokens: 8_192,
        supports_thinking: false,
        supports_vision: false,
        max_image_bytes: 0,
        temperature: TemperatureConstraint::default(),
        aliases: Vec::new(),
        category: ModelCategory::Balanced,
        description: "Custom endpoint model".into(),
    }
}

/// Build the provider router from configuration.
///
/// One driver per present credential, registered in priority order:
/// native vendors (google, openai, xai) first, then the custom local
/// endpoint, then the OpenRouter aggregator as catch-all.  Refuses to start
/// when nothing is configured.
pub fn build_router(config: &Config) -> anyhow::Result<ProviderRouter> {
    let catalog = match &config.custom_models_path {
        Some(path) => Catalog::with_custom(path)?,
        None => Catalog::builtin(),
    };

    let mut providers: Vec<Arc<dyn ModelProvider>> = Vec::new();

    if let Some(key) = &config.providers.gemini_api_key {
        let models = owned_models(&catalog, "google");
        providers.push(Arc::new(GoogleDriver::new(key.clone(), models)));
        info!("registered google driver");
    }
    if let Some(key) = &config.providers.openai_api_key {
        let models = owned_models(&catalog, "openai");
        providers.push(Arc::new(OpenAiCompatDriver::openai(key.clone(), models)));
        info!("registered openai driver");
    }
    if let Some(key) = &config.providers.xai_api_key {
        let models = owned_models(&catalog, "xai");
        providers.push(Arc::new(OpenAiCompatDriver::xai(key.clone(), models)));
        info!("registered xai driver");
    }
    if let Some(url) = &config.providers.custom_api_url {
        let mut models = owned_models(&catalog, "custom");
        if models.is_empty() {
            if let Some(name) = &config.providers.custom_model_name {
                models.push(synthetic_custom_capability(name));
            }
        }
        providers.push(Arc::new(OpenAiCompatDriver::custom(
            url,
            config.providers.custom_api_key.clone(),
            models,
        )));
        info!(url = %url, "registered custom endpoint driver");
    }
    if let Some(key) = &config.providers.openrouter_api_key {
        let models = owned_models(&catalog, "openrouter");
        providers.push(Arc::new(OpenAiCompatDriver::openrouter(key.clone(), models)));
        info!("registered openrouter driver");
    }

    let mut allow_lists: Vec<(&str, &[String])> = Vec::new();
    for tag in ["google", "openai", "xai", "openrouter"] {
        if let Some(list) = config.allowed_models(tag) {
            allow_lists.push((tag, list));
        }
    }

    Ok(ProviderRouter::new(providers, catalog, &allow_lists)?)
}

fn owned_models(catalog: &Catalog, provider: &str) -> Vec<ModelCapability> {
    catalog
        .models_for_provider(provider)
        .into_iter()
        .cloned()
        .collect()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(f: impl FnOnce(&mut Config)) -> Config {
        let mut cfg = Config::default();
        f(&mut cfg);
        cfg
    }

    #[test]
    fn no_credentials_refuses_to_build() {
        let err = build_router(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("no providers configured"));
    }

    #[test]
    fn single_native_credential_builds_router() {
        let cfg = config_with(|c| c.providers.gemini_api_key = Some("k".into()));
        let router = build_router(&cfg).unwrap();
        assert_eq!(router.providers().len(), 1);
        assert_eq!(router.providers()[0].tag(), "google");
    }

    #[test]
    fn custom_url_alone_builds_router() {
        let cfg = config_with(|c| {
            c.providers.custom_api_url = Some("http://localhost:11434/v1".into());
            c.providers.custom_model_name = Some("llama3.2".into());
        });
        let router = build_router(&cfg).unwrap();
        assert_eq!(router.providers()[0].tag(), "custom");
        // The synthesized capability makes the model routable.
        assert!(router.pick("llama3.2").is_ok());
    }

    #[test]
    fn aggregator_registers_last() {
        let cfg = config_with(|c| {
            c.providers.openai_api_key = Some("k1".into());
            c.providers.openrouter_api_key = Some("k2".into());
            c.providers.custom_api_url = Some("http://localhost:8000/v1".into());
        });
        let router = build_router(&cfg).unwrap();
        let tags: Vec<&str> = router.providers().iter().map(|p| p.tag()).collect();
        assert_eq!(tags, ["openai", "custom", "openrouter"]);
    }

    #[test]
    fn native_registration_order_is_google_openai_xai() {
        let cfg = config_with(|c| {
            c.providers.gemini_api_key = Some("a".into());
            c.providers.openai_api_key = Some("b".into());
            c.providers.xai_api_key = Some("c".into());
        });
        let router = build_router(&cfg).unwrap();
        let tags: Vec<&str> = router.providers().iter().map(|p| p.tag()).collect();
        assert_eq!(tags, ["google", "openai", "xai"]);
    }

    #[test]
    fn unresolvable_restriction_entry_does_not_abort_startup() {
        let cfg = config_with(|c| {
            c.providers.openai_api_key = Some("k".into());
            c.restrictions.openai = Some(vec!["model-that-does-not-exist".into()]);
        });
        assert!(build_router(&cfg).is_ok());
    }
}

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Provider registry and model routing.
//!
//! Drivers are held in a fixed priority order: native vendors in
//! registration order, then the custom local endpoint, then the aggregator
//! catch-all.  Model resolution walks that order and returns the first
//! driver that owns the name; allow-list restrictions are enforced before a
//! driver is handed out.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::{
    catalog::{Catalog, ModelCapability, ModelCategory},
    error::RouteError,
    provider::ModelProvider,
};

/// A resolved route: the driver plus the canonical model name to send.
#[derive(Clone)]
pub struct PickedModel {
    pub provider: Arc<dyn ModelProvider>,
    /// Canonical name when the catalogue knows the model; the caller's
    /// verbatim name for catch-all routes.
    pub canonical: String,
}

impl std::fmt::Debug for PickedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickedModel")
            .field("provider", &self.provider.tag())
            .field("canonical", &self.canonical)
            .finish()
    }
}

/// Read-only after construction; shared freely across invocations.
pub struct ProviderRouter {
    providers: Vec<Arc<dyn ModelProvider>>,
    catalog: Catalog,
    /// Per-provider allow-lists, pre-lowered; key absent = unrestricted.
    restrictions: HashMap<String, HashSet<String>>,
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRouter")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.tag()).collect::<Vec<_>>(),
            )
            .field("catalog", &self.catalog)
            .field("restrictions", &self.restrictions)
            .finish()
    }
}

impl ProviderRouter {
    /// Assemble a router from drivers (already in priority order), the
    /// catalogue, and per-provider allow-lists.
    pub fn new(
        providers: Vec<Arc<dyn ModelProvider>>,
        catalog: Catalog,
        allow_lists: &[(&str, &[String])],
    ) -> Result<Self, RouteError> {
        if providers.is_empty() {
            return Err(RouteError::NoProvidersConfigured);
        }

        let mut restrictions = HashMap::new();
        for (provider, allowed) in allow_lists {
            catalog.check_restriction_entries(provider, allowed);
            let mut set = HashSet::new();
            for entry in allowed.iter() {
                set.insert(entry.to_lowercase());
                if let Some(m) = catalog.resolve(entry) {
                    set.insert(m.id.to_lowercase());
                }
            }
            restrictions.insert(provider.to_string(), set);
        }

        Ok(Self {
            providers,
            catalog,
            restrictions,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn providers(&self) -> &[Arc<dyn ModelProvider>] {
        &self.providers
    }

    fn allowed(&self, provider: &str, raw: &str, canonical: &str) -> bool {
        match self.restrictions.get(provider) {
            None => true,
            Some(set) => {
                set.contains(&raw.to_lowercase()) || set.contains(&canonical.to_lowercase())
            }
        }
    }

    /// Resolve a model name to the first driver that serves it.
    pub fn pick(&self, name: &str) -> Result<PickedModel, RouteError> {
        let canonical = self
            .catalog
            .resolve(name)
            .map(|m| m.id.clone())
            .unwrap_or_else(|| name.to_string());

        for provider in &self.providers {
            if !provider.supports_model(name) && !provider.supports_model(&canonical) {
                continue;
            }
            if !self.allowed(provider.tag(), name, &canonical) {
                return Err(RouteError::ModelRestricted {
                    model: name.to_string(),
                    provider: provider.tag().to_string(),
                });
            }
            debug!(model = %canonical, provider = provider.tag(), "routed model");
            return Ok(PickedModel {
                provider: provider.clone(),
                canonical,
            });
        }

        Err(RouteError::NoProviderForModel(name.to_string()))
    }

    /// Pick the default model for a capability category (`auto` mode).
    ///
    /// Deterministic: the first catalogue entry of the category whose driver
    /// is registered and which passes restrictions.
    pub fn pick_for_category(&self, category: ModelCategory) -> Result<String, RouteError> {
        for m in self.catalog.models_for_category(category) {
            let served = self.providers.iter().any(|p| p.supports_model(&m.id));
            if served && self.allowed(&m.provider, &m.id, &m.id) {
                return Ok(m.id.clone());
            }
        }
        Err(RouteError::NoCategoryModel(category))
    }

    /// Capability lookup through the owning driver, falling back to the
    /// catalogue for catch-all models the driver has no record for.
    pub fn capabilities(&self, name: &str) -> Option<ModelCapability> {
        if let Ok(picked) = self.pick(name) {
            if let Some(cap) = picked.provider.capabilities(&picked.canonical) {
                return Some(cap);
            }
        }
        self.catalog.resolve(name).cloned()
    }

    /// All models served by at least one registered driver, with
    /// restrictions applied.  Used by `listmodels` and the CLI.
    pub fn available_models(&self) -> Vec<ModelCapability> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for provider in &self.providers {
            for m in provider.known_models() {
                if !seen.insert(m.id.to_lowercase()) {
                    continue;
                }
                if self.allowed(provider.tag(), &m.id, &m.id) {
                    out.push(m);
                }
            }
        }
        out
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::ScriptedMockDriver;

    fn driver_for(tag: &'static str, provider: &str) -> Arc<dyn ModelProvider> {
        let models = Catalog::builtin()
            .models_for_provider(provider)
            .into_iter()
            .cloned()
            .collect();
        Arc::new(ScriptedMockDriver::always_text("ok").with_tag(tag).with_models(models))
    }

    fn catch_all(tag: &'static str) -> Arc<dyn ModelProvider> {
        Arc::new(
            ScriptedMockDriver::always_text("ok")
                .with_tag(tag)
                .with_models(Vec::new())
                .with_catch_all(),
        )
    }

    fn router(providers: Vec<Arc<dyn ModelProvider>>) -> ProviderRouter {
        ProviderRouter::new(providers, Catalog::builtin(), &[]).unwrap()
    }

    #[test]
    fn empty_provider_set_is_refused() {
        let err = ProviderRouter::new(Vec::new(), Catalog::builtin(), &[]).unwrap_err();
        assert!(matches!(err, RouteError::NoProvidersConfigured));
    }

    #[test]
    fn pick_routes_to_owning_driver() {
        let r = router(vec![driver_for("google", "google"), driver_for("openai", "openai")]);
        let picked = r.pick("o4-mini").unwrap();
        assert_eq!(picked.provider.tag(), "openai");
        assert_eq!(picked.canonical, "o4-mini");
    }

    #[test]
    fn pick_resolves_aliases_to_canonical() {
        let r = router(vec![driver_for("google", "google")]);
        let picked = r.pick("flash").unwrap();
        assert_eq!(picked.canonical, "gemini-2.5-flash");
    }

    #[test]
    fn priority_order_prefers_earlier_driver() {
        // Two drivers claiming the same catalogue slice: first wins.
        let r = router(vec![
            driver_for("first", "openai"),
            driver_for("second", "openai"),
        ]);
        assert_eq!(r.pick("o3").unwrap().provider.tag(), "first");
    }

    #[test]
    fn unknown_model_falls_through_to_catch_all() {
        let r = router(vec![driver_for("openai", "openai"), catch_all("openrouter")]);
        let picked = r.pick("claude-opus-4").unwrap();
        assert_eq!(picked.provider.tag(), "openrouter");
        assert_eq!(
            picked.canonical, "claude-opus-4",
            "catch-all forwards the name verbatim"
        );
    }

    #[test]
    fn unknown_model_without_catch_all_is_an_error() {
        let r = router(vec![driver_for("openai", "openai")]);
        let err = r.pick("claude-opus-4").unwrap_err();
        assert!(matches!(err, RouteError::NoProviderForModel(name) if name == "claude-opus-4"));
    }

    #[test]
    fn restriction_blocks_resolvable_model() {
        let allowed = vec!["o4-mini".to_string()];
        let r = ProviderRouter::new(
            vec![driver_for("openai", "openai")],
            Catalog::builtin(),
            &[("openai", allowed.as_slice())],
        )
        .unwrap();
        assert!(r.pick("o4-mini").is_ok());
        let err = r.pick("o3").unwrap_err();
        assert!(
            matches!(err, RouteError::ModelRestricted { model, provider }
                if model == "o3" && provider == "openai")
        );
    }

    #[test]
    fn restriction_entries_may_be_aliases() {
        let allowed = vec!["mini".to_string()];
        let r = ProviderRouter::new(
            vec![driver_for("openai", "openai")],
            Catalog::builtin(),
            &[("openai", allowed.as_slice())],
        )
        .unwrap();
        // Both the alias and the canonical form are allowed.
        assert!(r.pick("mini").is_ok());
        assert!(r.pick("o4-mini").is_ok());
    }

    #[test]
    fn category_pick_is_first_declared_served_model() {
        let r = router(vec![driver_for("google", "google")]);
        let model = r.pick_for_category(ModelCategory::Fast).unwrap();
        assert_eq!(model, "gemini-2.5-flash");
    }

    #[test]
    fn category_pick_skips_unserved_providers() {
        // Only openai registered: the fast pick cannot be a gemini model.
        let r = router(vec![driver_for("openai", "openai")]);
        match r.pick_for_category(ModelCategory::Fast) {
            Ok(model) => assert!(r.catalog().get(&model).unwrap().provider == "openai"),
            Err(RouteError::NoCategoryModel(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn category_pick_skips_restricted_models() {
        let allowed = vec!["gemini-2.0-flash-lite".to_string()];
        let r = ProviderRouter::new(
            vec![driver_for("google", "google")],
            Catalog::builtin(),
            &[("google", allowed.as_slice())],
        )
        .unwrap();
        let model = r.pick_for_category(ModelCategory::Fast).unwrap();
        assert_eq!(model, "gemini-2.0-flash-lite");
    }

    #[test]
    fn available_models_applies_restrictions() {
        let allowed = vec!["o3".to_string()];
        let r = ProviderRouter::new(
            vec![driver_for("openai", "openai")],
            Catalog::builtin(),
            &[("openai", allowed.as_slice())],
        )
        .unwrap();
        let models = r.available_models();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id, "o3");
    }

    #[test]
    fn capabilities_resolves_through_router() {
        let r = router(vec![driver_for("google", "google")]);
        let cap = r.capabilities("pro").unwrap();
        assert_eq!(cap.id, "gemini-2.5-pro");
    }
}

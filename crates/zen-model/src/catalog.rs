// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Model catalogue: static metadata for every known model, plus an optional
//! user-supplied JSON catalogue for aggregator / custom-endpoint entries.
//!
//! The bundled catalogue lives in `models.yaml` next to this crate and ships
//! inside the binary via `include_str!`.  The user catalogue is a JSON file
//! (see `CUSTOM_MODELS_PATH`) with the same entry shape, letting people
//! teach the server about OpenRouter or local models without recompiling.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Capability bucket used for `auto`-mode routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCategory {
    /// Quick responses, cost-efficient.
    Fast,
    /// Good balance of speed and quality.
    Balanced,
    /// Extended reasoning, highest quality.
    DeepReasoning,
}

/// Sampling-temperature policy for a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TemperatureConstraint {
    /// The API accepts exactly one value (reasoning models).
    Fixed { value: f32 },
    /// The API accepts an enumerated set; requests snap to the nearest.
    Discrete { values: Vec<f32> },
    /// Continuous range with a default.
    Range { min: f32, max: f32, default: f32 },
}

impl Default for TemperatureConstraint {
    fn default() -> Self {
        TemperatureConstraint::Range {
            min: 0.0,
            max: 1.0,
            default: 0.3,
        }
    }
}

impl TemperatureConstraint {
    /// The value used when the caller supplies no temperature.
    pub fn default_value(&self) -> f32 {
        match self {
            TemperatureConstraint::Fixed { value } => *value,
            TemperatureConstraint::Discrete { values } => values.first().copied().unwrap_or(0.3),
            TemperatureConstraint::Range { default, .. } => *default,
        }
    }

    /// Clamp a requested temperature to this constraint.
    ///
    /// Out-of-range values are pulled to the nearest legal value rather than
    /// silently dropped, so a request for 0.9 against a `[0, 0.7]` range
    /// sends 0.7, and any request against a fixed constraint sends the fixed
    /// value.
    pub fn clamp(&self, requested: f32) -> f32 {
        match self {
            TemperatureConstraint::Fixed { value } => *value,
            TemperatureConstraint::Discrete { values } => values
                .iter()
                .copied()
                .min_by(|a, b| {
                    (a - requested)
                        .abs()
                        .partial_cmp(&(b - requested).abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(requested),
            TemperatureConstraint::Range { min, max, .. } => requested.clamp(*min, *max),
        }
    }

    /// True when `requested` is already legal under this constraint.
    pub fn accepts(&self, requested: f32) -> bool {
        match self {
            TemperatureConstraint::Fixed { value } => (requested - value).abs() < f32::EPSILON,
            TemperatureConstraint::Discrete { values } => {
                values.iter().any(|v| (requested - v).abs() < f32::EPSILON)
            }
            TemperatureConstraint::Range { min, max, .. } => {
                requested >= *min && requested <= *max
            }
        }
    }
}

fn default_max_image_bytes() -> u64 {
    20 * 1024 * 1024
}

/// Immutable metadata for a single model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCapability {
    /// Canonical model identifier, globally unique (e.g. `"gemini-2.5-pro"`).
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// Driver tag: "google" | "openai" | "xai" | "openrouter" | "custom".
    pub provider: String,
    /// Total context window in tokens (input + output).
    pub context_window: u32,
    /// Maximum output tokens per completion.
    pub max_output_tokens: u32,
    /// Supports an extended-thinking / reasoning budget.
    #[serde(default)]
    pub supports_thinking: bool,
    /// Accepts image input.
    #[serde(default)]
    pub supports_vision: bool,
    /// Largest accepted image payload in bytes.
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
    #[serde(default)]
    pub temperature: TemperatureConstraint,
    /// Case-insensitive shorthands (e.g. `flash` for `gemini-2.5-flash`).
    #[serde(default)]
    pub aliases: Vec<String>,
    pub category: ModelCategory,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    models: Vec<ModelCapability>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CustomCatalogFile {
    models: Vec<ModelCapability>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("reading catalogue {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("parsing catalogue {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("duplicate canonical model name '{0}'")]
    DuplicateCanonical(String),

    #[error("alias '{alias}' declared twice for provider '{provider}'")]
    DuplicateAlias { alias: String, provider: String },

    #[error("alias '{alias}' on '{model}' shadows canonical model '{target}'; chained aliases are not allowed")]
    AliasShadowsCanonical {
        alias: String,
        model: String,
        target: String,
    },
}

/// The assembled catalogue: bundled entries plus any user entries, validated.
///
/// Read-only after construction; lookups never lock.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<ModelCapability>,
}

impl Catalog {
    /// The bundled catalogue only.
    ///
    /// The bundled file is validated by unit tests, so a malformed build is
    /// caught before release rather than at runtime.
    pub fn builtin() -> Self {
        let yaml = include_str!("../models.yaml");
        let file: CatalogFile =
            serde_yaml::from_str(yaml).expect("bundled models.yaml must be valid");
        let catalog = Self {
            entries: file.models,
        };
        catalog
            .validate()
            .expect("bundled models.yaml must pass catalogue validation");
        catalog
    }

    /// Bundled catalogue extended with a user JSON catalogue.
    ///
    /// User entries are appended after the bundled ones so bundled
    /// declaration order drives category selection; a user entry may not
    /// reuse a bundled canonical name.
    pub fn with_custom(path: &Path) -> Result<Self, CatalogError> {
        let mut catalog = Self::builtin();
        let text = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: CustomCatalogFile =
            serde_json::from_str(&text).map_err(|source| CatalogError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        catalog.entries.extend(file.models);
        catalog.validate()?;
        Ok(catalog)
    }

    /// Serialize the user-extendable view back to the custom-file format.
    pub fn to_custom_json(entries: &[ModelCapability]) -> String {
        let file = CustomCatalogFile {
            models: entries.to_vec(),
        };
        serde_json::to_string_pretty(&file).unwrap_or_else(|_| "{}".into())
    }

    /// Enforce the catalogue invariants:
    /// canonical names globally unique; aliases unique per provider; no
    /// alias shadowing a canonical name (that would make `resolve` chain).
    fn validate(&self) -> Result<(), CatalogError> {
        let mut canonical = std::collections::HashSet::new();
        for e in &self.entries {
            if !canonical.insert(e.id.to_lowercase()) {
                return Err(CatalogError::DuplicateCanonical(e.id.clone()));
            }
        }
        let mut per_provider: std::collections::HashMap<&str, std::collections::HashSet<String>> =
            std::collections::HashMap::new();
        for e in &self.entries {
            let seen = per_provider.entry(e.provider.as_str()).or_default();
            for alias in &e.aliases {
                let lower = alias.to_lowercase();
                if canonical.contains(&lower) {
                    let target = self
                        .entries
                        .iter()
                        .find(|m| m.id.eq_ignore_ascii_case(alias))
                        .map(|m| m.id.clone())
                        .unwrap_or_default();
                    return Err(CatalogError::AliasShadowsCanonical {
                        alias: alias.clone(),
                        model: e.id.clone(),
                        target,
                    });
                }
                if !seen.insert(lower) {
                    return Err(CatalogError::DuplicateAlias {
                        alias: alias.clone(),
                        provider: e.provider.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// All entries in declaration order.
    pub fn entries(&self) -> &[ModelCapability] {
        &self.entries
    }

    /// Resolve any user-supplied name to a catalogue entry.
    ///
    /// Lookup order: exact canonical match, exact alias match, then a
    /// *unique* canonical-name substring.  All comparisons are
    /// case-insensitive; a single map hop, aliases never chain.
    pub fn resolve(&self, name: &str) -> Option<&ModelCapability> {
        let lower = name.to_lowercase();

        if let Some(m) = self.entries.iter().find(|m| m.id.to_lowercase() == lower) {
            return Some(m);
        }
        if let Some(m) = self
            .entries
            .iter()
            .find(|m| m.aliases.iter().any(|a| a.to_lowercase() == lower))
        {
            return Some(m);
        }

        let mut substring_matches = self
            .entries
            .iter()
            .filter(|m| m.id.to_lowercase().contains(&lower));
        match (substring_matches.next(), substring_matches.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }

    /// Get a capability by canonical name (case-insensitive, no aliases).
    pub fn get(&self, canonical: &str) -> Option<&ModelCapability> {
        self.entries
            .iter()
            .find(|m| m.id.eq_ignore_ascii_case(canonical))
    }

    /// Entries of a category, declaration order.
    pub fn models_for_category(&self, category: ModelCategory) -> Vec<&ModelCapability> {
        self.entries
            .iter()
            .filter(|m| m.category == category)
            .collect()
    }

    /// Entries owned by a provider tag.
    pub fn models_for_provider(&self, provider: &str) -> Vec<&ModelCapability> {
        self.entries
            .iter()
            .filter(|m| m.provider == provider)
            .collect()
    }

    /// Apply an allow-list intersection, warning (not failing) on entries
    /// that resolve to nothing.
    pub fn check_restriction_entries(&self, provider: &str, allowed: &[String]) {
        for name in allowed {
            if self.resolve(name).is_none() {
                warn!(
                    provider,
                    entry = %name,
                    "allow-list entry does not match any catalogued model"
                );
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_non_empty_and_valid() {
        let cat = Catalog::builtin();
        assert!(!cat.entries().is_empty());
    }

    #[test]
    fn canonical_names_are_globally_unique() {
        let cat = Catalog::builtin();
        let mut seen = std::collections::HashSet::new();
        for e in cat.entries() {
            assert!(seen.insert(e.id.to_lowercase()), "duplicate id: {}", e.id);
        }
    }

    #[test]
    fn gemini_pro_is_catalogued() {
        let cat = Catalog::builtin();
        let m = cat.get("gemini-2.5-pro").expect("gemini-2.5-pro must exist");
        assert_eq!(m.provider, "google");
        assert!(m.context_window >= 1_000_000);
        assert!(m.supports_vision);
        assert!(m.supports_thinking);
    }

    #[test]
    fn resolve_exact_canonical_is_case_insensitive() {
        let cat = Catalog::builtin();
        let m = cat.resolve("GEMINI-2.5-FLASH").unwrap();
        assert_eq!(m.id, "gemini-2.5-flash");
    }

    #[test]
    fn resolve_alias_is_case_insensitive() {
        let cat = Catalog::builtin();
        let m = cat.resolve("Flash").unwrap();
        assert_eq!(m.id, "gemini-2.5-flash");
        let m = cat.resolve("MINI").unwrap();
        assert_eq!(m.id, "o4-mini");
    }

    #[test]
    fn resolve_alias_wins_over_substring() {
        // "mini" is an alias of o4-mini; it is also a substring of both
        // o3-mini and o4-mini, so the alias hop must win before the
        // (ambiguous) substring tier is ever consulted.
        let cat = Catalog::builtin();
        assert_eq!(cat.resolve("mini").unwrap().id, "o4-mini");
    }

    #[test]
    fn resolve_unique_substring_matches() {
        let cat = Catalog::builtin();
        assert_eq!(cat.resolve("grok-3-f").unwrap().id, "grok-3-fast");
    }

    #[test]
    fn resolve_substring_need_not_be_a_prefix() {
        // "2.5-fl" occurs mid-id in gemini-2.5-flash and nowhere else.
        let cat = Catalog::builtin();
        assert_eq!(cat.resolve("2.5-fl").unwrap().id, "gemini-2.5-flash");
    }

    #[test]
    fn resolve_ambiguous_substring_returns_none() {
        // "gemini-2.5" occurs in several ids; the bare fragment must not
        // resolve unless it is itself declared as an alias.
        let cat = Catalog::builtin();
        if cat.resolve("gemini-2.5").is_some() {
            panic!("ambiguous substring must not resolve");
        }
    }

    #[test]
    fn resolve_unknown_returns_none() {
        let cat = Catalog::builtin();
        assert!(cat.resolve("made-up-model-xyz").is_none());
    }

    #[test]
    fn reasoning_models_have_fixed_temperature() {
        let cat = Catalog::builtin();
        let o3 = cat.get("o3").unwrap();
        assert!(matches!(
            o3.temperature,
            TemperatureConstraint::Fixed { value } if (value - 1.0).abs() < f32::EPSILON
        ));
    }

    #[test]
    fn every_category_has_at_least_one_model() {
        let cat = Catalog::builtin();
        for category in [
            ModelCategory::Fast,
            ModelCategory::Balanced,
            ModelCategory::DeepReasoning,
        ] {
            assert!(
                !cat.models_for_category(category).is_empty(),
                "no model in category {category:?}"
            );
        }
    }

    #[test]
    fn category_listing_preserves_declaration_order() {
        let cat = Catalog::builtin();
        let fast = cat.models_for_category(ModelCategory::Fast);
        let positions: Vec<usize> = fast
            .iter()
            .map(|m| cat.entries().iter().position(|e| e.id == m.id).unwrap())
            .collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    // ── Temperature constraints ───────────────────────────────────────────

    #[test]
    fn range_clamp_pulls_out_of_range_values_in() {
        let c = TemperatureConstraint::Range {
            min: 0.0,
            max: 0.7,
            default: 0.3,
        };
        assert_eq!(c.clamp(0.9), 0.7);
        assert_eq!(c.clamp(-0.2), 0.0);
        assert_eq!(c.clamp(0.5), 0.5);
    }

    #[test]
    fn range_accepts_its_upper_bound_exactly() {
        let c = TemperatureConstraint::Range {
            min: 0.0,
            max: 1.0,
            default: 0.3,
        };
        assert!(c.accepts(1.0));
        assert!(!c.accepts(1.0001));
    }

    #[test]
    fn fixed_clamp_always_returns_the_fixed_value() {
        let c = TemperatureConstraint::Fixed { value: 1.0 };
        assert_eq!(c.clamp(0.2), 1.0);
        assert_eq!(c.clamp(1.7), 1.0);
    }

    #[test]
    fn discrete_clamp_snaps_to_nearest() {
        let c = TemperatureConstraint::Discrete {
            values: vec![0.0, 0.5, 1.0],
        };
        assert_eq!(c.clamp(0.6), 0.5);
        assert_eq!(c.clamp(0.9), 1.0);
    }

    // ── Custom catalogue ──────────────────────────────────────────────────

    fn custom_entry_json(id: &str, aliases: &[&str]) -> String {
        format!(
            r#"{{"models":[{{
                "id": "{id}",
                "name": "{id}",
                "provider": "openrouter",
                "context_window": 200000,
                "max_output_tokens": 8192,
                "aliases": [{}],
                "category": "balanced"
            }}]}}"#,
            aliases
                .iter()
                .map(|a| format!("\"{a}\""))
                .collect::<Vec<_>>()
                .join(",")
        )
    }

    #[test]
    fn custom_catalogue_extends_builtin() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), custom_entry_json("claude-opus-4", &["opus"])).unwrap();
        let cat = Catalog::with_custom(tmp.path()).unwrap();
        assert_eq!(cat.resolve("opus").unwrap().id, "claude-opus-4");
        // Builtin entries are still present.
        assert!(cat.get("gemini-2.5-pro").is_some());
    }

    #[test]
    fn custom_duplicate_canonical_is_rejected() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), custom_entry_json("o4-mini", &[])).unwrap();
        let err = Catalog::with_custom(tmp.path()).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateCanonical(_)));
    }

    #[test]
    fn alias_shadowing_a_canonical_is_rejected() {
        // An alias that names another model's canonical id would make
        // resolve() a two-hop chain.
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), custom_entry_json("claude-opus-4", &["o3"])).unwrap();
        let err = Catalog::with_custom(tmp.path()).unwrap_err();
        assert!(matches!(err, CatalogError::AliasShadowsCanonical { .. }));
    }

    #[test]
    fn custom_catalogue_round_trips() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), custom_entry_json("claude-opus-4", &["opus"])).unwrap();
        let cat = Catalog::with_custom(tmp.path()).unwrap();

        let custom: Vec<ModelCapability> = cat
            .entries()
            .iter()
            .filter(|m| m.id == "claude-opus-4")
            .cloned()
            .collect();
        let serialized = Catalog::to_custom_json(&custom);

        let tmp2 = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp2.path(), serialized).unwrap();
        let cat2 = Catalog::with_custom(tmp2.path()).unwrap();
        assert_eq!(
            cat.resolve("opus").unwrap(),
            cat2.resolve("opus").unwrap(),
            "load → serialize → reload must preserve the entry"
        );
    }

    #[test]
    fn missing_custom_file_is_an_io_error() {
        let err =
            Catalog::with_custom(Path::new("/tmp/zen_missing_catalogue_xyz.json")).unwrap_err();
        assert!(matches!(err, CatalogError::Io { .. }));
    }
}

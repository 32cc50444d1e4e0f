// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level server configuration.
///
/// Every field is populated from environment variables by
/// [`crate::from_env`]; the host that launches the server passes nothing
/// else.  See the env-var names in `crate::env`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default model for tool calls that omit `model`.
    ///
    /// `"auto"` puts the server in auto mode: the `model` field becomes a
    /// required part of every tool schema unless the tool declares a
    /// category default, and category-based routing picks the model.
    pub default_model: String,
    /// Default value for the per-call `locale` field (BCP-47 tag).
    pub locale: Option<String>,
    /// Hard cap on turns per conversation thread.
    pub max_conversation_turns: usize,
    /// Threads idle longer than this many hours are expired.
    pub conversation_timeout_hours: i64,
    /// Tool names removed from both enumeration and dispatch.
    pub disabled_tools: Vec<String>,
    /// Seed for the tracing `EnvFilter` (overridden by `RUST_LOG`).
    pub log_level: String,
    /// Path to the user-editable JSON catalogue with aggregator / custom
    /// model entries.  `None` falls back to
    /// `~/.config/zen/custom_models.json` when that file exists.
    pub custom_models_path: Option<PathBuf>,
    #[serde(default)]
    pub providers: ProviderCredentials,
    #[serde(default)]
    pub restrictions: Restrictions,
}

/// Per-provider credentials and endpoints.
///
/// A driver is constructed at startup iff its credential (or, for the
/// custom endpoint, its URL) is present.  Keys are never logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderCredentials {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub xai_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    /// Base URL of a local OpenAI-compatible endpoint (Ollama, vLLM, …).
    pub custom_api_url: Option<String>,
    /// Optional key for the custom endpoint; most local servers need none.
    pub custom_api_key: Option<String>,
    /// Default model name served by the custom endpoint.
    pub custom_model_name: Option<String>,
}

/// Per-provider model allow-lists.
///
/// `None` means unrestricted; an empty list blocks every model of that
/// provider.  Names are matched case-insensitively against canonical names
/// and aliases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Restrictions {
    pub google: Option<Vec<String>>,
    pub openai: Option<Vec<String>>,
    pub xai: Option<Vec<String>>,
    pub openrouter: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_model: "auto".into(),
            locale: None,
            max_conversation_turns: 40,
            conversation_timeout_hours: 3,
            disabled_tools: Vec::new(),
            log_level: "info".into(),
            custom_models_path: None,
            providers: ProviderCredentials::default(),
            restrictions: Restrictions::default(),
        }
    }
}

impl Config {
    /// True when `default_model` is the literal `"auto"` (case-insensitive).
    pub fn is_auto_mode(&self) -> bool {
        self.default_model.eq_ignore_ascii_case("auto")
    }

    /// True when at least one provider credential (or the custom endpoint
    /// URL) is present, i.e. at least one driver can be constructed.
    pub fn has_any_provider(&self) -> bool {
        let p = &self.providers;
        p.gemini_api_key.is_some()
            || p.openai_api_key.is_some()
            || p.xai_api_key.is_some()
            || p.openrouter_api_key.is_some()
            || p.custom_api_url.is_some()
    }

    /// True when `name` is in the disabled-tools list.
    pub fn tool_disabled(&self, name: &str) -> bool {
        self.disabled_tools.iter().any(|t| t == name)
    }

    /// Allow-list for a provider tag, or `None` when unrestricted.
    pub fn allowed_models(&self, provider: &str) -> Option<&[String]> {
        let list = match provider {
            "google" => self.restrictions.google.as_deref(),
            "openai" => self.restrictions.openai.as_deref(),
            "xai" => self.restrictions.xai.as_deref(),
            "openrouter" => self.restrictions.openrouter.as_deref(),
            _ => None,
        };
        list
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_auto_mode() {
        let cfg = Config::default();
        assert!(cfg.is_auto_mode());
    }

    #[test]
    fn auto_mode_detection_is_case_insensitive() {
        let cfg = Config {
            default_model: "AUTO".into(),
            ..Config::default()
        };
        assert!(cfg.is_auto_mode());
    }

    #[test]
    fn explicit_model_disables_auto_mode() {
        let cfg = Config {
            default_model: "gemini-2.5-flash".into(),
            ..Config::default()
        };
        assert!(!cfg.is_auto_mode());
    }

    #[test]
    fn default_config_has_no_provider() {
        assert!(!Config::default().has_any_provider());
    }

    #[test]
    fn single_credential_enables_provider_detection() {
        let mut cfg = Config::default();
        cfg.providers.gemini_api_key = Some("k".into());
        assert!(cfg.has_any_provider());
    }

    #[test]
    fn custom_url_alone_counts_as_provider() {
        let mut cfg = Config::default();
        cfg.providers.custom_api_url = Some("http://localhost:11434/v1".into());
        assert!(cfg.has_any_provider());
    }

    #[test]
    fn tool_disabled_matches_exact_name() {
        let cfg = Config {
            disabled_tools: vec!["debug".into(), "tracer".into()],
            ..Config::default()
        };
        assert!(cfg.tool_disabled("debug"));
        assert!(!cfg.tool_disabled("chat"));
    }

    #[test]
    fn allowed_models_none_when_unrestricted() {
        let cfg = Config::default();
        assert!(cfg.allowed_models("openai").is_none());
    }

    #[test]
    fn allowed_models_returns_provider_list() {
        let cfg = Config {
            restrictions: Restrictions {
                openai: Some(vec!["o4-mini".into()]),
                ..Restrictions::default()
            },
            ..Config::default()
        };
        let allowed = cfg.allowed_models("openai").unwrap();
        assert_eq!(allowed, ["o4-mini".to_string()]);
    }

    #[test]
    fn allowed_models_unknown_provider_is_unrestricted() {
        let cfg = Config::default();
        assert!(cfg.allowed_models("no-such-provider").is_none());
    }
}

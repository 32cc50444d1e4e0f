// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Environment-variable parsing into [`Config`].
//!
//! The server is configured exclusively through the environment of the
//! process that spawns it (the MCP host's `env` block), so there is no
//! config-file search.  [`from_vars`] takes any `(key, value)` iterator,
//! which keeps tests hermetic: they never touch the real process
//! environment.

use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::{Config, ProviderCredentials, Restrictions};

/// Build a [`Config`] from the process environment.
pub fn from_env() -> Config {
    from_vars(std::env::vars())
}

/// Build a [`Config`] from an explicit set of variables.
///
/// Unknown keys are ignored.  Malformed numeric values fall back to the
/// default with a warning rather than aborting startup.
pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Config {
    let vars: HashMap<String, String> = vars
        .into_iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .collect();

    let get = |key: &str| vars.get(key).map(|v| v.trim().to_string());

    let defaults = Config::default();

    let max_conversation_turns = parse_number(
        get("MAX_CONVERSATION_TURNS"),
        "MAX_CONVERSATION_TURNS",
        defaults.max_conversation_turns,
    );
    let conversation_timeout_hours = parse_number(
        get("CONVERSATION_TIMEOUT_HOURS"),
        "CONVERSATION_TIMEOUT_HOURS",
        defaults.conversation_timeout_hours,
    );

    let custom_models_path = get("CUSTOM_MODELS_PATH")
        .map(PathBuf::from)
        .or_else(default_custom_models_path);

    let config = Config {
        default_model: get("DEFAULT_MODEL").unwrap_or(defaults.default_model),
        locale: get("LOCALE"),
        max_conversation_turns,
        conversation_timeout_hours,
        disabled_tools: get("DISABLED_TOOLS")
            .map(|v| split_list(&v))
            .unwrap_or_default(),
        log_level: get("LOG_LEVEL").unwrap_or(defaults.log_level),
        custom_models_path,
        providers: ProviderCredentials {
            gemini_api_key: get("GEMINI_API_KEY"),
            openai_api_key: get("OPENAI_API_KEY"),
            xai_api_key: get("XAI_API_KEY"),
            openrouter_api_key: get("OPENROUTER_API_KEY"),
            custom_api_url: get("CUSTOM_API_URL"),
            custom_api_key: get("CUSTOM_API_KEY"),
            custom_model_name: get("CUSTOM_MODEL_NAME"),
        },
        restrictions: Restrictions {
            google: get("GOOGLE_ALLOWED_MODELS").map(|v| split_list(&v)),
            openai: get("OPENAI_ALLOWED_MODELS").map(|v| split_list(&v)),
            xai: get("XAI_ALLOWED_MODELS").map(|v| split_list(&v)),
            openrouter: get("OPENROUTER_ALLOWED_MODELS").map(|v| split_list(&v)),
        },
    };

    debug!(
        default_model = %config.default_model,
        disabled_tools = config.disabled_tools.len(),
        "configuration assembled from environment"
    );

    config
}

/// Default location of the user catalogue when `CUSTOM_MODELS_PATH` is not
/// set.  Only returned when the file actually exists, so a missing default
/// is not an error later.
fn default_custom_models_path() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join("zen/custom_models.json");
    path.is_file().then_some(path)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_number<T: std::str::FromStr + std::fmt::Display>(
    value: Option<String>,
    key: &str,
    default: T,
) -> T {
    match value {
        None => default,
        Some(raw) => match raw.parse() {
            Ok(n) => n,
            Err(_) => {
                warn!("ignoring malformed {key}={raw:?}, using default {default}");
                default
            }
        },
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

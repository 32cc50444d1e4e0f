// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by a provider driver.
///
/// `RateLimited`, `Transient` and `Timeout` are retried inside the driver
/// (see `crate::retry`); everything else propagates immediately.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("authentication failed for provider '{provider}': {message}")]
    Auth { provider: String, message: String },

    #[error("rate limited: {message}")]
    RateLimited {
        message: String,
        /// Server-suggested wait, when the provider sent a Retry-After.
        retry_after: Option<Duration>,
    },

    #[error("transient provider error: {0}")]
    Transient(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("request blocked by provider safety filter: {reason}")]
    SafetyBlocked { reason: String },

    #[error("model '{model}' does not support {feature}")]
    Unsupported { model: String, feature: String },

    #[error("provider call exceeded its {0:?} deadline")]
    Timeout(Duration),
}

impl ProviderError {
    /// True for failures worth retrying with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. }
                | ProviderError::Transient(_)
                | ProviderError::Timeout(_)
        )
    }

    /// Map an upstream HTTP status + body into the taxonomy.
    ///
    /// Shared by every HTTP driver so all providers classify failures the
    /// same way.
    pub fn from_status(provider: &str, status: u16, body: String) -> Self {
        match status {
            401 | 403 => ProviderError::Auth {
                provider: provider.to_string(),
                message: body,
            },
            429 => ProviderError::RateLimited {
                message: body,
                retry_after: None,
            },
            400 | 404 | 422 => ProviderError::InvalidRequest(body),
            500..=599 => ProviderError::Transient(format!("{provider} returned {status}: {body}")),
            _ => ProviderError::Transient(format!(
                "{provider} returned unexpected status {status}: {body}"
            )),
        }
    }

    /// Stable machine-readable kind, used in the MCP error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Auth { .. } => "provider_auth_error",
            ProviderError::RateLimited { .. } => "provider_rate_limited",
            ProviderError::Transient(_) => "provider_transient_error",
            ProviderError::InvalidRequest(_) => "provider_invalid_request",
            ProviderError::SafetyBlocked { .. } => "provider_safety_blocked",
            ProviderError::Unsupported { .. } => "provider_unsupported_capability",
            ProviderError::Timeout(_) => "provider_timeout",
        }
    }
}

/// Errors from model → driver resolution.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("no configured provider serves model '{0}'")]
    NoProviderForModel(String),

    #[error("model '{model}' is not allowed by the '{provider}' restriction policy")]
    ModelRestricted { model: String, provider: String },

    #[error("no providers configured; set at least one API key or CUSTOM_API_URL")]
    NoProvidersConfigured,

    #[error("no '{0:?}'-category model is available from the configured providers")]
    NoCategoryModel(crate::catalog::ModelCategory),
}

impl RouteError {
    /// Stable machine-readable kind, used in the MCP error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            RouteError::NoProviderForModel(_) => "no_provider_for_model",
            RouteError::ModelRestricted { .. } => "model_restricted",
            RouteError::NoProvidersConfigured => "no_providers_configured",
            RouteError::NoCategoryModel(_) => "no_category_model",
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_is_retryable() {
        let e = ProviderError::RateLimited {
            message: "slow down".into(),
            retry_after: None,
        };
        assert!(e.is_retryable());
    }

    #[test]
    fn timeout_is_retryable() {
        assert!(ProviderError::Timeout(Duration::from_secs(30)).is_retryable());
    }

    #[test]
    fn auth_and_safety_are_not_retryable() {
        let auth = ProviderError::Auth {
            provider: "openai".into(),
            message: "bad key".into(),
        };
        let safety = ProviderError::SafetyBlocked {
            reason: "content policy".into(),
        };
        assert!(!auth.is_retryable());
        assert!(!safety.is_retryable());
    }

    #[test]
    fn status_401_maps_to_auth() {
        let e = ProviderError::from_status("google", 401, "key invalid".into());
        assert!(matches!(e, ProviderError::Auth { provider, .. } if provider == "google"));
    }

    #[test]
    fn status_429_maps_to_rate_limited() {
        let e = ProviderError::from_status("openai", 429, "tpm exceeded".into());
        assert!(matches!(e, ProviderError::RateLimited { .. }));
    }

    #[test]
    fn status_400_maps_to_invalid_request() {
        let e = ProviderError::from_status("xai", 400, "bad field".into());
        assert!(matches!(e, ProviderError::InvalidRequest(_)));
    }

    #[test]
    fn server_errors_map_to_transient() {
        for status in [500, 502, 503] {
            let e = ProviderError::from_status("openrouter", status, "oops".into());
            assert!(e.is_retryable(), "status {status} should be retryable");
        }
    }

    #[test]
    fn kind_strings_are_stable() {
        assert_eq!(
            ProviderError::Transient("x".into()).kind(),
            "provider_transient_error"
        );
        assert_eq!(
            RouteError::NoProviderForModel("m".into()).kind(),
            "no_provider_for_model"
        );
    }
}

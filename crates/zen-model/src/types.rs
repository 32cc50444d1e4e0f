// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Extended-thinking budget selector.
///
/// Maps to a fraction of the model's maximum thinking budget.  Ignored by
/// drivers whose model does not support extended thinking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingMode {
    Minimal,
    Low,
    #[default]
    Medium,
    High,
    Max,
}

impl ThinkingMode {
    /// Fraction of the model's maximum thinking-token budget.
    pub fn budget_fraction(self) -> f32 {
        match self {
            ThinkingMode::Minimal => 0.005,
            ThinkingMode::Low => 0.08,
            ThinkingMode::Medium => 0.33,
            ThinkingMode::High => 0.67,
            ThinkingMode::Max => 1.0,
        }
    }

    /// Parse from the wire value used in tool schemas.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "minimal" => Some(Self::Minimal),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "max" => Some(Self::Max),
            _ => None,
        }
    }
}

/// An image attached to a generation request.
///
/// Always a data URL (`data:<mime>;base64,<b64>`) by the time it reaches a
/// driver; file paths are resolved to data URLs by the file layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub data_url: String,
}

impl ImageData {
    pub fn new(data_url: impl Into<String>) -> Self {
        Self {
            data_url: data_url.into(),
        }
    }

    /// Split into `(mime, base64)`; falls back to a generic MIME type when
    /// the URL does not parse so drivers always get a valid pair.
    pub fn mime_and_data(&self) -> (&str, &str) {
        if let Some(rest) = self.data_url.strip_prefix("data:") {
            if let Some((mime, data)) = rest.split_once(";base64,") {
                return (mime, data);
            }
        }
        ("application/octet-stream", self.data_url.as_str())
    }
}

/// Request sent to a model driver.
///
/// `model` holds whatever name the caller supplied (canonical or alias);
/// drivers resolve it to the canonical name before serializing the outbound
/// request.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub model: String,
    pub system: Option<String>,
    pub prompt: String,
    pub temperature: Option<f32>,
    pub thinking: Option<ThinkingMode>,
    pub images: Vec<ImageData>,
    pub max_output_tokens: Option<u32>,
}

/// Token accounting for one completed call.
///
/// Drivers normalize provider quirks so `total_tokens` is always
/// `input_tokens + output_tokens`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens + output_tokens,
        }
    }
}

/// A whole (non-streamed) model response.
#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    pub content: String,
    pub usage: Usage,
    /// Canonical model name that actually served the request.
    pub model: String,
    /// Tag of the driver that served the request.
    pub provider: String,
    /// Free-form driver metadata (finish reason, upstream ids, …).
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use serde::Serialize;
use uuid::Uuid;

/// Envelope status vocabulary the host switches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    ContinuationAvailable,
    RequiresClarification,
    FilesRequiredToContinue,
    PauseForInvestigation,
    CallingExpertAnalysis,
    LocalWorkComplete,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct TokenCounts {
    pub input: u32,
    pub output: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeMetadata {
    pub tool: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenCounts>,
    /// Free-form extras (dropped images, skipped files, …).
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl EnvelopeMetadata {
    pub fn for_tool(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            model: None,
            provider: None,
            thread_id: None,
            turn_index: None,
            tokens: None,
            extra: serde_json::Map::new(),
        }
    }
}

/// Every successful tool call returns one of these; the dispatcher
/// serializes it verbatim into the MCP result.
#[derive(Debug, Clone, Serialize)]
pub struct ToolEnvelope {
    pub status: ToolStatus,
    pub content: String,
    pub content_type: String,
    pub metadata: EnvelopeMetadata,
}

impl ToolEnvelope {
    pub fn text(status: ToolStatus, content: impl Into<String>, metadata: EnvelopeMetadata) -> Self {
        Self {
            status,
            content: content.into(),
            content_type: "text".into(),
            metadata,
        }
    }

    pub fn json(status: ToolStatus, content: &impl Serialize, metadata: EnvelopeMetadata) -> Self {
        Self {
            status,
            content: serde_json::to_string_pretty(content).unwrap_or_else(|_| "{}".into()),
            content_type: "json".into(),
            metadata,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

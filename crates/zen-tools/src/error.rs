// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

use zen_files::{EmbedError, ImageError};
use zen_memory::ThreadError;
use zen_model::{ProviderError, RouteError};

/// Everything a tool invocation can fail with.
///
/// The dispatcher serializes these into the MCP error payload; `kind()` is
/// the stable machine-readable discriminator the host switches on.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid value for field '{field}': {message}")]
    Validation { field: String, message: String },

    #[error(transparent)]
    Thread(#[from] ThreadError),

    #[error("prompt does not fit the model context: {largest} is the largest contributor ({used} tokens against a budget of {budget})")]
    ContextOverflow {
        /// "history", "files" or "prompt", whichever used the most tokens.
        largest: String,
        used: usize,
        budget: usize,
    },

    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("workflow precondition violated: {0}")]
    WorkflowPrecondition(String),
}

impl ToolError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable kind for the MCP error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::Validation { .. } => "validation_error",
            ToolError::Thread(e) => e.kind(),
            ToolError::ContextOverflow { .. } => "context_overflow",
            ToolError::Embed(e) => e.kind(),
            ToolError::Image(_) => "image_error",
            ToolError::Route(e) => e.kind(),
            ToolError::Provider(e) => e.kind(),
            ToolError::WorkflowPrecondition(_) => "workflow_precondition_violated",
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn validation_error_names_the_field() {
        let e = ToolError::validation("temperature", "must be between 0 and 1");
        assert!(e.to_string().contains("temperature"));
        assert_eq!(e.kind(), "validation_error");
    }

    #[test]
    fn thread_errors_share_the_continuation_kind() {
        let unknown: ToolError = ThreadError::Unknown(Uuid::new_v4()).into();
        let expired: ToolError = ThreadError::Expired(Uuid::new_v4()).into();
        assert_eq!(unknown.kind(), "continuation_not_available");
        assert_eq!(expired.kind(), "continuation_not_available");
    }

    #[test]
    fn cap_reached_keeps_its_own_kind() {
        let e: ToolError = ThreadError::CapReached(Uuid::new_v4()).into();
        assert_eq!(e.kind(), "thread_cap_reached");
    }

    #[test]
    fn context_overflow_names_largest_contributor() {
        let e = ToolError::ContextOverflow {
            largest: "files".into(),
            used: 90_000,
            budget: 60_000,
        };
        assert!(e.to_string().contains("files"));
        assert_eq!(e.kind(), "context_overflow");
    }

    #[test]
    fn provider_errors_pass_their_kind_through() {
        let e: ToolError = ProviderError::SafetyBlocked {
            reason: "policy".into(),
        }
        .into();
        assert_eq!(e.kind(), "provider_safety_blocked");
    }
}

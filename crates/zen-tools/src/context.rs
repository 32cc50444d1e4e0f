// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Shared state and helpers both runtimes use.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use zen_config::Config;
use zen_memory::ConversationStore;
use zen_model::{ImageData, ModelCapability, ProviderRouter};

use crate::error::ToolError;
use crate::spec::ToolSpec;
use crate::workflow::WorkflowStore;

/// Character cap on user-supplied text per MCP request; one byte over
/// triggers the large-prompt escape.
pub const TRANSPORT_MAX_CHARS: usize = 50_000;

/// Everything a tool invocation needs, built once at startup.
///
/// The registry-and-config half is immutable; the store halves use their
/// own internal locking.
pub struct ToolContext {
    pub config: Arc<Config>,
    pub router: Arc<ProviderRouter>,
    pub store: Arc<ConversationStore>,
    pub workflows: Arc<WorkflowStore>,
}

impl ToolContext {
    pub fn new(config: Arc<Config>, router: Arc<ProviderRouter>) -> Self {
        let store = Arc::new(ConversationStore::new(
            config.max_conversation_turns,
            config.conversation_timeout_hours,
        ));
        Self {
            config,
            router,
            store,
            workflows: Arc::new(WorkflowStore::default()),
        }
    }

    /// Resolve the model for a call.
    ///
    /// Order: explicit request value (unless `auto`) > the thread's last
    /// model when continuing > the category default for the tool.  The
    /// server-level `DEFAULT_MODEL` substitutes for an absent explicit
    /// value before this order applies.
    pub fn resolve_model(
        &self,
        spec: &ToolSpec,
        explicit: Option<&str>,
        thread_model: Option<&str>,
    ) -> Result<String, ToolError> {
        let requested = explicit.or({
            if self.config.is_auto_mode() {
                None
            } else {
                Some(self.config.default_model.as_str())
            }
        });

        let name = match requested {
            Some(name) if !name.eq_ignore_ascii_case("auto") => name.to_string(),
            _ => match thread_model {
                Some(model) => model.to_string(),
                None => self.router.pick_for_category(spec.category)?,
            },
        };

        debug!(tool = spec.name, model = %name, "resolved model");
        Ok(name)
    }
}

/// Token budget split for one call against one model.
#[derive(Debug, Clone, Copy)]
pub struct PromptBudget {
    /// Reserved for the model's output.
    pub response_reserve: usize,
    /// For re-embedded history file contents.
    pub history_file_tokens: usize,
    /// For prior turns.
    pub history_tokens: usize,
    /// For files embedded in the current turn.
    pub file_tokens: usize,
    /// Everything the input half may use (window − response reserve).
    pub input_budget: usize,
}

/// Deterministic budget split.
///
/// A quarter of the window (capped by the model's own output limit) is
/// reserved for the response; the input remainder is split between new
/// files, history, and the live prompt.
pub fn budget_for(capability: &ModelCapability) -> PromptBudget {
    let window = capability.context_window as usize;
    let response_reserve = (window / 4).min(capability.max_output_tokens as usize).max(1);
    let input_budget = window.saturating_sub(response_reserve);
    PromptBudget {
        response_reserve,
        history_file_tokens: input_budget * 15 / 100,
        history_tokens: input_budget * 25 / 100,
        file_tokens: input_budget * 30 / 100,
        input_budget,
    }
}

/// Language instruction appended to the system prompt.
pub fn locale_instruction(locale: Option<&str>) -> Option<String> {
    let tag = locale?.trim();
    if tag.is_empty() {
        return None;
    }
    Some(format!(
        "Always respond in the language with locale {tag}; keep code identifiers, file paths and commands unchanged."
    ))
}

/// Stanza inviting the assistant to request web searches from the host.
pub fn websearch_stanza() -> &'static str {
    "When current documentation or release information would materially improve the answer, \
     state the specific web searches the agent should run and what to look for in the results."
}

/// Turn image references (absolute paths or data URIs) into driver-ready
/// data URLs.
///
/// On a text-only model nothing is loaded; every reference is reported as
/// dropped so the runtime can record the drop in metadata instead of
/// failing the call.
pub fn load_images(
    refs: &[String],
    capability: &ModelCapability,
) -> Result<(Vec<ImageData>, Vec<String>), ToolError> {
    if refs.is_empty() {
        return Ok((Vec::new(), Vec::new()));
    }
    if !capability.supports_vision {
        return Ok((Vec::new(), refs.to_vec()));
    }

    let mut images = Vec::new();
    for reference in refs {
        if reference.starts_with("data:") {
            images.push(ImageData::new(reference.clone()));
            continue;
        }
        let path = Path::new(reference);
        if !path.is_absolute() {
            return Err(ToolError::validation(
                "images",
                format!("image path must be absolute or a data URI: {reference}"),
            ));
        }
        // The model's own payload limit drives loading: the file is shrunk
        // to fit or rejected inside load_image.
        let encoded = zen_files::load_image(path, capability.max_image_bytes)?;
        images.push(ImageData::new(encoded.into_data_url()));
    }
    Ok((images, Vec::new()))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The one-shot tool runtime.
//!
//! One invocation is one provider call: validate the request, revive prior
//! conversation state when continuing, embed referenced files under the
//! model's token budget, call the model, persist the exchange, and offer
//! the thread id back to the host for continuation.
//!
//! Oversize prompts never reach a provider.  User text beyond the MCP
//! transport cap returns a `files_required_to_continue` envelope telling
//! the host to save the text to `prompt.txt` and resubmit with that path in
//! `files`; on resubmission the file's content becomes the effective
//! prompt and bypasses the cap.

use serde_json::json;
use tracing::debug;

use zen_files::{embed_files, estimate_tokens, take_prompt_file, EmbedOptions, PROMPT_FILE_NAME};
use zen_memory::{assemble, ConversationTurn, HistoryBudget};
use zen_model::{GenerateRequest, GenerateResponse};

use crate::context::{
    budget_for, load_images, locale_instruction, websearch_stanza, ToolContext, TRANSPORT_MAX_CHARS,
};
use crate::envelope::{EnvelopeMetadata, TokenCounts, ToolEnvelope, ToolStatus};
use crate::error::ToolError;
use crate::request::{parse_common, parse_primary, reject_unknown_fields};
use crate::spec::ToolSpec;

/// Images from history plus the current request, most recent last.
const MAX_HISTORY_IMAGES: usize = 3;

/// Execute a simple tool invocation.
pub async fn run_simple(
    ctx: &ToolContext,
    spec: &ToolSpec,
    args: &serde_json::Value,
) -> Result<ToolEnvelope, ToolError> {
    if spec.strict {
        reject_unknown_fields(spec, args, ctx.config.is_auto_mode())?;
    }
    let common = parse_common(args)?;
    let mut prompt = parse_primary(spec, args)?;

    // ── Large-prompt escape ───────────────────────────────────────────────
    // The cap applies to text sent through the transport; text arriving via
    // prompt.txt was already redirected around it.
    if prompt.len() > TRANSPORT_MAX_CHARS {
        let mut metadata = EnvelopeMetadata::for_tool(spec.name);
        metadata
            .extra
            .insert("prompt_chars".into(), json!(prompt.len()));
        let payload = json!({
            "reason": format!(
                "the {} field is {} characters, above the {TRANSPORT_MAX_CHARS}-character transport cap",
                spec.primary_field, prompt.len()
            ),
            "instructions": format!(
                "Save the full text to a file named {PROMPT_FILE_NAME}, then resubmit with an \
                 empty {} field and the file's absolute path added to 'files'.",
                spec.primary_field
            ),
        });
        return Ok(ToolEnvelope::json(
            ToolStatus::FilesRequiredToContinue,
            &payload,
            metadata,
        ));
    }

    let mut files = common.files.clone();
    if let Some((content, remaining)) = take_prompt_file(&files)? {
        prompt = content;
        files = remaining;
    }

    // ── Continuation ──────────────────────────────────────────────────────
    let thread = match common.continuation_id {
        Some(id) => Some(ctx.store.snapshot(id).await?),
        None => None,
    };

    // ── Model resolution ──────────────────────────────────────────────────
    let model_name = ctx.resolve_model(
        spec,
        common.model.as_deref(),
        thread.as_ref().and_then(|t| t.model_name.as_deref()),
    )?;
    let picked = ctx.router.pick(&model_name)?;
    let capability = ctx
        .router
        .capabilities(&model_name)
        .unwrap_or_else(zen_model::mock::mock_capability);
    let budget = budget_for(&capability);

    // ── History revival ───────────────────────────────────────────────────
    let history = thread
        .as_ref()
        .map(|t| {
            assemble(
                t,
                &HistoryBudget {
                    history_tokens: budget.history_tokens,
                    file_tokens: budget.history_file_tokens,
                    max_images: MAX_HISTORY_IMAGES,
                },
            )
        })
        .unwrap_or_default();

    // ── Current-turn files ────────────────────────────────────────────────
    // Anything referenced in a prior turn is listed, not re-embedded.
    let mut already = thread
        .as_ref()
        .map(|t| t.files_seen())
        .unwrap_or_default();
    already.extend(history.embedded_files.iter().cloned());
    let embed_opts = EmbedOptions {
        token_budget: budget.file_tokens,
        line_numbers: false,
        strict: false,
        already_embedded: already,
        section_label: "CONTEXT FILES".into(),
    };
    let embedded = embed_files(&files, &embed_opts)?;

    // ── Prompt assembly ───────────────────────────────────────────────────
    let mut user_content = String::new();
    if !history.text.is_empty() {
        user_content.push_str(&history.text);
        user_content.push_str("\n\n=== NEW MESSAGE ===\n");
    }
    user_content.push_str(&prompt);
    if !embedded.block.is_empty() {
        user_content.push_str("\n\n");
        user_content.push_str(&embedded.block);
    }
    if common.use_websearch {
        user_content.push_str("\n\n");
        user_content.push_str(websearch_stanza());
    }

    // ── Token budget check ────────────────────────────────────────────────
    let total = estimate_tokens(&user_content);
    if total > budget.input_budget {
        let prompt_tokens = estimate_tokens(&prompt);
        let file_tokens = estimate_tokens(&embedded.block);
        let contributors = [
            ("history", history.tokens),
            ("files", file_tokens),
            ("prompt", prompt_tokens),
        ];
        let largest = contributors
            .iter()
            .max_by_key(|(_, tokens)| *tokens)
            .map(|(name, _)| (*name).to_string())
            .unwrap_or_else(|| "prompt".into());
        return Err(ToolError::ContextOverflow {
            largest,
            used: total,
            budget: budget.input_budget,
        });
    }

    // ── System prompt ─────────────────────────────────────────────────────
    let mut system = spec.system_prompt.to_string();
    let locale = common.locale.as_deref().or(ctx.config.locale.as_deref());
    if let Some(instruction) = locale_instruction(locale) {
        system.push_str("\n\n");
        system.push_str(&instruction);
    }

    // ── Images ────────────────────────────────────────────────────────────
    let mut image_refs: Vec<String> = history.images.clone();
    for image in &common.images {
        if !image_refs.contains(image) {
            image_refs.push(image.clone());
        }
    }
    let (images, dropped_images) = load_images(&image_refs, &capability)?;

    let mut metadata = EnvelopeMetadata::for_tool(spec.name);
    if !dropped_images.is_empty() {
        metadata
            .extra
            .insert("images_dropped".into(), json!(dropped_images));
    }
    if !embedded.skipped.is_empty() {
        let skipped: Vec<String> = embedded
            .skipped
            .iter()
            .map(|(path, reason)| format!("{} ({reason})", path.display()))
            .collect();
        metadata.extra.insert("files_skipped".into(), json!(skipped));
    }

    // ── Provider call ─────────────────────────────────────────────────────
    let make_request = |model: String| GenerateRequest {
        model,
        system: Some(system.clone()),
        prompt: user_content.clone(),
        temperature: Some(common.temperature.unwrap_or(spec.default_temperature)),
        thinking: common.thinking,
        images: images.clone(),
        max_output_tokens: None,
    };

    let response = if spec.multi_model {
        consult_models(ctx, spec, &common.models, make_request).await?
    } else {
        picked.provider.generate(make_request(picked.canonical.clone())).await?
    };

    debug!(
        tool = spec.name,
        model = %response.model,
        input_tokens = response.usage.input_tokens,
        output_tokens = response.usage.output_tokens,
        "provider call complete"
    );

    // ── Persist the exchange ──────────────────────────────────────────────
    let thread_id = match common.continuation_id {
        Some(id) => id,
        None => ctx.store.create(spec.name, Some(response.model.clone())),
    };
    let user_turn = ConversationTurn::user(spec.name, prompt.clone())
        .with_files(files.clone())
        .with_images(common.images.clone());
    let assistant_turn =
        ConversationTurn::assistant(spec.name, response.model.clone(), response.content.clone())
            .with_tokens(response.usage.input_tokens, response.usage.output_tokens);
    let turn_count = ctx
        .store
        .append_exchange(thread_id, user_turn, assistant_turn)
        .await?;

    // ── Envelope ──────────────────────────────────────────────────────────
    metadata.model = Some(response.model.clone());
    metadata.provider = Some(response.provider.clone());
    metadata.thread_id = Some(thread_id);
    // 0-indexed position of the assistant turn just appended.
    metadata.turn_index = Some(turn_count - 1);
    metadata.tokens = Some(TokenCounts {
        input: response.usage.input_tokens,
        output: response.usage.output_tokens,
    });

    let content = format!(
        "{}\n\n---\nTo continue this conversation with any tool, pass continuation_id: {}",
        response.content, thread_id
    );
    Ok(ToolEnvelope::text(
        ToolStatus::ContinuationAvailable,
        content,
        metadata,
    ))
}

/// Consult each named model once and aggregate the answers (`consensus`).
async fn consult_models(
    ctx: &ToolContext,
    spec: &ToolSpec,
    models: &[String],
    make_request: impl Fn(String) -> GenerateRequest,
) -> Result<GenerateResponse, ToolError> {
    if models.is_empty() {
        return Err(ToolError::validation(
            "models",
            format!("{} requires at least one model to consult", spec.name),
        ));
    }

    let mut sections = Vec::new();
    let mut input = 0u32;
    let mut output = 0u32;
    let mut consulted = Vec::new();
    for name in models {
        let picked = ctx.router.pick(name)?;
        let response = picked
            .provider
            .generate(make_request(picked.canonical.clone()))
            .await?;
        input += response.usage.input_tokens;
        output += response.usage.output_tokens;
        sections.push(format!(
            "=== {} ({}) ===\n{}",
            response.model, response.provider, response.content
        ));
        consulted.push(response.model);
    }

    Ok(GenerateResponse {
        content: sections.join("\n\n"),
        usage: zen_model::Usage::new(input, output),
        model: consulted.join(","),
        provider: "multiple".into(),
        metadata: serde_json::Map::new(),
    })
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The multi-step workflow runtime.
//!
//! Workflow tools (debug, codereview, precommit, …) do not answer in one
//! shot.  The host drives the investigation: each call submits one step's
//! findings, the runtime accumulates them into per-thread state and tells
//! the host to keep investigating.  The model is called exactly once, on
//! the terminal step, with the consolidated state; intermediate steps
//! never reach a provider.
//!
//! State transitions: `Active` while steps arrive, `ExpertPending` while
//! the terminal call is in flight, `Complete` after it.  A backtrack
//! rewinds to an earlier step and discards findings recorded after it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use zen_files::{embed_files, estimate_tokens, EmbedOptions};
use zen_memory::{assemble, ConversationTurn, HistoryBudget};
use zen_model::GenerateRequest;

use crate::context::{budget_for, load_images, locale_instruction, ToolContext};
use crate::envelope::{EnvelopeMetadata, TokenCounts, ToolEnvelope, ToolStatus};
use crate::error::ToolError;
use crate::request;
use crate::spec::ToolSpec;

/// How sure the investigator is of the current hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    #[default]
    Exploring,
    Low,
    Medium,
    High,
    VeryHigh,
    AlmostCertain,
    Certain,
}

impl Confidence {
    pub fn parse(s: &str) -> Option<Self> {
        serde_json::from_value(Value::String(s.to_string())).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueFound {
    pub severity: String,
    pub description: String,
}

/// One step as submitted by the host.
#[derive(Debug, Clone, Default)]
pub struct WorkflowStep {
    pub step: String,
    pub step_number: u32,
    pub total_steps: u32,
    pub next_step_required: bool,
    pub findings: String,
    pub files_checked: Vec<PathBuf>,
    pub relevant_files: Vec<PathBuf>,
    pub relevant_context: Vec<String>,
    pub confidence: Confidence,
    pub issues_found: Vec<IssueFound>,
    pub hypothesis: Option<String>,
    pub backtrack_from_step: Option<u32>,
    pub images: Vec<String>,
    /// Documentation-workflow progress counters.
    pub num_files_documented: Option<u32>,
    pub total_files_to_document: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPhase {
    Active,
    ExpertPending,
    Complete,
}

/// Accumulated investigation state for one thread.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub current_step: u32,
    pub total_steps: u32,
    pub confidence: Confidence,
    /// Findings per step, kept separate so backtracking can discard the
    /// steps after the rewind point.
    pub findings: Vec<(u32, String)>,
    pub files_checked: Vec<PathBuf>,
    pub relevant_files: Vec<PathBuf>,
    pub relevant_context: Vec<String>,
    pub issues_found: Vec<IssueFound>,
    pub hypothesis: Option<String>,
    pub images: Vec<String>,
    pub phase: WorkflowPhase,
    pub num_files_documented: u32,
    pub total_files_to_document: u32,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            current_step: 0,
            total_steps: 0,
            confidence: Confidence::Exploring,
            findings: Vec::new(),
            files_checked: Vec::new(),
            relevant_files: Vec::new(),
            relevant_context: Vec::new(),
            issues_found: Vec::new(),
            hypothesis: None,
            images: Vec::new(),
            phase: WorkflowPhase::Active,
            num_files_documented: 0,
            total_files_to_document: 0,
        }
    }
}

impl WorkflowState {
    /// All findings in step order, joined for the expert prompt.
    pub fn consolidated_findings(&self) -> String {
        self.findings
            .iter()
            .map(|(step, text)| format!("Step {step}: {text}"))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Per-thread workflow states.
///
/// Keyed by the conversation thread id; a state dies with its thread (the
/// sweep is driven from the same place that sweeps threads).
#[derive(Default)]
pub struct WorkflowStore {
    states: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<WorkflowState>>>>,
}

impl WorkflowStore {
    /// Handle for a thread's state, creating it on first use.
    pub fn entry(&self, thread_id: Uuid) -> Arc<tokio::sync::Mutex<WorkflowState>> {
        self.states
            .lock()
            .expect("workflow map lock poisoned")
            .entry(thread_id)
            .or_default()
            .clone()
    }

    pub fn remove(&self, thread_id: Uuid) {
        self.states
            .lock()
            .expect("workflow map lock poisoned")
            .remove(&thread_id);
    }
}

// ─── Default hooks ────────────────────────────────────────────────────────────

/// Generic next-step guidance, scaled to how sure the investigation is.
pub fn default_required_actions(step_number: u32, confidence: Confidence) -> Vec<String> {
    let mut actions = vec![
        "Examine the code and files identified as relevant in this step".to_string(),
        "Record concrete evidence (file paths, symbols, line references) in the next step's findings".to_string(),
    ];
    if confidence <= Confidence::Low {
        actions.push("Broaden the search: trace callers and related modules before narrowing down".to_string());
    }
    if step_number == 1 {
        actions.push("Establish the overall structure before drilling into details".to_string());
    }
    actions
}

/// Default precondition check: nothing tool-specific to enforce.
pub fn default_validate(_step: &WorkflowStep, _state: &WorkflowState) -> Result<(), String> {
    Ok(())
}

/// Default expert gate: skip the call only when the investigator is
/// already certain.
pub fn default_should_call_expert(state: &WorkflowState) -> bool {
    state.confidence != Confidence::Certain
}

// ─── Step parsing ─────────────────────────────────────────────────────────────

pub fn parse_step(args: &Value) -> Result<WorkflowStep, ToolError> {
    let required_string = |field: &str| -> Result<String, ToolError> {
        match args.get(field) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(ToolError::validation(field, "expected a string")),
            None => Err(ToolError::validation(field, "required field is missing")),
        }
    };
    let required_u32 = |field: &str| -> Result<u32, ToolError> {
        args.get(field)
            .and_then(|v| v.as_u64())
            .map(|n| n as u32)
            .ok_or_else(|| ToolError::validation(field, "required integer is missing"))
    };

    let confidence = match args.get("confidence") {
        None | Some(Value::Null) => Confidence::default(),
        Some(Value::String(s)) => Confidence::parse(s)
            .ok_or_else(|| ToolError::validation("confidence", format!("unknown level {s:?}")))?,
        Some(_) => return Err(ToolError::validation("confidence", "expected a string")),
    };

    let issues_found = match args.get("issues_found") {
        None | Some(Value::Null) => Vec::new(),
        Some(v) => serde_json::from_value(v.clone()).map_err(|e| {
            ToolError::validation("issues_found", format!("expected [{{severity, description}}]: {e}"))
        })?,
    };

    let optional_u32 = |field: &str| args.get(field).and_then(|v| v.as_u64()).map(|n| n as u32);

    let step = WorkflowStep {
        step: required_string("step")?,
        step_number: required_u32("step_number")?,
        total_steps: required_u32("total_steps")?,
        next_step_required: args
            .get("next_step_required")
            .and_then(|v| v.as_bool())
            .ok_or_else(|| ToolError::validation("next_step_required", "required boolean is missing"))?,
        findings: required_string("findings")?,
        files_checked: request::parse_paths(args, "files_checked")?,
        relevant_files: request::parse_paths(args, "relevant_files")?,
        relevant_context: request::parse_strings(args, "relevant_context")?,
        confidence,
        issues_found,
        hypothesis: request::parse_string(args, "hypothesis")?,
        backtrack_from_step: optional_u32("backtrack_from_step"),
        images: request::parse_strings(args, "images")?,
        num_files_documented: optional_u32("num_files_documented"),
        total_files_to_document: optional_u32("total_files_to_document"),
    };

    if step.step_number == 0 {
        return Err(ToolError::validation("step_number", "steps are numbered from 1"));
    }
    Ok(step)
}

// ─── State application ────────────────────────────────────────────────────────

fn merge_unique<T: Clone + PartialEq>(into: &mut Vec<T>, from: &[T]) {
    for item in from {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}

/// Apply one step to a copy of the state, enforcing the generic monotone
/// preconditions.  The caller commits the copy only after the tool's own
/// validation hook also passes.
fn apply_step(state: &WorkflowState, step: &WorkflowStep) -> Result<WorkflowState, ToolError> {
    let mut next = state.clone();

    if let Some(backtrack) = step.backtrack_from_step {
        if backtrack >= step.step_number {
            return Err(ToolError::WorkflowPrecondition(
                "backtrack_must_target_earlier_step".into(),
            ));
        }
        // Discard everything recorded strictly after the rewind point.
        next.findings.retain(|(s, _)| *s <= backtrack);
        next.current_step = backtrack;
    } else if step.step_number <= state.current_step {
        return Err(ToolError::WorkflowPrecondition("step_number_must_increase".into()));
    }

    next.current_step = step.step_number;
    next.total_steps = step.total_steps.max(step.step_number);
    next.confidence = step.confidence;
    next.findings.push((step.step_number, step.findings.clone()));
    merge_unique(&mut next.files_checked, &step.files_checked);
    merge_unique(&mut next.relevant_files, &step.relevant_files);
    // Relevant files are a subset of checked files by definition.
    merge_unique(&mut next.files_checked, &step.relevant_files);
    merge_unique(&mut next.relevant_context, &step.relevant_context);
    merge_unique(&mut next.issues_found, &step.issues_found);
    merge_unique(&mut next.images, &step.images);
    if step.hypothesis.is_some() {
        next.hypothesis = step.hypothesis.clone();
    }
    if let Some(n) = step.num_files_documented {
        next.num_files_documented = n;
    }
    if let Some(n) = step.total_files_to_document {
        next.total_files_to_document = n;
    }

    Ok(next)
}

// ─── Runtime ──────────────────────────────────────────────────────────────────

/// Execute one workflow step for `spec`.
pub async fn run_workflow(
    ctx: &ToolContext,
    spec: &ToolSpec,
    args: &Value,
) -> Result<ToolEnvelope, ToolError> {
    let common = request::parse_common(args)?;
    let mut step = parse_step(args)?;

    if step.step_number > 1 && common.continuation_id.is_none() {
        return Err(ToolError::validation(
            "continuation_id",
            "required from step 2 onward",
        ));
    }

    // Thread: opened on step 1, revalidated on every later step.
    let (thread_id, prior_thread) = match common.continuation_id {
        Some(id) => (id, Some(ctx.store.snapshot(id).await?)),
        None => (ctx.store.create(spec.name, None), None),
    };

    // One lock for the whole step: concurrent submissions serialize and
    // the second observes the first's mutations.
    let handle = ctx.workflows.entry(thread_id);
    let mut state = handle.lock().await;

    // Cross-tool continuation: a thread started by another tool carries
    // conversation history that this workflow has not seen.  Materialize it
    // into the tool's primary field on the workflow's first step so the
    // investigation builds on the earlier exchange.
    if state.current_step == 0 {
        if let Some(thread) = &prior_thread {
            if !thread.turns.is_empty() {
                let history = assemble(
                    thread,
                    &HistoryBudget {
                        history_tokens: 50_000,
                        file_tokens: 0,
                        max_images: 0,
                    },
                );
                if !history.text.is_empty() {
                    step.findings = format!("{}\n\n{}", history.text, step.findings);
                }
            }
        }
    }

    if state.phase == WorkflowPhase::Complete {
        return Err(ToolError::WorkflowPrecondition("workflow_already_complete".into()));
    }

    let candidate = apply_step(&state, &step)?;

    let hooks = spec.hooks;
    if let Some(hooks) = &hooks {
        (hooks.validate_step)(&step, &candidate).map_err(ToolError::WorkflowPrecondition)?;
    }
    *state = candidate;

    debug!(
        tool = spec.name,
        thread = %thread_id,
        step = step.step_number,
        total = state.total_steps,
        confidence = ?state.confidence,
        "workflow step accepted"
    );

    let mut metadata = EnvelopeMetadata::for_tool(spec.name);
    metadata.thread_id = Some(thread_id);

    if step.next_step_required {
        let required_actions = hooks
            .as_ref()
            .map(|h| (h.required_actions)(step.step_number, state.confidence))
            .unwrap_or_else(|| default_required_actions(step.step_number, state.confidence));
        let payload = json!({
            "step_number": step.step_number,
            "total_steps": state.total_steps,
            "confidence": state.confidence,
            "files_checked": state.files_checked.len(),
            "next_steps": required_actions,
            "continuation_id": thread_id,
        });
        return Ok(ToolEnvelope::json(
            ToolStatus::PauseForInvestigation,
            &payload,
            metadata,
        ));
    }

    // ── Terminal step ─────────────────────────────────────────────────────
    state.phase = WorkflowPhase::ExpertPending;

    let call_expert = hooks
        .as_ref()
        .map(|h| (h.should_call_expert)(&state))
        .unwrap_or_else(|| default_should_call_expert(&state));

    let summary = json!({
        "steps_taken": state.current_step,
        "findings": state.consolidated_findings(),
        "hypothesis": state.hypothesis,
        "confidence": state.confidence,
        "relevant_files": state.relevant_files,
        "relevant_context": state.relevant_context,
        "issues_found": state.issues_found,
    });

    if !call_expert {
        state.phase = WorkflowPhase::Complete;
        let payload = json!({ "workflow_summary": summary });
        return Ok(ToolEnvelope::json(
            ToolStatus::LocalWorkComplete,
            &payload,
            metadata,
        ));
    }

    let thread = ctx.store.snapshot(thread_id).await?;
    let model_name = ctx.resolve_model(spec, common.model.as_deref(), thread.model_name.as_deref())?;
    let picked = ctx.router.pick(&model_name)?;
    let capability = ctx
        .router
        .capabilities(&model_name)
        .unwrap_or_else(zen_model::mock::mock_capability);
    let budget = budget_for(&capability);

    let mut prompt = String::new();
    prompt.push_str("=== INVESTIGATION SUMMARY ===\n");
    prompt.push_str(&serde_json::to_string_pretty(&summary).unwrap_or_default());
    prompt.push('\n');

    if !state.relevant_files.is_empty() {
        let opts = EmbedOptions {
            token_budget: budget.file_tokens,
            line_numbers: true,
            section_label: "RELEVANT FILES".into(),
            ..EmbedOptions::default()
        };
        let embedded = embed_files(&state.relevant_files, &opts)?;
        if !embedded.block.is_empty() {
            prompt.push_str(&embedded.block);
            prompt.push('\n');
        }
    }
    prompt.push_str(
        "Provide your expert analysis of the investigation above: validate or refute the \
         hypothesis, point out anything the steps missed, and recommend concrete next actions.",
    );

    let used = estimate_tokens(&prompt);
    if used > budget.input_budget {
        return Err(ToolError::ContextOverflow {
            largest: "files".into(),
            used,
            budget: budget.input_budget,
        });
    }

    let mut system = spec.system_prompt.to_string();
    let locale = common.locale.as_deref().or(ctx.config.locale.as_deref());
    if let Some(instruction) = locale_instruction(locale) {
        system.push_str("\n\n");
        system.push_str(&instruction);
    }

    let (images, dropped_images) = load_images(&state.images, &capability)?;
    if !dropped_images.is_empty() {
        metadata
            .extra
            .insert("images_dropped".into(), json!(dropped_images));
    }

    let response = picked
        .provider
        .generate(GenerateRequest {
            model: picked.canonical.clone(),
            system: Some(system),
            prompt,
            temperature: Some(common.temperature.unwrap_or(spec.default_temperature)),
            thinking: common.thinking,
            images,
            max_output_tokens: None,
        })
        .await?;

    state.phase = WorkflowPhase::Complete;

    let user_turn = ConversationTurn::user(spec.name, state.consolidated_findings())
        .with_files(state.relevant_files.clone())
        .with_images(state.images.clone());
    let assistant_turn =
        ConversationTurn::assistant(spec.name, response.model.clone(), response.content.clone())
            .with_tokens(response.usage.input_tokens, response.usage.output_tokens);
    let turn_count = ctx
        .store
        .append_exchange(thread_id, user_turn, assistant_turn)
        .await?;

    metadata.model = Some(response.model.clone());
    metadata.provider = Some(response.provider.clone());
    metadata.turn_index = Some(turn_count - 1);
    metadata.tokens = Some(TokenCounts {
        input: response.usage.input_tokens,
        output: response.usage.output_tokens,
    });

    let payload = json!({
        "workflow_summary": summary,
        "expert_analysis": response.content,
    });
    Ok(ToolEnvelope::json(
        ToolStatus::CallingExpertAnalysis,
        &payload,
        metadata,
    ))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! The built-in tool catalogue.
//!
//! One [`ToolSpec`] value per tool.  Workflow tools differ only in their
//! system prompt, category and hooks; nothing here executes anything.

use serde_json::{json, Map, Value};
use zen_model::ModelCategory;

use crate::prompts;
use crate::spec::{RuntimeKind, ToolSpec, WorkflowHooks};
use crate::workflow::{
    default_required_actions, default_should_call_expert, default_validate, Confidence,
    WorkflowState, WorkflowStep,
};

/// Every built-in tool, declaration order = listing order.
pub fn builtin_tools() -> Vec<ToolSpec> {
    vec![
        chat(),
        thinkdeep(),
        planner(),
        consensus(),
        codereview(),
        precommit(),
        debug(),
        secaudit(),
        docgen(),
        analyze(),
        refactor(),
        tracer(),
        testgen(),
        version(),
        listmodels(),
    ]
}

fn workflow(
    name: &'static str,
    description: &'static str,
    category: ModelCategory,
    system_prompt: &'static str,
) -> ToolSpec {
    ToolSpec {
        name,
        description,
        category,
        runtime: RuntimeKind::Workflow,
        primary_field: "findings",
        system_prompt,
        default_temperature: 0.2,
        strict: false,
        multi_model: false,
        extra_schema: None,
        hooks: Some(WorkflowHooks {
            required_actions: default_required_actions,
            validate_step: default_validate,
            should_call_expert: default_should_call_expert,
        }),
    }
}

fn chat() -> ToolSpec {
    ToolSpec {
        name: "chat",
        description: "General collaborative chat: questions, brainstorming, second opinions",
        category: ModelCategory::Fast,
        runtime: RuntimeKind::Simple,
        primary_field: "prompt",
        system_prompt: prompts::CHAT,
        default_temperature: 0.5,
        strict: false,
        multi_model: false,
        extra_schema: None,
        hooks: None,
    }
}

fn thinkdeep() -> ToolSpec {
    let mut spec = workflow(
        "thinkdeep",
        "Extended reasoning over an analysis the agent has already produced",
        ModelCategory::DeepReasoning,
        prompts::THINKDEEP,
    );
    spec.default_temperature = 0.7;
    spec
}

fn planner() -> ToolSpec {
    let mut spec = workflow(
        "planner",
        "Interactive step-by-step planning with revision and branching",
        ModelCategory::DeepReasoning,
        prompts::PLANNER,
    );
    // Planning is local work: the accumulated plan is the product and no
    // expert call is made.
    spec.hooks = Some(WorkflowHooks {
        required_actions: planner_actions,
        validate_step: default_validate,
        should_call_expert: |_| false,
    });
    spec
}

fn planner_actions(step_number: u32, _confidence: Confidence) -> Vec<String> {
    if step_number == 1 {
        vec![
            "List the known constraints and the definition of done".to_string(),
            "Draft the major phases before detailing individual steps".to_string(),
        ]
    } else {
        vec![
            "Detail the next phase: concrete steps, dependencies, verification".to_string(),
            "Revise earlier steps if this phase invalidated any assumption".to_string(),
        ]
    }
}

fn consensus() -> ToolSpec {
    ToolSpec {
        name: "consensus",
        description: "Consult several models on one question and aggregate their verdicts",
        category: ModelCategory::Balanced,
        runtime: RuntimeKind::Simple,
        primary_field: "prompt",
        system_prompt: prompts::CONSENSUS,
        default_temperature: 0.2,
        strict: true,
        multi_model: true,
        extra_schema: Some(consensus_schema),
        hooks: None,
    }
}

fn consensus_schema() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(
        "models".into(),
        json!({
            "type": "array",
            "items": { "type": "string" },
            "description": "Models to consult, by name or alias; each is called once"
        }),
    );
    map
}

fn codereview() -> ToolSpec {
    let mut spec = workflow(
        "codereview",
        "Systematic multi-pass code review ending in an expert assessment",
        ModelCategory::Balanced,
        prompts::CODEREVIEW,
    );
    spec.extra_schema = Some(codereview_schema);
    spec
}

fn codereview_schema() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(
        "review_type".into(),
        json!({
            "type": "string",
            "enum": ["full", "security", "performance", "quick"],
            "description": "Focus of the review (default full)"
        }),
    );
    map
}

fn precommit() -> ToolSpec {
    let mut spec = workflow(
        "precommit",
        "Validate staged or pending changes before committing",
        ModelCategory::Balanced,
        prompts::PRECOMMIT,
    );
    spec.hooks = Some(WorkflowHooks {
        required_actions: default_required_actions,
        validate_step: precommit_validate,
        should_call_expert: default_should_call_expert,
    });
    spec.extra_schema = Some(precommit_schema);
    spec
}

/// The diff under validation must be identified early: without at least one
/// relevant file by step 2 the investigation has nothing to validate.
fn precommit_validate(step: &WorkflowStep, state: &WorkflowState) -> Result<(), String> {
    if (step.step_number >= 2 || !step.next_step_required) && state.relevant_files.is_empty() {
        return Err("relevant_files_required_by_step_2".to_string());
    }
    Ok(())
}

fn precommit_schema() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(
        "path".into(),
        json!({
            "type": "string",
            "description": "Absolute path to the repository root being validated"
        }),
    );
    map.insert(
        "compare_to".into(),
        json!({
            "type": "string",
            "description": "Git ref to diff against instead of the staged changes"
        }),
    );
    map
}

fn debug() -> ToolSpec {
    workflow(
        "debug",
        "Root-cause debugging: evidence-driven investigation, then expert validation",
        ModelCategory::DeepReasoning,
        prompts::DEBUG,
    )
}

fn secaudit() -> ToolSpec {
    let mut spec = workflow(
        "secaudit",
        "Security audit across authentication, input handling and dependencies",
        ModelCategory::DeepReasoning,
        prompts::SECAUDIT,
    );
    spec.hooks = Some(WorkflowHooks {
        required_actions: secaudit_actions,
        validate_step: default_validate,
        should_call_expert: default_should_call_expert,
    });
    spec
}

fn secaudit_actions(step_number: u32, confidence: Confidence) -> Vec<String> {
    let mut actions = vec![
        "Map the attack surface touched by the files under audit".to_string(),
        "Check input validation, authentication and authorization on every entry point".to_string(),
    ];
    if step_number > 1 && confidence < Confidence::High {
        actions.push("Trace how untrusted data flows into the flagged code paths".to_string());
    }
    actions
}

fn docgen() -> ToolSpec {
    let mut spec = workflow(
        "docgen",
        "Generate and verify documentation file by file",
        ModelCategory::Balanced,
        prompts::DOCGEN,
    );
    spec.hooks = Some(WorkflowHooks {
        required_actions: default_required_actions,
        validate_step: docgen_validate,
        should_call_expert: default_should_call_expert,
    });
    spec.extra_schema = Some(docgen_schema);
    spec
}

/// Completion is gated on the progress counters: the workflow may not end
/// while any discovered file remains undocumented.
fn docgen_validate(step: &WorkflowStep, state: &WorkflowState) -> Result<(), String> {
    if !step.next_step_required && state.num_files_documented < state.total_files_to_document {
        return Err("all_files_must_be_documented".to_string());
    }
    Ok(())
}

fn docgen_schema() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(
        "num_files_documented".into(),
        json!({
            "type": "integer",
            "description": "Files fully documented so far"
        }),
    );
    map.insert(
        "total_files_to_document".into(),
        json!({
            "type": "integer",
            "description": "Total files discovered as needing documentation"
        }),
    );
    map
}

fn analyze() -> ToolSpec {
    workflow(
        "analyze",
        "Architecture and code analysis of a set of files or a whole project",
        ModelCategory::Balanced,
        prompts::ANALYZE,
    )
}

fn refactor() -> ToolSpec {
    workflow(
        "refactor",
        "Find and rank refactoring opportunities: smells, decomposition, modernization",
        ModelCategory::Balanced,
        prompts::REFACTOR,
    )
}

fn tracer() -> ToolSpec {
    let mut spec = workflow(
        "tracer",
        "Trace execution or dependency paths for specific code",
        ModelCategory::Balanced,
        prompts::TRACER,
    );
    spec.extra_schema = Some(tracer_schema);
    spec
}

fn tracer_schema() -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(
        "trace_mode".into(),
        json!({
            "type": "string",
            "enum": ["precision", "dependencies"],
            "description": "precision follows execution flow; dependencies maps structural relations"
        }),
    );
    map
}

fn testgen() -> ToolSpec {
    workflow(
        "testgen",
        "Generate a test plan and high-value test cases from an investigation",
        ModelCategory::Balanced,
        prompts::TESTGEN,
    )
}

fn version() -> ToolSpec {
    ToolSpec {
        name: "version",
        description: "Server version, configured providers and enabled tools",
        category: ModelCategory::Fast,
        runtime: RuntimeKind::Local,
        primary_field: "prompt",
        system_prompt: "",
        default_temperature: 0.0,
        strict: false,
        multi_model: false,
        extra_schema: None,
        hooks: None,
    }
}

fn listmodels() -> ToolSpec {
    ToolSpec {
        name: "listmodels",
        description: "Models available under the current configuration and restrictions",
        category: ModelCategory::Fast,
        runtime: RuntimeKind::Local,
        primary_field: "prompt",
        system_prompt: "",
        default_temperature: 0.0,
        strict: false,
        multi_model: false,
        extra_schema: None,
        hooks: None,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

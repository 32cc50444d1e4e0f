// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! End-to-end workflow runtime behaviour against the scripted mock driver.

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use zen_config::Config;
use zen_model::mock::ScriptedMockDriver;
use zen_model::{Catalog, ModelProvider, ProviderRouter};
use zen_tools::{builtin_tools, run_workflow, ToolContext, ToolSpec, ToolStatus};

fn context(driver: ScriptedMockDriver) -> (ToolContext, Arc<ScriptedMockDriver>) {
    let driver = Arc::new(driver);
    let providers: Vec<Arc<dyn ModelProvider>> = vec![driver.clone()];
    let router = ProviderRouter::new(providers, Catalog::builtin(), &[]).unwrap();
    let config = Config {
        default_model: "mock-model".into(),
        ..Config::default()
    };
    (ToolContext::new(Arc::new(config), Arc::new(router)), driver)
}

fn tool(name: &str) -> ToolSpec {
    builtin_tools().into_iter().find(|s| s.name == name).unwrap()
}

fn step_args(number: u32, total: u32, next_required: bool, findings: &str) -> serde_json::Value {
    json!({
        "step": format!("investigate part {number}"),
        "step_number": number,
        "total_steps": total,
        "next_step_required": next_required,
        "findings": findings,
    })
}

#[tokio::test]
async fn intermediate_step_pauses_without_model_call() {
    let (ctx, driver) = context(ScriptedMockDriver::always_text("never"));
    let spec = tool("debug");

    let envelope = run_workflow(&ctx, &spec, &step_args(1, 3, true, "first clue"))
        .await
        .unwrap();

    assert_eq!(envelope.status, ToolStatus::PauseForInvestigation);
    assert!(envelope.content.contains("next_steps"));
    assert!(envelope.metadata.thread_id.is_some());
    assert!(
        driver.last_request.lock().unwrap().is_none(),
        "intermediate steps must never call the model"
    );
}

#[tokio::test]
async fn second_step_requires_continuation_id() {
    let (ctx, _) = context(ScriptedMockDriver::always_text("x"));
    let spec = tool("debug");
    let err = run_workflow(&ctx, &spec, &step_args(2, 3, true, "more"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "validation_error");
}

#[tokio::test]
async fn terminal_step_calls_expert_with_consolidated_findings() {
    let (ctx, driver) = context(ScriptedMockDriver::always_text("expert verdict"));
    let spec = tool("debug");

    let first = run_workflow(&ctx, &spec, &step_args(1, 2, true, "saw the race"))
        .await
        .unwrap();
    let id = first.metadata.thread_id.unwrap();

    let mut terminal = step_args(2, 2, false, "lock order confirmed");
    terminal["continuation_id"] = json!(id.to_string());
    terminal["hypothesis"] = json!("unlocked read in sweep");
    let envelope = run_workflow(&ctx, &spec, &terminal).await.unwrap();

    assert_eq!(envelope.status, ToolStatus::CallingExpertAnalysis);
    assert!(envelope.content.contains("expert verdict"));
    assert!(envelope.content.contains("workflow_summary"));
    assert_eq!(envelope.metadata.model.as_deref(), Some("mock-model"));

    let last = driver.last_request.lock().unwrap();
    let sent = last.as_ref().unwrap();
    assert!(sent.prompt.contains("saw the race"));
    assert!(sent.prompt.contains("lock order confirmed"));
    assert!(sent.prompt.contains("unlocked read in sweep"));
}

#[tokio::test]
async fn certain_confidence_skips_the_expert_call() {
    let (ctx, driver) = context(ScriptedMockDriver::always_text("never"));
    let spec = tool("debug");

    let mut terminal = step_args(1, 1, false, "root cause in hand");
    terminal["confidence"] = json!("certain");
    let envelope = run_workflow(&ctx, &spec, &terminal).await.unwrap();

    assert_eq!(envelope.status, ToolStatus::LocalWorkComplete);
    assert!(envelope.content.contains("workflow_summary"));
    assert!(driver.last_request.lock().unwrap().is_none());
}

#[tokio::test]
async fn planner_completes_locally_regardless_of_confidence() {
    let (ctx, driver) = context(ScriptedMockDriver::always_text("never"));
    let spec = tool("planner");

    let envelope = run_workflow(&ctx, &spec, &step_args(1, 1, false, "plan drafted"))
        .await
        .unwrap();
    assert_eq!(envelope.status, ToolStatus::LocalWorkComplete);
    assert!(driver.last_request.lock().unwrap().is_none());
}

#[tokio::test]
async fn precommit_refuses_premature_completion() {
    let (ctx, driver) = context(ScriptedMockDriver::always_text("never"));
    let spec = tool("precommit");

    let err = run_workflow(&ctx, &spec, &step_args(1, 1, false, "none"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "workflow_precondition_violated");
    assert!(err.to_string().contains("relevant_files_required_by_step_2"));
    assert!(
        driver.last_request.lock().unwrap().is_none(),
        "no expert call on a rejected step"
    );
}

#[tokio::test]
async fn rejected_step_appends_no_turn() {
    let (ctx, _) = context(ScriptedMockDriver::always_text("never"));
    let spec = tool("precommit");

    // Step 1 opens the thread and pauses.
    let first = run_workflow(&ctx, &spec, &step_args(1, 2, true, "looking"))
        .await
        .unwrap();
    let id = first.metadata.thread_id.unwrap();

    // Step 2 without relevant files is rejected.
    let mut second = step_args(2, 2, true, "still looking");
    second["continuation_id"] = json!(id.to_string());
    run_workflow(&ctx, &spec, &second).await.unwrap_err();

    let thread = ctx.store.snapshot(id).await.unwrap();
    assert!(thread.turns.is_empty(), "rejected steps must not persist turns");
}

#[tokio::test]
async fn workflow_steps_accumulate_across_calls() {
    let (ctx, driver) = context(ScriptedMockDriver::always_text("summary judged"));
    let spec = tool("codereview");

    let first = run_workflow(&ctx, &spec, &step_args(1, 3, true, "module A is fine"))
        .await
        .unwrap();
    let id = first.metadata.thread_id.unwrap();

    let mut second = step_args(2, 3, true, "module B leaks a handle");
    second["continuation_id"] = json!(id.to_string());
    run_workflow(&ctx, &spec, &second).await.unwrap();

    let mut terminal = step_args(3, 3, false, "review complete");
    terminal["continuation_id"] = json!(id.to_string());
    run_workflow(&ctx, &spec, &terminal).await.unwrap();

    let sent = driver.last_request.lock().unwrap();
    let prompt = &sent.as_ref().unwrap().prompt;
    assert!(prompt.contains("module A is fine"));
    assert!(prompt.contains("module B leaks a handle"));
    assert!(prompt.contains("review complete"));
}

#[tokio::test]
async fn completed_workflow_rejects_further_steps() {
    let (ctx, _) = context(ScriptedMockDriver::always_text("done"));
    let spec = tool("debug");

    let first = run_workflow(&ctx, &spec, &step_args(1, 2, true, "clue"))
        .await
        .unwrap();
    let id = first.metadata.thread_id.unwrap();

    let mut terminal = step_args(2, 2, false, "solved");
    terminal["continuation_id"] = json!(id.to_string());
    run_workflow(&ctx, &spec, &terminal).await.unwrap();

    let mut extra = step_args(3, 3, true, "one more");
    extra["continuation_id"] = json!(id.to_string());
    let err = run_workflow(&ctx, &spec, &extra).await.unwrap_err();
    assert!(err.to_string().contains("workflow_already_complete"));
}

#[tokio::test]
async fn unknown_continuation_id_is_rejected() {
    let (ctx, _) = context(ScriptedMockDriver::always_text("x"));
    let spec = tool("debug");
    let mut args = step_args(2, 3, true, "more");
    args["continuation_id"] = json!(Uuid::new_v4().to_string());
    let err = run_workflow(&ctx, &spec, &args).await.unwrap_err();
    assert_eq!(err.kind(), "continuation_not_available");
}

#[tokio::test]
async fn docgen_gate_blocks_then_allows_completion() {
    let (ctx, _) = context(ScriptedMockDriver::always_text("docs reviewed"));
    let spec = tool("docgen");

    let mut first = step_args(1, 2, true, "found 2 files to document");
    first["total_files_to_document"] = json!(2);
    first["num_files_documented"] = json!(1);
    let envelope = run_workflow(&ctx, &spec, &first).await.unwrap();
    let id = envelope.metadata.thread_id.unwrap();

    let mut early_finish = step_args(2, 2, false, "stopping early");
    early_finish["continuation_id"] = json!(id.to_string());
    let err = run_workflow(&ctx, &spec, &early_finish).await.unwrap_err();
    assert!(err.to_string().contains("all_files_must_be_documented"));

    let mut finish = step_args(3, 3, false, "both files documented");
    finish["continuation_id"] = json!(id.to_string());
    finish["num_files_documented"] = json!(2);
    let envelope = run_workflow(&ctx, &spec, &finish).await.unwrap();
    assert!(matches!(
        envelope.status,
        ToolStatus::CallingExpertAnalysis | ToolStatus::LocalWorkComplete
    ));
}

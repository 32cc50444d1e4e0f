// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! End-to-end scenarios through the dispatcher, driven with scripted mock
//! drivers standing in for real providers.

use std::sync::Arc;

use serde_json::{json, Value};

use zen_config::Config;
use zen_model::mock::ScriptedMockDriver;
use zen_model::{Catalog, GenerateResponse, ModelProvider, ProviderRouter, Usage};
use zen_mcp::Dispatcher;
use zen_tools::{builtin_tools, ToolContext, ToolRegistry};

fn reply(text: &str) -> Result<GenerateResponse, zen_model::ProviderError> {
    Ok(GenerateResponse {
        content: text.into(),
        usage: Usage::new(7, 3),
        model: "gemini-2.5-flash".into(),
        provider: "google".into(),
        metadata: serde_json::Map::new(),
    })
}

/// A mock that claims the whole google catalogue slice, so auto-mode
/// category routing resolves against real capability records.
fn google_mock(scripts: Vec<Result<GenerateResponse, zen_model::ProviderError>>) -> ScriptedMockDriver {
    let models = Catalog::builtin()
        .models_for_provider("google")
        .into_iter()
        .cloned()
        .collect();
    ScriptedMockDriver::new(scripts)
        .with_tag("google")
        .with_models(models)
}

fn dispatcher(config: Config, driver: ScriptedMockDriver) -> (Dispatcher, Arc<ScriptedMockDriver>) {
    let driver = Arc::new(driver);
    let providers: Vec<Arc<dyn ModelProvider>> = vec![driver.clone()];
    let router = ProviderRouter::new(providers, Catalog::builtin(), &[]).unwrap();
    let config = Arc::new(config);
    let registry = Arc::new(ToolRegistry::new(builtin_tools(), &config.disabled_tools));
    let ctx = Arc::new(ToolContext::new(config, Arc::new(router)));
    (Dispatcher::new(ctx, registry), driver)
}

fn body(result: &rmcp::model::CallToolResult) -> Value {
    let text = result.content[0].as_text().unwrap();
    serde_json::from_str(&text.text).unwrap()
}

// S1: auto-mode chat with continuation.
#[tokio::test]
async fn auto_mode_chat_with_continuation() {
    let config = Config::default(); // DEFAULT_MODEL=auto
    let (d, driver) = dispatcher(config, google_mock(vec![reply("Hi there"), reply("Again")]));

    let first = d.dispatch("chat", json!({ "prompt": "Hi", "model": "auto" })).await;
    let first = body(&first);
    assert_eq!(first["status"], "continuation_available");
    assert_eq!(first["metadata"]["turn_index"], 1);
    // The fast-category default for the registered provider is flash.
    assert_eq!(first["metadata"]["model"], "gemini-2.5-flash");
    let thread_id = first["metadata"]["thread_id"].as_str().unwrap().to_string();

    let second = d
        .dispatch(
            "chat",
            json!({ "prompt": "And again", "continuation_id": thread_id }),
        )
        .await;
    let second = body(&second);
    assert_eq!(second["metadata"]["thread_id"].as_str().unwrap(), thread_id);
    assert_eq!(second["metadata"]["turn_index"], 3);

    // The assembled prompt for the follow-up contains the prior turns.
    let last = driver.last_request.lock().unwrap();
    let sent = &last.as_ref().unwrap().prompt;
    assert!(sent.contains("Hi"));
    assert!(sent.contains("Hi there"));
}

// S3: cross-tool continuation lands in the workflow tool's primary field.
#[tokio::test]
async fn chat_thread_continues_into_debug_workflow() {
    let config = Config {
        default_model: "gemini-2.5-flash".into(),
        ..Config::default()
    };
    let (d, driver) = dispatcher(
        config,
        google_mock(vec![reply("the bug is in the sweeper"), reply("expert analysis")]),
    );

    let chat = d
        .dispatch("chat", json!({ "prompt": "sweeper drops live threads" }))
        .await;
    let chat = body(&chat);
    let thread_id = chat["metadata"]["thread_id"].as_str().unwrap().to_string();

    // Step 1 of debug on the same thread, then the terminal step.
    let step1 = d
        .dispatch(
            "debug",
            json!({
                "step": "reproduce the report",
                "step_number": 1,
                "total_steps": 2,
                "next_step_required": true,
                "findings": "reproduced locally",
                "continuation_id": thread_id,
            }),
        )
        .await;
    assert_eq!(body(&step1)["status"], "pause_for_investigation");

    let terminal = d
        .dispatch(
            "debug",
            json!({
                "step": "confirm the cause",
                "step_number": 2,
                "total_steps": 2,
                "next_step_required": false,
                "findings": "TTL comparison inverted",
                "continuation_id": thread_id,
            }),
        )
        .await;
    let terminal = body(&terminal);
    assert_eq!(terminal["status"], "calling_expert_analysis");

    // The chat exchange was materialized into the debug findings and made
    // it all the way into the expert prompt.
    let last = driver.last_request.lock().unwrap();
    let sent = &last.as_ref().unwrap().prompt;
    assert!(sent.contains("sweeper drops live threads"));
    assert!(sent.contains("the bug is in the sweeper"));
    assert!(sent.contains("TTL comparison inverted"));

    // The thread gained the debug exchange.
    let thread_json = d
        .dispatch("chat", json!({ "prompt": "recap", "continuation_id": thread_id }))
        .await;
    assert_ne!(thread_json.is_error, Some(true));
}

// S4: large-prompt escape round trip.
#[tokio::test]
async fn large_prompt_escape_and_resubmission() {
    let config = Config {
        default_model: "gemini-2.5-flash".into(),
        ..Config::default()
    };
    let (d, _driver) = dispatcher(config, google_mock(vec![reply("handled")]));

    let oversized = "z".repeat(60_000);
    let escape = d.dispatch("chat", json!({ "prompt": oversized })).await;
    let escape = body(&escape);
    assert_eq!(escape["status"], "files_required_to_continue");
    assert!(escape["content"].as_str().unwrap().contains("prompt.txt"));

    let dir = tempfile::tempdir().unwrap();
    let prompt_path = dir.path().join("prompt.txt");
    std::fs::write(&prompt_path, "the actual question").unwrap();

    let resubmit = d
        .dispatch(
            "chat",
            json!({ "prompt": "", "files": [prompt_path.to_str().unwrap()] }),
        )
        .await;
    let resubmit = body(&resubmit);
    assert_eq!(resubmit["status"], "continuation_available");
}

// S6: names owned by no native driver fall through to the aggregator.
#[tokio::test]
async fn aggregator_serves_unknown_model_names() {
    let google = google_mock(vec![]);
    let openrouter = ScriptedMockDriver::new(vec![Ok(GenerateResponse {
        content: "served by the gateway".into(),
        usage: Usage::new(4, 4),
        model: "claude-opus-4".into(),
        provider: "openrouter".into(),
        metadata: serde_json::Map::new(),
    })])
    .with_tag("openrouter")
    .with_models(Vec::new())
    .with_catch_all();

    let google = Arc::new(google);
    let openrouter = Arc::new(openrouter);
    let providers: Vec<Arc<dyn ModelProvider>> = vec![google.clone(), openrouter.clone()];
    let router = ProviderRouter::new(providers, Catalog::builtin(), &[]).unwrap();
    let config = Arc::new(Config {
        default_model: "gemini-2.5-flash".into(),
        ..Config::default()
    });
    let registry = Arc::new(ToolRegistry::new(builtin_tools(), &config.disabled_tools));
    let ctx = Arc::new(ToolContext::new(config, Arc::new(router)));
    let d = Dispatcher::new(ctx, registry);

    let result = d
        .dispatch("chat", json!({ "prompt": "hi", "model": "claude-opus-4" }))
        .await;
    let result = body(&result);
    assert_eq!(result["metadata"]["provider"], "openrouter");

    // The aggregator received the supplied name verbatim.
    let last = openrouter.last_request.lock().unwrap();
    assert_eq!(last.as_ref().unwrap().model, "claude-opus-4");
    // The native driver was never consulted.
    assert!(google.last_request.lock().unwrap().is_none());
}

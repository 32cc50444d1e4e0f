use std::sync::Arc;
use serde_json::json;
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

fn google_mock(scripts: Vec<Result<GenerateResponse, zen_model::ProviderError>>) -> ScriptedMockDriver {
    let models = Catalog::builtin().models_for_provider("google").into_iter().cloned().collect();
    ScriptedMockDriver::new(scripts).with_tag("google").with_models(models)
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

fn body(result: &rmcp::model::CallToolResult) -> serde_json::Value {
    let text = result.content[0].as_text().unwrap();
    serde_json::from_str(&text.text).unwrap()
}

#[tokio::main]
async fn main() {
    let config = Config { default_model: "gemini-2.5-flash".into(), ..Config::default() };
    let (d, _driver) = dispatcher(config, google_mock(vec![reply("the bug is in the sweeper"), reply("expert analysis")]));
    eprintln!("before chat");
    let chat = d.dispatch("chat", json!({ "prompt": "sweeper drops live threads" })).await;
    eprintln!("after chat");
    let chat = body(&chat);
    let thread_id = chat["metadata"]["thread_id"].as_str().unwrap().to_string();
    eprintln!("thread_id={}", thread_id);

    eprintln!("before step1");
    let step1 = d.dispatch("debug", json!({
        "step": "reproduce the report", "step_number": 1, "total_steps": 2,
        "next_step_required": true, "findings": "reproduced locally", "continuation_id": thread_id,
    })).await;
    eprintln!("after step1: {:?}", body(&step1));

    eprintln!("before step2");
    let step2 = d.dispatch("debug", json!({
        "step": "confirm the cause", "step_number": 2, "total_steps": 2,
        "next_step_required": false, "findings": "TTL comparison inverted", "continuation_id": thread_id,
    })).await;
    eprintln!("after step2: {:?}", body(&step2));
    eprintln!("DONE");
}

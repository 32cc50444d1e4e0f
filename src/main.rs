// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use zen_mcp::Dispatcher;
use zen_model::ModelCapability;
use zen_tools::{builtin_tools, schema_for, ToolContext, ToolRegistry};

/// How often expired conversation threads are swept.
const SWEEP_INTERVAL: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = zen_config::from_env();

    init_logging(cli.verbose, &config.log_level);

    match cli.command {
        None | Some(Commands::Serve) => serve(config).await,
        Some(Commands::ListModels { provider, json }) => list_models(&config, provider.as_deref(), json),
        Some(Commands::ListTools { json }) => list_tools(&config, json),
        Some(Commands::ShowConfig) => show_config(&config),
    }
}

async fn serve(config: zen_config::Config) -> anyhow::Result<()> {
    let router = zen_model::build_router(&config).context("initializing model providers")?;

    let config = Arc::new(config);
    let registry = Arc::new(ToolRegistry::new(builtin_tools(), &config.disabled_tools));
    let ctx = Arc::new(ToolContext::new(config, Arc::new(router)));

    // Expired threads are reclaimed in the background for the lifetime of
    // the server; workflow state keyed on a swept thread goes with it.
    {
        let store = ctx.store.clone();
        let workflows = ctx.workflows.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let swept = store.sweep().await;
                for id in &swept {
                    workflows.remove(*id);
                }
                if !swept.is_empty() {
                    tracing::debug!(count = swept.len(), "expired conversation threads removed");
                }
            }
        });
    }

    tracing::info!(
        providers = ctx.router.providers().len(),
        tools = registry.names().len(),
        "zen MCP server starting on stdio"
    );
    zen_mcp::serve_stdio(Arc::new(Dispatcher::new(ctx, registry))).await
}

fn build_router_or_catalog(config: &zen_config::Config) -> Vec<ModelCapability> {
    if config.has_any_provider() {
        match zen_model::build_router(config) {
            Ok(router) => return router.available_models(),
            Err(e) => eprintln!("warning: {e}; falling back to the full catalogue"),
        }
    }
    match &config.custom_models_path {
        Some(path) => zen_model::Catalog::with_custom(path)
            .map(|c| c.entries().to_vec())
            .unwrap_or_else(|_| zen_model::Catalog::builtin().entries().to_vec()),
        None => zen_model::Catalog::builtin().entries().to_vec(),
    }
}

fn list_models(
    config: &zen_config::Config,
    provider_filter: Option<&str>,
    as_json: bool,
) -> anyhow::Result<()> {
    let mut entries = build_router_or_catalog(config);
    if let Some(provider) = provider_filter {
        entries.retain(|e| e.provider == provider);
    }

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No models found.");
        return Ok(());
    }

    let id_w = entries.iter().map(|e| e.id.len()).max().unwrap_or(10).max(10);
    let prov_w = entries
        .iter()
        .map(|e| e.provider.len())
        .max()
        .unwrap_or(8)
        .max(8);

    println!(
        "{:<id_w$}  {:<prov_w$}  {:>12}  {:>14}  DESCRIPTION",
        "ID",
        "PROVIDER",
        "CTX WINDOW",
        "MAX OUT TOKENS",
        id_w = id_w,
        prov_w = prov_w,
    );
    println!("{}", "-".repeat(id_w + prov_w + 50));
    for e in &entries {
        println!(
            "{:<id_w$}  {:<prov_w$}  {:>12}  {:>14}  {}",
            e.id,
            e.provider,
            e.context_window,
            e.max_output_tokens,
            e.description,
            id_w = id_w,
            prov_w = prov_w,
        );
    }
    println!("\nTotal: {} model(s)", entries.len());
    Ok(())
}

fn list_tools(config: &zen_config::Config, as_json: bool) -> anyhow::Result<()> {
    let registry = ToolRegistry::new(builtin_tools(), &config.disabled_tools);
    let auto_mode = config.is_auto_mode();

    if as_json {
        let rows: Vec<serde_json::Value> = registry
            .enabled()
            .map(|spec| {
                serde_json::json!({
                    "name": spec.name,
                    "description": spec.description,
                    "schema": schema_for(spec, auto_mode),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let name_w = registry
        .enabled()
        .map(|s| s.name.len())
        .max()
        .unwrap_or(8)
        .max(8);
    println!("{:<name_w$}  DESCRIPTION", "NAME", name_w = name_w);
    println!("{}", "-".repeat(name_w + 60));
    for spec in registry.enabled() {
        println!("{:<name_w$}  {}", spec.name, spec.description, name_w = name_w);
    }
    Ok(())
}

fn show_config(config: &zen_config::Config) -> anyhow::Result<()> {
    let mut redacted = config.clone();
    for key in [
        &mut redacted.providers.gemini_api_key,
        &mut redacted.providers.openai_api_key,
        &mut redacted.providers.xai_api_key,
        &mut redacted.providers.openrouter_api_key,
        &mut redacted.providers.custom_api_key,
    ] {
        if key.is_some() {
            *key = Some("<set>".into());
        }
    }
    println!("{}", serde_json::to_string_pretty(&redacted)?);
    Ok(())
}

fn init_logging(verbosity: u8, configured_level: &str) {
    // stdout carries the MCP JSON-RPC stream; everything observable goes to
    // stderr.  RUST_LOG overrides both LOG_LEVEL and -v.
    let level = match verbosity {
        0 => configured_level.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

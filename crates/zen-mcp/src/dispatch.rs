// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! The request dispatcher behind the MCP boundary.
//!
//! One entry point for every `tools/call`: look the tool up (the disable
//! list already filtered the registry), hand it to the runtime its record
//! names, and serialize either the success envelope or the error taxonomy
//! into the MCP result.  Errors are data here, not transport failures: the
//! host receives `is_error: true` with a stable `kind` it can switch on.

use std::sync::Arc;

use rmcp::model::{CallToolResult, Content};
use serde_json::{json, Value};
use tracing::{debug, warn};

use zen_tools::{
    run_simple, run_workflow, EnvelopeMetadata, RuntimeKind, ToolContext, ToolEnvelope,
    ToolError, ToolRegistry, ToolSpec, ToolStatus,
};

pub struct Dispatcher {
    pub ctx: Arc<ToolContext>,
    pub registry: Arc<ToolRegistry>,
    server_version: &'static str,
}

impl Dispatcher {
    pub fn new(ctx: Arc<ToolContext>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            ctx,
            registry,
            server_version: env!("CARGO_PKG_VERSION"),
        }
    }

    /// Handle one tool call end to end.
    pub async fn dispatch(&self, name: &str, args: Value) -> CallToolResult {
        let Some(spec) = self.registry.get(name) else {
            return error_result(name, &ToolError::UnknownTool(name.to_string()));
        };

        debug!(tool = name, "dispatching tool call");

        let outcome = match spec.runtime {
            RuntimeKind::Simple => run_simple(&self.ctx, spec, &args).await,
            RuntimeKind::Workflow => run_workflow(&self.ctx, spec, &args).await,
            RuntimeKind::Local => Ok(self.run_local(spec)),
        };

        match outcome {
            Ok(envelope) => success_result(&envelope),
            Err(err) => {
                warn!(tool = name, kind = err.kind(), error = %err, "tool call failed");
                error_result(name, &err)
            }
        }
    }

    /// Utility tools answered without a provider call.
    fn run_local(&self, spec: &ToolSpec) -> ToolEnvelope {
        let payload = match spec.name {
            "listmodels" => {
                let models: Vec<Value> = self
                    .ctx
                    .router
                    .available_models()
                    .into_iter()
                    .map(|m| {
                        json!({
                            "name": m.id,
                            "display_name": m.name,
                            "provider": m.provider,
                            "context_window": m.context_window,
                            "category": m.category,
                            "aliases": m.aliases,
                        })
                    })
                    .collect();
                json!({ "models": models })
            }
            _ => {
                let providers: Vec<&str> = self
                    .ctx
                    .router
                    .providers()
                    .iter()
                    .map(|p| p.tag())
                    .collect();
                json!({
                    "version": self.server_version,
                    "providers": providers,
                    "tools": self.registry.names(),
                    "default_model": self.ctx.config.default_model,
                })
            }
        };
        ToolEnvelope::json(
            ToolStatus::Success,
            &payload,
            EnvelopeMetadata::for_tool(spec.name),
        )
    }
}

fn success_result(envelope: &ToolEnvelope) -> CallToolResult {
    let body = serde_json::to_string_pretty(envelope).unwrap_or_else(|_| "{}".into());
    CallToolResult::success(vec![Content::text(body)])
}

fn error_result(tool: &str, err: &ToolError) -> CallToolResult {
    let body = json!({
        "status": "error",
        "kind": err.kind(),
        "message": err.to_string(),
        "metadata": { "tool": tool },
    });
    CallToolResult {
        content: vec![Content::text(
            serde_json::to_string_pretty(&body).unwrap_or_else(|_| "{}".into()),
        )],
        is_error: Some(true),
        structured_content: None,
        meta: None,
    }
}

// ─── Unit tests ───────────────────────────────────────────────────────────────

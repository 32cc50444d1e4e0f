// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! [`ZenMcpServer`] — the rmcp [`ServerHandler`] implementation.
//!
//! Implements the MCP `tools/list` and `tools/call` protocol methods over
//! the [`Dispatcher`]; all other MCP lifecycle methods (initialize,
//! shutdown, ping) use the default rmcp implementations.  Unlike the tools
//! themselves the handler carries no state: conversation threads live in
//! the dispatcher's [`zen_tools::ToolContext`].

use std::sync::Arc;

use rmcp::{
    handler::server::ServerHandler,
    model::{
        CallToolRequestParams, CallToolResult, Implementation, JsonObject, ListToolsResult,
        PaginatedRequestParams, ServerCapabilities, ServerInfo, Tool as McpTool,
    },
    service::{RequestContext, RoleServer},
    ErrorData as McpError,
};
use serde_json::Value;

use zen_tools::schema_for;

use crate::dispatch::Dispatcher;

#[derive(Clone)]
pub struct ZenMcpServer {
    dispatcher: Arc<Dispatcher>,
}

impl ZenMcpServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    fn tool_listing(&self) -> Vec<McpTool> {
        let auto_mode = self.dispatcher.ctx.config.is_auto_mode();
        self.dispatcher
            .registry
            .enabled()
            .map(|spec| {
                let schema = schema_for(spec, auto_mode);
                McpTool::new(
                    std::borrow::Cow::Borrowed(spec.name),
                    std::borrow::Cow::Borrowed(spec.description),
                    Arc::new(value_to_object(schema)),
                )
            })
            .collect()
    }
}

/// MCP requires the input schema to be a JSON object; wrap anything else in
/// a minimal envelope so the listing never fails.
fn value_to_object(v: Value) -> JsonObject {
    use serde_json::Map;
    match v {
        Value::Object(m) => m,
        other => {
            let mut m = Map::new();
            m.insert("type".to_string(), Value::String("object".to_string()));
            m.insert("value".to_string(), other);
            m
        }
    }
}

impl ServerHandler for ZenMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "zen".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Implementation::default()
            },
            ..ServerInfo::default()
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        let tools = self.tool_listing();
        async move {
            Ok(ListToolsResult {
                tools,
                next_cursor: None,
                meta: None,
            })
        }
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let args = request
            .arguments
            .map(|m| Value::Object(m.into_iter().collect()))
            .unwrap_or(Value::Object(serde_json::Map::new()));

        Ok(self.dispatcher.dispatch(&request.name, args).await)
    }
}

// ─── Unit tests ───────────────────────────────────────────────────────────────

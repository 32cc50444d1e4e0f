// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `zen-mcp` — the MCP (Model Context Protocol) surface of the zen server.
//!
//! Exposes the tool catalogue to any MCP-compatible host (Claude Desktop,
//! Cursor, opencode, …) over **stdio** transport using line-delimited
//! JSON-RPC.
//!
//! # Host configuration (`mcp.json`)
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "zen": {
//!       "command": "zen",
//!       "args": ["serve"],
//!       "env": { "GEMINI_API_KEY": "..." }
//!     }
//!   }
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! MCP host (Claude Desktop, Cursor, …)
//!       │  stdin/stdout (line-delimited JSON-RPC)
//!       ▼
//! ZenMcpServer (rmcp ServerHandler)
//!       │
//!       ▼
//! Dispatcher ──► simple / workflow runtime ──► provider router
//! ```

pub mod dispatch;
pub mod server;

pub use dispatch::Dispatcher;
pub use server::ZenMcpServer;

use std::sync::Arc;

use anyhow::Result;
use rmcp::ServiceExt;

/// Serve MCP on stdin/stdout until the host disconnects.
///
/// Blocks for the process lifetime; designed to be the sole operation of
/// the `zen serve` subcommand.  Logging must already be routed to stderr;
/// stdout belongs to the protocol.
pub async fn serve_stdio(dispatcher: Arc<Dispatcher>) -> Result<()> {
    let server = ZenMcpServer::new(dispatcher);
    let running = server
        .serve((tokio::io::stdin(), tokio::io::stdout()))
        .await
        .map_err(|e| anyhow::anyhow!("MCP server init error: {e}"))?;
    running
        .waiting()
        .await
        .map_err(|e| anyhow::anyhow!("MCP server error: {e}"))?;
    Ok(())
}

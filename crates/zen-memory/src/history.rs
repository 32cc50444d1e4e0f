// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Context revival: rebuild a prior conversation into a prompt prefix.
//!
//! Selection walks the turns newest-first so that when the token budget
//! runs out it is the oldest turns that fall off; the surviving turns are
//! then emitted in chronological order, each kept whole.  File contents are
//! embedded once, from the file budget, with the newest occurrence winning;
//! the embedded set is reported back so the current turn's embedder can
//! list those files as already-in-conversation instead of repeating them.

use std::collections::BTreeSet;
use std::path::PathBuf;

use tracing::{debug, warn};
use zen_files::{embed_files, estimate_tokens, EmbedOptions};

use crate::thread::{ConversationThread, TurnRole};

#[derive(Debug, Clone, Copy)]
pub struct HistoryBudget {
    /// Tokens available for the rendered turns.
    pub history_tokens: usize,
    /// Tokens available for re-embedded file contents.
    pub file_tokens: usize,
    /// How many of the most recent images are reattached.
    pub max_images: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AssembledHistory {
    /// The prompt prefix: files block plus chronological turns.
    pub text: String,
    /// Files whose content is embedded in `text`.
    pub embedded_files: Vec<PathBuf>,
    /// Most recent images, ready for reattachment (chronological order).
    pub images: Vec<String>,
    /// Turns dropped because the budget ran out.
    pub dropped_turns: usize,
    /// Estimated size of `text`.
    pub tokens: usize,
}

/// Rebuild `thread` into a prompt prefix under `budget`.
pub fn assemble(thread: &ConversationThread, budget: &HistoryBudget) -> AssembledHistory {
    if thread.turns.is_empty() {
        return AssembledHistory::default();
    }

    // ── Select turns, newest first ────────────────────────────────────────
    let mut kept = 0usize;
    let mut used = 0usize;
    for turn in thread.turns.iter().rev() {
        let cost = estimate_tokens(&turn.content) + 24; // header overhead
        if used + cost > budget.history_tokens {
            break;
        }
        used += cost;
        kept += 1;
    }
    let dropped = thread.turns.len() - kept;
    let included = &thread.turns[dropped..];

    // ── Images: most recent N, across the included turns ──────────────────
    let mut reattached: Vec<String> = Vec::new();
    let mut seen_images = BTreeSet::new();
    for turn in included.iter().rev() {
        for image in turn.images.iter().rev() {
            if reattached.len() >= budget.max_images {
                break;
            }
            if seen_images.insert(image.clone()) {
                reattached.push(image.clone());
            }
        }
    }
    reattached.reverse(); // chronological

    // ── Files: newest occurrence wins, embedded once ──────────────────────
    let mut file_order: Vec<PathBuf> = Vec::new();
    let mut seen_files = BTreeSet::new();
    for turn in included.iter().rev() {
        for file in &turn.files {
            if seen_files.insert(file.clone()) {
                file_order.push(file.clone());
            }
        }
    }

    let mut sections: Vec<String> = Vec::new();
    let mut embedded_files = Vec::new();
    if !file_order.is_empty() && budget.file_tokens > 0 {
        let opts = EmbedOptions {
            token_budget: budget.file_tokens,
            section_label: "FILES REFERENCED IN THIS CONVERSATION".into(),
            ..EmbedOptions::default()
        };
        match embed_files(&file_order, &opts) {
            Ok(embedded) => {
                if !embedded.block.is_empty() {
                    sections.push(embedded.block);
                }
                embedded_files = embedded.embedded;
            }
            Err(e) => warn!(error = %e, "skipping history file embedding"),
        }
    }

    // ── Turns, chronological ──────────────────────────────────────────────
    let mut lines = Vec::new();
    lines.push("=== CONVERSATION HISTORY (continuation) ===".to_string());
    if dropped > 0 {
        lines.push(format!(
            "[{dropped} earlier turn(s) dropped to fit the context budget]"
        ));
    }
    for (offset, turn) in included.iter().enumerate() {
        let index = dropped + offset + 1;
        let header = match turn.role {
            TurnRole::User => format!("--- Turn {index} (user) via {} ---", turn.tool_name),
            TurnRole::Assistant => format!(
                "--- Turn {index} (assistant) via {}{} ---",
                turn.tool_name,
                turn.model_name
                    .as_deref()
                    .map(|m| format!(" [model: {m}]"))
                    .unwrap_or_default()
            ),
        };
        lines.push(header);
        lines.push(turn.content.clone());
        if !turn.files.is_empty() {
            let listing = turn
                .files
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            lines.push(format!("Files referenced: {listing}"));
        }
        for image in &turn.images {
            if reattached.contains(image) {
                lines.push(format!("Image attached: {image}"));
            } else {
                lines.push(format!("[image {image} from this turn was not reattached]"));
            }
        }
    }
    lines.push("=== END CONVERSATION HISTORY ===".to_string());

    let mut text = String::new();
    if !sections.is_empty() {
        text.push_str(&sections.join("\n"));
        text.push('\n');
    }
    text.push_str(&lines.join("\n"));

    let tokens = estimate_tokens(&text);
    debug!(
        thread = %thread.id,
        kept,
        dropped,
        files = embedded_files.len(),
        images = reattached.len(),
        tokens,
        "assembled conversation history"
    );

    AssembledHistory {
        text,
        embedded_files,
        images: reattached,
        dropped_turns: dropped,
        tokens,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

/// Optional per-turn token accounting, copied from the provider response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTokens {
    pub input: u32,
    pub output: u32,
}

/// One turn in a conversation thread.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
    /// Tool that produced (assistant) or consumed (user) this turn.
    pub tool_name: String,
    /// Model that generated an assistant turn.
    pub model_name: Option<String>,
    /// Files referenced in this turn, caller order.
    pub files: Vec<PathBuf>,
    /// Image references (absolute paths or data URIs), caller order.
    pub images: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub tokens: Option<TurnTokens>,
}

impl ConversationTurn {
    pub fn user(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            tool_name: tool_name.into(),
            model_name: None,
            files: Vec::new(),
            images: Vec::new(),
            timestamp: Utc::now(),
            tokens: None,
        }
    }

    pub fn assistant(
        tool_name: impl Into<String>,
        model_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            tool_name: tool_name.into(),
            model_name: Some(model_name.into()),
            files: Vec::new(),
            images: Vec::new(),
            timestamp: Utc::now(),
            tokens: None,
        }
    }

    pub fn with_files(mut self, files: Vec<PathBuf>) -> Self {
        self.files = files;
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    pub fn with_tokens(mut self, input: u32, output: u32) -> Self {
        self.tokens = Some(TurnTokens { input, output });
        self
    }
}

/// A UUID-keyed conversation that can span multiple tool invocations.
#[derive(Debug, Clone)]
pub struct ConversationThread {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Tool that opened the thread.
    pub tool_name: String,
    /// Most recent model that produced an assistant turn.
    pub model_name: Option<String>,
    pub turns: Vec<ConversationTurn>,
}

impl ConversationThread {
    pub fn new(tool_name: impl Into<String>, model_name: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_accessed: now,
            tool_name: tool_name.into(),
            model_name,
            turns: Vec::new(),
        }
    }

    /// Every file referenced anywhere in the thread (deduplicated).
    pub fn files_seen(&self) -> BTreeSet<PathBuf> {
        self.turns
            .iter()
            .flat_map(|t| t.files.iter().cloned())
            .collect()
    }

    /// Every image reference anywhere in the thread (deduplicated,
    /// insertion order preserved).
    pub fn images_seen(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for turn in &self.turns {
            for image in &turn.images {
                if seen.insert(image.clone()) {
                    out.push(image.clone());
                }
            }
        }
        out
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

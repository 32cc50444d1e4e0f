// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Tool definitions as data.
//!
//! A tool is a record, not a subclass: one [`ToolSpec`] per tool holds the
//! schema fragment, the system prompt, the primary input field and the
//! hooks the runtimes call.  The simple and workflow runtimes are single
//! functions parameterized by the record, so adding a tool means adding a
//! value to `crate::catalog`, never a new type.

use std::collections::BTreeSet;

use zen_model::ModelCategory;

use crate::workflow::{Confidence, WorkflowState, WorkflowStep};

/// Which runtime executes a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    /// One-shot: validate → assemble → one provider call → persist.
    Simple,
    /// Host-driven multi-step investigation with a terminal expert call.
    Workflow,
    /// Answered locally, no provider involved (version, listmodels).
    Local,
}

/// Hooks a workflow tool plugs into the shared state machine.
#[derive(Clone, Copy)]
pub struct WorkflowHooks {
    /// Actions the host is told to perform before the next step.
    pub required_actions: fn(step_number: u32, confidence: Confidence) -> Vec<String>,
    /// Tool-specific monotone preconditions.  `Err` carries the violated
    /// precondition's name and rejects the step without mutating anything.
    pub validate_step: fn(step: &WorkflowStep, state: &WorkflowState) -> Result<(), String>,
    /// Whether the terminal step performs the expert-analysis call.
    pub should_call_expert: fn(state: &WorkflowState) -> bool,
}

/// One tool, described declaratively.
#[derive(Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Capability bucket used when the request says `model: "auto"`.
    pub category: ModelCategory,
    pub runtime: RuntimeKind,
    /// Field the prompt (or reconstructed history) is read from; differs
    /// per tool so cross-tool continuation lands in the right place.
    pub primary_field: &'static str,
    pub system_prompt: &'static str,
    pub default_temperature: f32,
    /// Reject arguments whose keys are not in this tool's schema.
    /// Lenient tools silently ignore unrecognized fields.
    pub strict: bool,
    /// Consensus-style tools consult every model in the `models` field.
    pub multi_model: bool,
    /// Extra JSON-schema properties beyond the common set.
    pub extra_schema: Option<fn() -> serde_json::Map<String, serde_json::Value>>,
    pub hooks: Option<WorkflowHooks>,
}

impl ToolSpec {
    /// A minimal simple tool; the catalogue builds on this.
    pub fn simple(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            category: ModelCategory::Balanced,
            runtime: RuntimeKind::Simple,
            primary_field: "prompt",
            system_prompt: "",
            default_temperature: 0.5,
            strict: false,
            multi_model: false,
            extra_schema: None,
            hooks: None,
        }
    }
}

impl std::fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("runtime", &self.runtime)
            .field("category", &self.category)
            .field("primary_field", &self.primary_field)
            .finish()
    }
}

/// All tools, with the configured disable-list applied.
///
/// Disabled tools are invisible: not enumerated, not callable.
pub struct ToolRegistry {
    specs: Vec<ToolSpec>,
    disabled: BTreeSet<String>,
}

impl ToolRegistry {
    pub fn new(specs: Vec<ToolSpec>, disabled: &[String]) -> Self {
        Self {
            specs,
            disabled: disabled.iter().cloned().collect(),
        }
    }

    /// Look up an enabled tool.
    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        if self.disabled.contains(name) {
            return None;
        }
        self.specs.iter().find(|s| s.name == name)
    }

    /// Enabled tools in declaration order.
    pub fn enabled(&self) -> impl Iterator<Item = &ToolSpec> {
        self.specs
            .iter()
            .filter(|s| !self.disabled.contains(s.name))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.enabled().map(|s| s.name).collect()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

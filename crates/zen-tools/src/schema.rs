// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! JSON Schema assembly for tool listings.
//!
//! Every tool's schema is the common field set plus the runtime-specific
//! fields plus whatever the spec's `extra_schema` contributes.  The `model`
//! field is required only in auto mode, where the host must pick (or say
//! `auto` and accept category routing).

use serde_json::{json, Map, Value};

use crate::spec::{RuntimeKind, ToolSpec};

/// Build the input schema for one tool.
pub fn schema_for(spec: &ToolSpec, auto_mode: bool) -> Value {
    let mut properties = Map::new();
    let mut required: Vec<&str> = Vec::new();

    properties.insert(
        "model".into(),
        json!({
            "type": "string",
            "description": "Model name or alias; 'auto' lets the server pick by tool category"
        }),
    );
    properties.insert(
        "temperature".into(),
        json!({
            "type": "number",
            "minimum": 0.0,
            "maximum": 1.0,
            "description": "Sampling temperature; clamped to the model's constraint"
        }),
    );
    properties.insert(
        "thinking_mode".into(),
        json!({
            "type": "string",
            "enum": ["minimal", "low", "medium", "high", "max"],
            "description": "Reasoning budget for models with extended thinking; ignored otherwise"
        }),
    );
    properties.insert(
        "use_websearch".into(),
        json!({
            "type": "boolean",
            "default": true,
            "description": "Allow the assistant to recommend web searches for the agent to run"
        }),
    );
    properties.insert(
        "files".into(),
        json!({
            "type": "array",
            "items": { "type": "string" },
            "description": "Absolute paths of files or directories to embed as context"
        }),
    );
    properties.insert(
        "images".into(),
        json!({
            "type": "array",
            "items": { "type": "string" },
            "description": "Absolute image paths or data URIs for vision-capable models"
        }),
    );
    properties.insert(
        "continuation_id".into(),
        json!({
            "type": "string",
            "description": "Thread UUID from a previous response to continue that conversation"
        }),
    );
    properties.insert(
        "locale".into(),
        json!({
            "type": "string",
            "description": "BCP-47 language tag for the response language"
        }),
    );

    match spec.runtime {
        RuntimeKind::Simple => {
            properties.insert(
                spec.primary_field.into(),
                json!({
                    "type": "string",
                    "description": "The request to send to the model"
                }),
            );
            required.push(spec.primary_field);
        }
        RuntimeKind::Workflow => {
            add_workflow_fields(&mut properties);
            required.extend([
                "step",
                "step_number",
                "total_steps",
                "next_step_required",
                "findings",
            ]);
        }
        RuntimeKind::Local => {}
    }

    if spec.multi_model {
        required.push("models");
    }
    if auto_mode && spec.runtime != RuntimeKind::Local {
        required.push("model");
    }

    if let Some(extra) = spec.extra_schema {
        for (key, value) in extra() {
            properties.insert(key, value);
        }
    }

    let mut schema = json!({
        "type": "object",
        "properties": properties,
        "required": required,
    });
    if spec.strict {
        schema["additionalProperties"] = json!(false);
    }
    schema
}

fn add_workflow_fields(properties: &mut Map<String, Value>) {
    properties.insert(
        "step".into(),
        json!({ "type": "string", "description": "What was investigated in this step" }),
    );
    properties.insert(
        "step_number".into(),
        json!({ "type": "integer", "minimum": 1, "description": "1-indexed step counter" }),
    );
    properties.insert(
        "total_steps".into(),
        json!({ "type": "integer", "minimum": 1, "description": "Current estimate of total steps; may be revised" }),
    );
    properties.insert(
        "next_step_required".into(),
        json!({ "type": "boolean", "description": "False on the terminal step" }),
    );
    properties.insert(
        "findings".into(),
        json!({ "type": "string", "description": "New findings from this step; accumulated across steps" }),
    );
    properties.insert(
        "files_checked".into(),
        json!({ "type": "array", "items": { "type": "string" }, "description": "Absolute paths examined so far" }),
    );
    properties.insert(
        "relevant_files".into(),
        json!({ "type": "array", "items": { "type": "string" }, "description": "Subset of files_checked that matters for the result" }),
    );
    properties.insert(
        "relevant_context".into(),
        json!({ "type": "array", "items": { "type": "string" }, "description": "Relevant symbols: ClassName.method or function_name" }),
    );
    properties.insert(
        "confidence".into(),
        json!({
            "type": "string",
            "enum": ["exploring", "low", "medium", "high", "very_high", "almost_certain", "certain"],
            "description": "Confidence in the current hypothesis"
        }),
    );
    properties.insert(
        "issues_found".into(),
        json!({
            "type": "array",
            "items": {
                "type": "object",
                "properties": {
                    "severity": { "type": "string" },
                    "description": { "type": "string" }
                }
            },
            "description": "Issues identified so far, with severity"
        }),
    );
    properties.insert(
        "hypothesis".into(),
        json!({ "type": "string", "description": "Current working theory" }),
    );
    properties.insert(
        "backtrack_from_step".into(),
        json!({ "type": "integer", "minimum": 1, "description": "Rewind to this step, discarding later findings" }),
    );
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin_tools;

    fn tool(name: &str) -> ToolSpec {
        builtin_tools().into_iter().find(|s| s.name == name).unwrap()
    }

    fn required_of(schema: &Value) -> Vec<String> {
        schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn simple_tool_requires_its_primary_field() {
        let schema = schema_for(&tool("chat"), false);
        assert!(required_of(&schema).contains(&"prompt".to_string()));
        assert!(schema["properties"]["prompt"].is_object());
    }

    #[test]
    fn workflow_tool_requires_step_fields_instead_of_prompt() {
        let schema = schema_for(&tool("debug"), false);
        let required = required_of(&schema);
        for field in ["step", "step_number", "total_steps", "next_step_required", "findings"] {
            assert!(required.contains(&field.to_string()), "missing {field}");
        }
        assert!(
            schema["properties"].get("prompt").is_none(),
            "workflow tools have no prompt field"
        );
    }

    #[test]
    fn model_required_only_in_auto_mode() {
        let manual = schema_for(&tool("chat"), false);
        let auto = schema_for(&tool("chat"), true);
        assert!(!required_of(&manual).contains(&"model".to_string()));
        assert!(required_of(&auto).contains(&"model".to_string()));
    }

    #[test]
    fn local_tools_never_require_model() {
        let schema = schema_for(&tool("version"), true);
        assert!(!required_of(&schema).contains(&"model".to_string()));
    }

    #[test]
    fn common_fields_are_present_everywhere() {
        for spec in builtin_tools() {
            let schema = schema_for(&spec, false);
            for field in ["model", "temperature", "thinking_mode", "continuation_id", "locale"] {
                assert!(
                    schema["properties"].get(field).is_some(),
                    "{} lacks common field {field}",
                    spec.name
                );
            }
        }
    }

    #[test]
    fn consensus_schema_requires_models_list() {
        let schema = schema_for(&tool("consensus"), false);
        assert!(required_of(&schema).contains(&"models".to_string()));
        assert!(schema["properties"]["models"].is_object());
    }

    #[test]
    fn extra_schema_fields_are_merged() {
        let schema = schema_for(&tool("tracer"), false);
        assert!(schema["properties"]["trace_mode"].is_object());
        let schema = schema_for(&tool("docgen"), false);
        assert!(schema["properties"]["num_files_documented"].is_object());
    }

    #[test]
    fn temperature_is_bounded_in_every_schema() {
        for spec in builtin_tools() {
            let schema = schema_for(&spec, false);
            assert_eq!(schema["properties"]["temperature"]["maximum"], 1.0);
        }
    }

    #[test]
    fn strict_tools_forbid_additional_properties() {
        let strict = schema_for(&tool("consensus"), false);
        assert_eq!(strict["additionalProperties"], false);
        let lenient = schema_for(&tool("chat"), false);
        assert!(lenient.get("additionalProperties").is_none());
    }
}

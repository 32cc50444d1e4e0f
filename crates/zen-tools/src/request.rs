// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Request parsing shared by the runtimes.
//!
//! Tool arguments arrive as loose JSON from the MCP host; this module pulls
//! out the common fields with errors that name the offending field, leaving
//! tool-specific fields to each runtime.

use std::path::PathBuf;

use serde_json::Value;
use uuid::Uuid;

use zen_model::ThinkingMode;

use crate::error::ToolError;
use crate::spec::ToolSpec;

/// The fields every tool understands.
#[derive(Debug, Clone, Default)]
pub struct CommonRequest {
    pub files: Vec<PathBuf>,
    pub images: Vec<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub thinking: Option<ThinkingMode>,
    pub use_websearch: bool,
    pub continuation_id: Option<Uuid>,
    pub locale: Option<String>,
    /// Models consulted by multi-model tools (`consensus`).
    pub models: Vec<String>,
}

pub fn parse_common(args: &Value) -> Result<CommonRequest, ToolError> {
    Ok(CommonRequest {
        files: parse_paths(args, "files")?,
        images: parse_strings(args, "images")?,
        model: parse_string(args, "model")?,
        temperature: parse_temperature(args)?,
        thinking: parse_thinking(args)?,
        use_websearch: args
            .get("use_websearch")
            .map(|v| {
                v.as_bool().ok_or_else(|| {
                    ToolError::validation("use_websearch", "expected a boolean")
                })
            })
            .transpose()?
            .unwrap_or(true),
        continuation_id: parse_continuation(args)?,
        locale: parse_string(args, "locale")?,
        models: parse_strings(args, "models")?,
    })
}

/// Enforce strict-mode validation: every argument key must appear in the
/// tool's declared schema.
///
/// Lenient tools never call this; for strict tools an unrecognized key is
/// a hard failure naming the offending field, so a typo'd parameter cannot
/// silently change behaviour.
pub fn reject_unknown_fields(
    spec: &ToolSpec,
    args: &Value,
    auto_mode: bool,
) -> Result<(), ToolError> {
    let Some(object) = args.as_object() else {
        return Ok(());
    };
    let schema = crate::schema::schema_for(spec, auto_mode);
    let empty = serde_json::Map::new();
    let known = schema["properties"].as_object().unwrap_or(&empty);
    for key in object.keys() {
        if !known.contains_key(key) {
            return Err(ToolError::validation(
                key.clone(),
                format!("unknown field; the {} tool rejects unrecognized fields", spec.name),
            ));
        }
    }
    Ok(())
}

/// Read the tool's primary input field as a required string.
pub fn parse_primary(spec: &ToolSpec, args: &Value) -> Result<String, ToolError> {
    match args.get(spec.primary_field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ToolError::validation(spec.primary_field, "expected a string")),
        None => Err(ToolError::validation(
            spec.primary_field,
            "required field is missing",
        )),
    }
}

pub fn parse_string(args: &Value, field: &str) -> Result<Option<String>, ToolError> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(ToolError::validation(field, "expected a string")),
    }
}

pub fn parse_strings(args: &Value, field: &str) -> Result<Vec<String>, ToolError> {
    match args.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ToolError::validation(field, "expected an array of strings"))
            })
            .collect(),
        Some(_) => Err(ToolError::validation(field, "expected an array of strings")),
    }
}

pub fn parse_paths(args: &Value, field: &str) -> Result<Vec<PathBuf>, ToolError> {
    Ok(parse_strings(args, field)?.into_iter().map(PathBuf::from).collect())
}

fn parse_temperature(args: &Value) -> Result<Option<f32>, ToolError> {
    match args.get("temperature") {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let t = v
                .as_f64()
                .ok_or_else(|| ToolError::validation("temperature", "expected a number"))?
                as f32;
            if !(0.0..=1.0).contains(&t) {
                return Err(ToolError::validation(
                    "temperature",
                    format!("{t} is outside [0, 1]"),
                ));
            }
            Ok(Some(t))
        }
    }
}

fn parse_thinking(args: &Value) -> Result<Option<ThinkingMode>, ToolError> {
    match args.get("thinking_mode") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => ThinkingMode::parse(s).map(Some).ok_or_else(|| {
            ToolError::validation(
                "thinking_mode",
                format!("{s:?} is not one of minimal/low/medium/high/max"),
            )
        }),
        Some(_) => Err(ToolError::validation("thinking_mode", "expected a string")),
    }
}

fn parse_continuation(args: &Value) -> Result<Option<Uuid>, ToolError> {
    match parse_string(args, "continuation_id")? {
        None => Ok(None),
        Some(raw) => Uuid::parse_str(&raw).map(Some).map_err(|_| {
            ToolError::validation("continuation_id", format!("{raw:?} is not a UUID"))
        }),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

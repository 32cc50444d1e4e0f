// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Token-aware multi-file embedding for prompts.
//!
//! Files are rendered into a single labelled block, budgeted by extension
//! tier: source code gets the bulk of the tokens, documentation and config
//! less, plain text a sliver, and log files none at all.  Within a tier
//! every file shares the tier budget equally; a file that would exceed its
//! share is cut at a line boundary with an explicit truncation notice.
//!
//! Cross-turn deduplication: a caller continuing a conversation passes the
//! set of files already embedded in earlier turns; those are listed by path
//! only.  The placeholder is used even when the file has changed on disk
//! since the earlier turn, so stale content is possible within a thread;
//! a caller that needs fresh content must start a new conversation.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::tokens::chars_for_tokens;

/// Name of the file the large-prompt escape asks the host to write.
pub const PROMPT_FILE_NAME: &str = "prompt.txt";

/// Extension tiers, highest priority first.  Budget shares: 60/30/10/0.
const SOURCE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "ts", "jsx", "tsx", "go", "java", "c", "h", "cpp", "hpp", "cc", "cs", "rb",
    "swift", "kt", "php", "scala", "sh", "bash", "zig", "lua", "sql",
];
const DOC_EXTENSIONS: &[&str] = &[
    "md", "rst", "adoc", "json", "yaml", "yml", "toml", "ini", "cfg", "xml", "html", "css",
];
const TEXT_EXTENSIONS: &[&str] = &["txt", "csv", "tsv", "env"];
const LOG_EXTENSIONS: &[&str] = &["log"];

const TIER_SHARES: [f32; 4] = [0.60, 0.30, 0.10, 0.0];

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("file path must be absolute: {0}")]
    FilePathNotAbsolute(PathBuf),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("file access denied: {0}")]
    FileAccessDenied(PathBuf),
}

impl EmbedError {
    /// Stable machine-readable kind, used in the MCP error envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            EmbedError::FilePathNotAbsolute(_) => "file_path_not_absolute",
            EmbedError::FileNotFound(_) => "file_not_found",
            EmbedError::FileAccessDenied(_) => "file_access_denied",
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbedOptions {
    /// Token budget for the whole block.
    pub token_budget: usize,
    /// Prefix every content line with its 1-indexed line number.
    pub line_numbers: bool,
    /// Fail the call on a per-file error instead of emitting a placeholder.
    pub strict: bool,
    /// Files already embedded in earlier turns of the same conversation.
    pub already_embedded: BTreeSet<PathBuf>,
    /// Heading rendered above the block.
    pub section_label: String,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            token_budget: 100_000,
            line_numbers: false,
            strict: false,
            already_embedded: BTreeSet::new(),
            section_label: "CONTEXT FILES".into(),
        }
    }
}

/// The rendered block plus what actually went into it.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedFiles {
    pub block: String,
    /// Files whose content is present in the block, in render order.
    pub embedded: Vec<PathBuf>,
    /// Files listed without content, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

/// Pull the large-prompt-escape file out of a path list.
///
/// When the host re-sends an oversize prompt, the prompt text arrives as a
/// file named [`PROMPT_FILE_NAME`] inside `files`.  Returns the file's
/// content (the effective prompt) and the remaining paths; the prompt file
/// itself is never embedded.
pub fn take_prompt_file(paths: &[PathBuf]) -> Result<Option<(String, Vec<PathBuf>)>, EmbedError> {
    let position = paths
        .iter()
        .position(|p| p.file_name().is_some_and(|n| n == PROMPT_FILE_NAME));
    let Some(position) = position else {
        return Ok(None);
    };

    let prompt_path = &paths[position];
    let content = read_text(prompt_path)?;
    let remaining = paths
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != position)
        .map(|(_, p)| p.clone())
        .collect();
    Ok(Some((content, remaining)))
}

/// Embed `paths` (files or directories) into one block under the budget.
///
/// Idempotent: identical inputs produce byte-identical output.
pub fn embed_files(paths: &[PathBuf], opts: &EmbedOptions) -> Result<EmbeddedFiles, EmbedError> {
    for path in paths {
        if !path.is_absolute() {
            return Err(EmbedError::FilePathNotAbsolute(path.clone()));
        }
    }

    let mut result = EmbeddedFiles::default();

    // Expand directories, drop duplicates, keep caller order otherwise.
    let mut files: Vec<PathBuf> = Vec::new();
    let mut seen = BTreeSet::new();
    let mut unreadable: Vec<String> = Vec::new();
    for path in paths {
        for file in expand(path, opts, &mut result, &mut unreadable)? {
            if seen.insert(file.clone()) {
                files.push(file);
            }
        }
    }

    // Partition into already-embedded references and fresh files per tier.
    let mut fresh: [Vec<PathBuf>; 4] = Default::default();
    let mut references: Vec<PathBuf> = Vec::new();
    for file in files {
        if opts.already_embedded.contains(&file) {
            references.push(file);
        } else {
            fresh[tier_of(&file)].push(file);
        }
    }

    let mut sections = unreadable;

    for (tier, tier_files) in fresh.iter().enumerate() {
        if tier_files.is_empty() {
            continue;
        }
        let tier_budget = (opts.token_budget as f32 * TIER_SHARES[tier]) as usize;
        if tier_budget == 0 {
            for file in tier_files {
                result
                    .skipped
                    .push((file.clone(), "excluded by budget tier".into()));
                sections.push(format!("--- SKIPPED: {} (excluded by budget tier) ---", file.display()));
            }
            continue;
        }
        let share_chars = chars_for_tokens(tier_budget / tier_files.len());
        for file in tier_files {
            match render_file(file, share_chars, opts) {
                Ok(rendered) => {
                    sections.push(rendered);
                    result.embedded.push(file.clone());
                }
                Err(err) if opts.strict => return Err(err),
                Err(err) => {
                    sections.push(format!("--- SKIPPED: {} ({err}) ---", file.display()));
                    result.skipped.push((file.clone(), err.to_string()));
                }
            }
        }
    }

    for file in &references {
        sections.push(format!(
            "--- FILE: {} [already in conversation] ---",
            file.display()
        ));
        result
            .skipped
            .push((file.clone(), "already in conversation".into()));
    }

    if !sections.is_empty() {
        result.block = format!(
            "=== {} ===\n{}\n=== END {} ===",
            opts.section_label,
            sections.join("\n"),
            opts.section_label
        );
    }

    debug!(
        embedded = result.embedded.len(),
        skipped = result.skipped.len(),
        block_chars = result.block.len(),
        "embedded files"
    );

    Ok(result)
}

/// Expand a path into the files it denotes.
///
/// Directories walk depth-first with lexicographic order per directory and
/// are filtered to recognized extensions; unknown-extension direct files
/// are kept (the caller asked for them explicitly).
fn expand(
    path: &Path,
    opts: &EmbedOptions,
    result: &mut EmbeddedFiles,
    placeholders: &mut Vec<String>,
) -> Result<Vec<PathBuf>, EmbedError> {
    let metadata = match std::fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            let err = classify_io_error(path, e);
            if opts.strict {
                return Err(err);
            }
            placeholders.push(format!("--- SKIPPED: {} ({err}) ---", path.display()));
            result.skipped.push((path.to_path_buf(), err.to_string()));
            return Ok(Vec::new());
        }
    };

    if metadata.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if entry.file_type().is_file() && has_recognized_extension(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }
    Ok(files)
}

fn classify_io_error(path: &Path, e: std::io::Error) -> EmbedError {
    match e.kind() {
        std::io::ErrorKind::NotFound => EmbedError::FileNotFound(path.to_path_buf()),
        std::io::ErrorKind::PermissionDenied => EmbedError::FileAccessDenied(path.to_path_buf()),
        _ => EmbedError::FileAccessDenied(path.to_path_buf()),
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn has_recognized_extension(path: &Path) -> bool {
    let ext = extension_of(path);
    SOURCE_EXTENSIONS.contains(&ext.as_str())
        || DOC_EXTENSIONS.contains(&ext.as_str())
        || TEXT_EXTENSIONS.contains(&ext.as_str())
        || LOG_EXTENSIONS.contains(&ext.as_str())
}

/// Tier index for budget allocation (0 = highest priority).
fn tier_of(path: &Path) -> usize {
    let ext = extension_of(path);
    if SOURCE_EXTENSIONS.contains(&ext.as_str()) {
        0
    } else if DOC_EXTENSIONS.contains(&ext.as_str()) {
        1
    } else if LOG_EXTENSIONS.contains(&ext.as_str()) {
        3
    } else {
        2
    }
}

fn read_text(path: &Path) -> Result<String, EmbedError> {
    let bytes = std::fs::read(path).map_err(|e| classify_io_error(path, e))?;
    // Binary files yield a placeholder, not an error; the caller sees the
    // sentinel via the rendered block.
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(_) => Ok(String::new()),
    }
}

fn render_file(path: &Path, share_chars: usize, opts: &EmbedOptions) -> Result<String, EmbedError> {
    let bytes = std::fs::read(path).map_err(|e| classify_io_error(path, e))?;

    let Ok(text) = String::from_utf8(bytes) else {
        return Ok(format!(
            "--- FILE: {} ---\n[binary file omitted]\n--- END FILE: {} ---",
            path.display(),
            path.display()
        ));
    };

    let all_lines: Vec<&str> = text.lines().collect();
    let total = all_lines.len();

    let mut selected: Vec<String> = Vec::new();
    let mut used: usize = 0;
    let mut truncated = false;
    for (i, line) in all_lines.iter().enumerate() {
        let rendered = if opts.line_numbers {
            format!("L{}:{}", i + 1, line)
        } else {
            (*line).to_string()
        };
        if used + rendered.len() + 1 > share_chars {
            truncated = true;
            break;
        }
        used += rendered.len() + 1;
        selected.push(rendered);
    }

    let mut body = selected.join("\n");
    if truncated {
        body.push_str(&format!(
            "\n...[truncated: showing {} of {} lines]",
            selected.len(),
            total
        ));
    }

    Ok(format!(
        "--- FILE: {} ---\n{}\n--- END FILE: {} ---",
        path.display(),
        body,
        path.display()
    ))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

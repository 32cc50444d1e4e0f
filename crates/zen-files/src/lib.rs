// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod embed;
pub mod images;
pub mod tokens;

pub use embed::{
    embed_files, take_prompt_file, EmbedError, EmbedOptions, EmbeddedFiles, PROMPT_FILE_NAME,
};
pub use images::{load_image, EncodedImage, ImageError};
pub use tokens::estimate_tokens;

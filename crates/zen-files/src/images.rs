// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Image preparation for vision-capable models.
//!
//! Tool calls reference images by absolute path or data URI; drivers only
//! ever see data URLs.  Every model advertises the largest image payload it
//! accepts (`max_image_bytes` in the capability record), and that limit
//! drives the whole pipeline: an image is decoded once and then re-encoded
//! at progressively smaller dimensions until the payload fits the model's
//! budget.  An image that cannot be brought under the budget is rejected
//! here, before a provider ever sees an over-limit request.
//!
//! Prepared payloads are cached per `(content, budget)` pair, so an image
//! referenced on every turn of a conversation is decoded once per model
//! class rather than once per call.

use std::io::Cursor;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use base64::{engine::general_purpose::STANDARD as B64, Engine as _};
use sha2::Digest as _;
use thiserror::Error;

/// Pixel ceiling on the longest edge, independent of the byte budget.
/// Providers reject or retile anything larger.
const MAX_DIMENSION: u32 = 3072;

/// Below this edge length further shrinking destroys the content, so the
/// fit loop gives up and reports the image as too large instead.
const MIN_DIMENSION: u32 = 64;

/// Prepared payloads kept in the in-process cache.
const CACHE_CAPACITY: usize = 32;

/// Content digest plus the byte budget it was prepared for.  The same file
/// sent to models with different limits produces different payloads.
type CacheKey = ([u8; 32], u64);

fn prepared_cache() -> &'static Mutex<lru::LruCache<CacheKey, EncodedImage>> {
    static CACHE: OnceLock<Mutex<lru::LruCache<CacheKey, EncodedImage>>> = OnceLock::new();
    CACHE.get_or_init(|| {
        Mutex::new(lru::LruCache::new(
            NonZeroUsize::new(CACHE_CAPACITY).unwrap(),
        ))
    })
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("reading image {0}: {1}")]
    Io(String, std::io::Error),

    #[error("unrecognized image format: {0}")]
    UnsupportedFormat(String),

    #[error("decoding image {0}: {1}")]
    Decode(String, String),

    #[error("encoding image: {0}")]
    Encode(String),

    #[error("image {path} cannot be reduced under the model's {limit}-byte image limit")]
    TooLarge { path: String, limit: u64 },
}

/// An image payload ready for a driver.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// MIME type, e.g. `"image/png"`.
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    /// `data:<mime>;base64,<b64>`.
    pub fn into_data_url(self) -> String {
        format!("data:{};base64,{}", self.mime_type, B64.encode(&self.bytes))
    }
}

/// Load an image from `path` and prepare it for a model that accepts at
/// most `max_bytes` per image (`0` = no byte limit).
///
/// PNG stays PNG; every other format is flattened to JPEG.  When the
/// encoded payload exceeds the budget, the longest edge is halved and the
/// image re-encoded until it fits or drops below the minimum useful size.
pub fn load_image(path: &Path, max_bytes: u64) -> Result<EncodedImage, ImageError> {
    let raw = std::fs::read(path).map_err(|e| ImageError::Io(path.display().to_string(), e))?;

    let key: CacheKey = (sha2::Sha256::digest(&raw).into(), max_bytes);
    if let Ok(mut cache) = prepared_cache().lock() {
        if let Some(hit) = cache.get(&key) {
            return Ok(hit.clone());
        }
    }

    let format = sniff_format(&raw, path)?;
    let keep_png = format == image::ImageFormat::Png;

    let mut decoded = image::load_from_memory_with_format(&raw, format)
        .map_err(|e| ImageError::Decode(path.display().to_string(), e.to_string()))?;

    // The pixel ceiling applies regardless of the byte budget.
    if decoded.width().max(decoded.height()) > MAX_DIMENSION {
        decoded = shrink_to(decoded, MAX_DIMENSION);
    }

    let mut encoded = encode(&decoded, keep_png)?;
    while max_bytes > 0 && encoded.bytes.len() as u64 > max_bytes {
        let longest = decoded.width().max(decoded.height());
        if longest <= MIN_DIMENSION {
            return Err(ImageError::TooLarge {
                path: path.display().to_string(),
                limit: max_bytes,
            });
        }
        decoded = shrink_to(decoded, longest / 2);
        encoded = encode(&decoded, keep_png)?;
    }

    if let Ok(mut cache) = prepared_cache().lock() {
        cache.put(key, encoded.clone());
    }

    Ok(encoded)
}

/// Identify the image format: magic bytes first, file extension second.
///
/// The extension tier keeps files with truncated or exotic headers loadable
/// when their name is honest; the decoder has the final say either way.
fn sniff_format(raw: &[u8], path: &Path) -> Result<image::ImageFormat, ImageError> {
    if let Ok(format) = image::guess_format(raw) {
        return Ok(format);
    }
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(image::ImageFormat::from_extension)
        .ok_or_else(|| ImageError::UnsupportedFormat(path.display().to_string()))
}

/// Scale so the longest edge is `longest`, preserving aspect ratio.
///
/// Triangle filtering is plenty for model input and far cheaper than the
/// high-quality resamplers; this runs inside the fit loop.
fn shrink_to(img: image::DynamicImage, longest: u32) -> image::DynamicImage {
    let longest = longest.max(1);
    img.resize(longest, longest, image::imageops::FilterType::Triangle)
}

fn encode(img: &image::DynamicImage, keep_png: bool) -> Result<EncodedImage, ImageError> {
    let mut out = Cursor::new(Vec::new());
    if keep_png {
        img.write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| ImageError::Encode(e.to_string()))?;
        Ok(EncodedImage {
            mime_type: "image/png".into(),
            bytes: out.into_inner(),
        })
    } else {
        // JPEG has no alpha channel; flatten before encoding.
        image::DynamicImage::ImageRgb8(img.to_rgb8())
            .write_to(&mut out, image::ImageFormat::Jpeg)
            .map_err(|e| ImageError::Encode(e.to_string()))?;
        Ok(EncodedImage {
            mime_type: "image/jpeg".into(),
            bytes: out.into_inner(),
        })
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

//! Local placeholder renderer.
//!
//! Pure function of its inputs: a vertical gradient from the foundation to
//! the lipstick shade, a swatch strip of the eye and cheek colors, and a
//! barcode-like band derived from the prompt so different prompts yield
//! visibly different placeholders. No network, no fonts, no model files.

use crate::types::GenerationError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::{Rgb, RgbImage};
use makeup_core::preprocess::encode_png;
use makeup_core::recommend::ColorPalette;

const MAX_EDGE: u32 = 4096;
const DEFAULT_TOP: Rgb<u8> = Rgb([0xF5, 0xDE, 0xB3]);
const DEFAULT_BOTTOM: Rgb<u8> = Rgb([0xC0, 0x80, 0x81]);

/// Parse `#RRGGBB` (leading `#` optional).
pub fn parse_hex_color(hex: &str) -> Option<Rgb<u8>> {
    let h = hex.trim().trim_start_matches('#');
    if h.len() != 6 || !h.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&h[i..i + 2], 16).ok();
    Some(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

fn lerp(a: Rgb<u8>, b: Rgb<u8>, t: f32) -> Rgb<u8> {
    Rgb(std::array::from_fn(|c| {
        (a[c] as f32 + (b[c] as f32 - a[c] as f32) * t).round() as u8
    }))
}

/// FNV-1a; stable across platforms and releases.
fn prompt_hash(prompt: &str) -> u64 {
    prompt.bytes().fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
        (h ^ b as u64).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// Render the placeholder canvas.
pub fn render_placeholder(
    prompt: &str,
    palette: Option<&ColorPalette>,
    width: u32,
    height: u32,
) -> Result<RgbImage, GenerationError> {
    if width == 0 || height == 0 || width > MAX_EDGE || height > MAX_EDGE {
        return Err(GenerationError::FallbackRenderError(format!(
            "canvas {width}x{height} outside 1..={MAX_EDGE}"
        )));
    }

    let color = |hex: Option<&String>, default| {
        hex.and_then(|h| parse_hex_color(h)).unwrap_or(default)
    };
    let top = color(palette.map(|p| &p.foundation), DEFAULT_TOP);
    let bottom = color(palette.map(|p| &p.lipstick), DEFAULT_BOTTOM);

    let mut swatches: Vec<Rgb<u8>> = palette
        .map(|p| {
            p.eyeshadow
                .iter()
                .chain(std::iter::once(&p.blush))
                .filter_map(|h| parse_hex_color(h))
                .collect()
        })
        .unwrap_or_default();
    if swatches.is_empty() {
        swatches = vec![top, bottom];
    }

    let span = (height.saturating_sub(1)).max(1) as f32;
    let mut canvas = RgbImage::from_fn(width, height, |_, y| lerp(top, bottom, y as f32 / span));

    // Swatch strip across the lower fifth.
    let strip_top = height - height / 5;
    let strip_bottom = height - height / 10;
    let swatch_w = (width / swatches.len() as u32).max(1);
    for y in strip_top..strip_bottom {
        for x in 0..width {
            let idx = ((x / swatch_w) as usize).min(swatches.len() - 1);
            canvas.put_pixel(x, y, swatches[idx]);
        }
    }

    // Prompt signature: 64 bars along the top tenth.
    let hash = prompt_hash(prompt);
    let band = (height / 10).max(1);
    for x in 0..width {
        let bit = (x as u64 * 64 / width as u64) as u32;
        if (hash >> bit) & 1 == 1 {
            for y in 0..band.min(height) {
                let px = canvas.get_pixel(x, y);
                canvas.put_pixel(x, y, lerp(*px, Rgb([255, 255, 255]), 0.35));
            }
        }
    }

    Ok(canvas)
}

/// `data:` URL for raw image bytes.
pub fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!("data:{mime_type};base64,{}", BASE64.encode(bytes))
}

/// Render and encode the placeholder as a PNG `data:` URL.
pub fn render_data_url(
    prompt: &str,
    palette: Option<&ColorPalette>,
    width: u32,
    height: u32,
) -> Result<String, GenerationError> {
    let canvas = render_placeholder(prompt, palette, width, height)?;
    let png = encode_png(&canvas).map_err(|e| GenerationError::FallbackRenderError(e.to_string()))?;
    Ok(data_url("image/png", &png))
}

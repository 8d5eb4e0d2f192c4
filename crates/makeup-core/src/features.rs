//! Face-shape and skin-tone classification from detected geometry.
//!
//! Both classifiers are total: every input maps to a bucket, with the
//! lowest bucket absorbing degenerate input.

use crate::types::{FaceAttributes, FaceRegion, FaceShape, FacialFeatures, SkinTone};
use image::RgbImage;

/// Sample every Nth pixel of the face region when averaging color.
const SKIN_SAMPLE_STRIDE: usize = 10;

/// Classify by width/height of the face region: `>0.9` round,
/// `(0.75, 0.9]` oval, `(0.6, 0.75]` oblong, otherwise heart.
pub fn classify_face_shape(aspect_ratio: f32) -> FaceShape {
    if aspect_ratio > 0.9 {
        FaceShape::Round
    } else if aspect_ratio > 0.75 {
        FaceShape::Oval
    } else if aspect_ratio > 0.6 {
        FaceShape::Oblong
    } else {
        FaceShape::Heart
    }
}

/// Bucket a mean brightness (0–255): `>180` light, `>140` medium, `>100` dark, else deep.
pub fn skin_tone_for_brightness(brightness: f32) -> SkinTone {
    if brightness > 180.0 {
        SkinTone::Light
    } else if brightness > 140.0 {
        SkinTone::Medium
    } else if brightness > 100.0 {
        SkinTone::Dark
    } else {
        SkinTone::Deep
    }
}

/// Mean RGB over a strided sample of the pixels inside `region`.
pub fn mean_region_color(image: &RgbImage, region: &FaceRegion) -> Option<[f32; 3]> {
    let (x0, y0, x1, y1) = region.pixel_bounds(image.width(), image.height());
    let region_w = (x1 - x0) as usize;
    let region_h = (y1 - y0) as usize;
    if region_w == 0 || region_h == 0 {
        return None;
    }

    let mut sum = [0.0f64; 3];
    let mut n = 0usize;
    for i in (0..region_w * region_h).step_by(SKIN_SAMPLE_STRIDE) {
        let x = x0 + (i % region_w) as u32;
        let y = y0 + (i / region_w) as u32;
        let px = image.get_pixel(x, y);
        for c in 0..3 {
            sum[c] += px[c] as f64;
        }
        n += 1;
    }

    Some(sum.map(|s| (s / n as f64) as f32))
}

/// Skin tone from the average color inside `region`. An empty region
/// classifies as the darkest bucket.
pub fn classify_skin_tone(image: &RgbImage, region: &FaceRegion) -> SkinTone {
    let brightness = mean_region_color(image, region)
        .map(|[r, g, b]| (r + g + b) / 3.0)
        .unwrap_or(0.0);
    skin_tone_for_brightness(brightness)
}

/// Derive all attributes for a face found at `region`.
pub fn extract_attributes(image: &RgbImage, region: &FaceRegion) -> FaceAttributes {
    let aspect = region.pixel_aspect_ratio(image.width(), image.height());
    let face_shape = classify_face_shape(aspect);
    let skin_tone = classify_skin_tone(image, region);
    tracing::debug!(aspect, %face_shape, %skin_tone, "extracted face attributes");

    FaceAttributes {
        face_shape,
        skin_tone,
        features: FacialFeatures::unmeasured(),
    }
}

//! Pixel-heuristic face detector.
//!
//! Does not localize anything: it decides whether the photo plausibly shows
//! a lit, centered face by combining four cheap checks over a strided pixel
//! sample, and reports the centered placeholder region when it does.

use super::{DetectorError, FaceDetector};
use crate::types::{DetectionMethod, DetectionResult, FaceRegion};
use image::RgbImage;

const DEFAULT_SAMPLE_STRIDE: usize = 4;

const SKIN_RATIO_MIN: f32 = 0.15;
const SKIN_RATIO_MAX: f32 = 0.8;
const ASPECT_MIN: f32 = 0.5;
const ASPECT_MAX: f32 = 2.0;
const MIN_DIMENSION: u32 = 200;
const CENTER_TO_EDGE_MIN: f32 = 0.8;

// Weights in tenths so the score sums exactly.
const WEIGHT_SKIN: u8 = 3;
const WEIGHT_ASPECT: u8 = 2;
const WEIGHT_SIZE: u8 = 2;
const WEIGHT_LIGHTING: u8 = 3;

const DETECTION_THRESHOLD: f32 = 0.6;
const MAX_CONFIDENCE: f32 = 0.95;

/// RGB-range skin rule: R∈[95,255], G∈[40,220], B∈[20,170] and R > G > B.
pub fn is_skin_pixel(r: u8, g: u8, b: u8) -> bool {
    r >= 95 && (40..=220).contains(&g) && (20..=170).contains(&b) && r > g && g > b
}

fn brightness(r: u8, g: u8, b: u8) -> f32 {
    (r as f32 + g as f32 + b as f32) / 3.0
}

/// Breakdown of one heuristic evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicScore {
    pub skin_ratio: f32,
    pub aspect_ratio: f32,
    pub center_brightness: f32,
    pub edge_brightness: f32,
    pub skin_ok: bool,
    pub aspect_ok: bool,
    pub size_ok: bool,
    pub lighting_ok: bool,
}

impl HeuristicScore {
    /// Weighted sum of the passing checks, in [0, 1].
    pub fn total(&self) -> f32 {
        let tenths = [
            (self.skin_ok, WEIGHT_SKIN),
            (self.aspect_ok, WEIGHT_ASPECT),
            (self.size_ok, WEIGHT_SIZE),
            (self.lighting_ok, WEIGHT_LIGHTING),
        ]
        .iter()
        .filter(|(ok, _)| *ok)
        .map(|(_, w)| *w)
        .sum::<u8>();
        tenths as f32 / 10.0
    }
}

#[derive(Debug, Clone)]
pub struct HeuristicDetector {
    stride: usize,
}

impl Default for HeuristicDetector {
    fn default() -> Self {
        Self::with_stride(DEFAULT_SAMPLE_STRIDE)
    }
}

impl HeuristicDetector {
    /// Sample every `stride`-th pixel in row-major order.
    pub fn with_stride(stride: usize) -> Self {
        Self {
            stride: stride.max(1),
        }
    }

    /// Run the four checks over a strided sample of `image`.
    pub fn score(&self, image: &RgbImage) -> HeuristicScore {
        let (w, h) = image.dimensions();
        let cx = w as f32 / 2.0;
        let cy = h as f32 / 2.0;
        let inner_radius = w.min(h) as f32 / 4.0;
        let outer_radius = inner_radius * 2.0;

        let mut sampled = 0usize;
        let mut skin = 0usize;
        let (mut center_sum, mut center_n) = (0.0f32, 0usize);
        let (mut edge_sum, mut edge_n) = (0.0f32, 0usize);

        let pixels = image.as_raw().chunks_exact(3);
        for (idx, px) in pixels.enumerate().step_by(self.stride) {
            let (r, g, b) = (px[0], px[1], px[2]);
            sampled += 1;
            if is_skin_pixel(r, g, b) {
                skin += 1;
            }

            let x = (idx % w as usize) as f32;
            let y = (idx / w as usize) as f32;
            let dist = ((x - cx).powi(2) + (y - cy).powi(2)).sqrt();
            if dist < inner_radius {
                center_sum += brightness(r, g, b);
                center_n += 1;
            } else if dist > outer_radius {
                edge_sum += brightness(r, g, b);
                edge_n += 1;
            }
        }

        let mean = |sum: f32, n: usize| if n > 0 { sum / n as f32 } else { 0.0 };
        let skin_ratio = if sampled > 0 { skin as f32 / sampled as f32 } else { 0.0 };
        let aspect_ratio = if h > 0 { w as f32 / h as f32 } else { 0.0 };
        let center_brightness = mean(center_sum, center_n);
        let edge_brightness = mean(edge_sum, edge_n);

        HeuristicScore {
            skin_ratio,
            aspect_ratio,
            center_brightness,
            edge_brightness,
            skin_ok: skin_ratio > SKIN_RATIO_MIN && skin_ratio < SKIN_RATIO_MAX,
            aspect_ok: aspect_ratio > ASPECT_MIN && aspect_ratio < ASPECT_MAX,
            size_ok: w >= MIN_DIMENSION && h >= MIN_DIMENSION,
            lighting_ok: center_brightness >= CENTER_TO_EDGE_MIN * edge_brightness,
        }
    }

    /// Score `image` and turn the score into a detection result.
    pub fn evaluate(&self, image: &RgbImage) -> DetectionResult {
        if image.width() == 0 || image.height() == 0 {
            return DetectionResult::not_detected();
        }

        let score = self.score(image);
        let total = score.total();
        tracing::debug!(
            skin_ratio = score.skin_ratio,
            aspect = score.aspect_ratio,
            center = score.center_brightness,
            edge = score.edge_brightness,
            total,
            "heuristic detection score"
        );

        if total > DETECTION_THRESHOLD {
            DetectionResult::detected(
                total.min(MAX_CONFIDENCE),
                FaceRegion::placeholder(),
                None,
                DetectionMethod::Heuristic,
            )
        } else {
            DetectionResult::not_detected()
        }
    }
}

impl FaceDetector for HeuristicDetector {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn detect(&self, image: &RgbImage) -> Result<DetectionResult, DetectorError> {
        Ok(self.evaluate(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const SKIN: Rgb<u8> = Rgb([200, 150, 120]);
    const BACKDROP: Rgb<u8> = Rgb([50, 50, 50]);

    /// 300×400 portrait with a skin-toned block around the center.
    fn portrait() -> RgbImage {
        RgbImage::from_fn(300, 400, |x, y| {
            if (50..250).contains(&x) && (75..325).contains(&y) {
                SKIN
            } else {
                BACKDROP
            }
        })
    }

    #[test]
    fn test_skin_rule() {
        assert!(is_skin_pixel(200, 150, 120));
        assert!(!is_skin_pixel(90, 60, 30)); // red too low
        assert!(!is_skin_pixel(200, 120, 150)); // B > G
        assert!(!is_skin_pixel(200, 230, 100)); // G out of range
        assert!(!is_skin_pixel(150, 150, 100)); // R == G
    }

    #[test]
    fn test_portrait_passes_all_checks() {
        let score = HeuristicDetector::default().score(&portrait());
        assert!(score.skin_ok, "skin ratio {}", score.skin_ratio);
        assert!(score.aspect_ok);
        assert!(score.size_ok);
        assert!(score.lighting_ok);
        assert!((score.total() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_portrait_detected_with_bounded_confidence() {
        let result = HeuristicDetector::default().evaluate(&portrait());
        assert!(result.face_detected);
        assert!(result.confidence >= 0.6 && result.confidence <= 0.95);
        assert_eq!(result.bounding_box, Some(FaceRegion::placeholder()));
        assert_eq!(result.method, DetectionMethod::Heuristic);
    }

    #[test]
    fn test_small_dark_image_not_detected() {
        // Aspect (0.2) + lighting (0.3) = 0.5, below threshold.
        let img = RgbImage::from_pixel(100, 100, Rgb([0, 0, 0]));
        let score = HeuristicDetector::default().score(&img);
        assert!((score.total() - 0.5).abs() < 1e-6);
        let result = HeuristicDetector::default().evaluate(&img);
        assert!(!result.face_detected);
        assert_eq!(result.confidence, 0.0);
        assert!(result.bounding_box.is_none());
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // Skin everywhere (ratio 1.0 fails), extreme aspect fails, small fails:
        // only lighting passes.
        let img = RgbImage::from_pixel(150, 20, SKIN);
        let score = HeuristicDetector::default().score(&img);
        assert!(!score.skin_ok && !score.aspect_ok && !score.size_ok && score.lighting_ok);
        assert!(!HeuristicDetector::default().evaluate(&img).face_detected);
    }

    #[test]
    fn test_dark_center_fails_lighting() {
        let img = RgbImage::from_fn(300, 300, |x, y| {
            let d = ((x as f32 - 150.0).powi(2) + (y as f32 - 150.0).powi(2)).sqrt();
            if d < 100.0 { Rgb([10, 10, 10]) } else { Rgb([240, 240, 240]) }
        });
        let score = HeuristicDetector::default().score(&img);
        assert!(!score.lighting_ok);
    }

    #[test]
    fn test_deterministic() {
        let det = HeuristicDetector::with_stride(7);
        let img = portrait();
        assert_eq!(det.evaluate(&img), det.evaluate(&img));
    }

    #[test]
    fn test_empty_image() {
        let img = RgbImage::new(0, 0);
        assert!(!HeuristicDetector::default().evaluate(&img).face_detected);
    }
}

//! SCRFD face detector via ONNX Runtime.
//!
//! Letterboxes the RGB photo to 640×640, runs the three-stride anchor-free
//! head, decodes boxes and five-point landmarks, suppresses overlaps, and
//! reports the strongest face in normalized coordinates.

use super::{DetectorError, FaceDetector};
use crate::types::{DetectionMethod, DetectionResult, FaceRegion, Keypoint};
use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use std::sync::Mutex;

const INPUT_SIZE: u32 = 640;
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 128.0;
const SCORE_THRESHOLD: f32 = 0.5;
const NMS_IOU: f32 = 0.4;
const STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;

/// Positive detections are reported within this band so a weak model hit
/// is never presented as less certain than the heuristic tier.
const CONFIDENCE_FLOOR: f32 = 0.7;
const CONFIDENCE_CEIL: f32 = 0.99;

/// Scale and padding applied when fitting the photo into the model input.
#[derive(Debug, Clone, Copy)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl Letterbox {
    fn to_source(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// A decoded candidate in source-image pixels.
#[derive(Debug, Clone)]
struct Candidate {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    score: f32,
    landmarks: Option<[(f32, f32); 5]>,
}

impl Candidate {
    fn area(&self) -> f32 {
        (self.x1 - self.x0).max(0.0) * (self.y1 - self.y0).max(0.0)
    }
}

/// Output slots (score, bbox, kps) for one stride.
type HeadSlots = (usize, usize, usize);

pub struct ScrfdDetector {
    session: Mutex<Session>,
    heads: [HeadSlots; 3],
}

impl ScrfdDetector {
    /// Load the SCRFD model (e.g. `det_10g.onnx`) from `model_path`.
    pub fn load(model_path: &Path) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let names: Vec<String> = session.outputs().iter().map(|o| o.name().to_string()).collect();
        if names.len() < 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD needs 9 outputs (score/bbox/kps per stride), model has {}",
                names.len()
            )));
        }

        let heads = map_heads(&names);
        tracing::info!(
            path = %model_path.display(),
            outputs = ?names,
            ?heads,
            "loaded SCRFD model"
        );

        Ok(Self {
            session: Mutex::new(session),
            heads,
        })
    }

    fn run(&self, image: &RgbImage) -> Result<Vec<Candidate>, DetectorError> {
        let (input, letterbox) = letterbox_tensor(image);

        let mut session = self
            .session
            .lock()
            .map_err(|_| DetectorError::InferenceFailed("session lock poisoned".into()))?;
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (level, &stride) in STRIDES.iter().enumerate() {
            let (score_slot, bbox_slot, kps_slot) = self.heads[level];
            let extract = |slot: usize, what: &str| {
                outputs[slot]
                    .try_extract_tensor::<f32>()
                    .map(|(_, data)| data.to_vec())
                    .map_err(|e| {
                        DetectorError::InferenceFailed(format!("{what} stride {stride}: {e}"))
                    })
            };
            let scores = extract(score_slot, "scores")?;
            let boxes = extract(bbox_slot, "boxes")?;
            let kps = extract(kps_slot, "landmarks")?;
            candidates.extend(decode_level(&scores, &boxes, &kps, stride, &letterbox));
        }

        Ok(suppress(candidates, NMS_IOU))
    }
}

impl FaceDetector for ScrfdDetector {
    fn name(&self) -> &'static str {
        "scrfd"
    }

    fn detect(&self, image: &RgbImage) -> Result<DetectionResult, DetectorError> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Ok(DetectionResult::not_detected());
        }

        let candidates = self.run(image)?;
        let Some(best) = candidates.first() else {
            tracing::debug!("SCRFD: no face above threshold");
            return Ok(DetectionResult::not_detected());
        };

        tracing::debug!(score = best.score, faces = candidates.len(), "SCRFD detection");
        Ok(to_result(best, w, h))
    }
}

/// Map the strongest candidate to a normalized detection result.
fn to_result(best: &Candidate, img_w: u32, img_h: u32) -> DetectionResult {
    let region = FaceRegion::from_pixels(
        best.x0,
        best.y0,
        best.x1 - best.x0,
        best.y1 - best.y0,
        img_w,
        img_h,
    );
    let region = if region.is_valid() {
        region
    } else {
        FaceRegion::placeholder()
    };

    let keypoints = best.landmarks.map(|lms| {
        lms.iter()
            .map(|&(x, y)| Keypoint {
                x: (x / img_w as f32).clamp(0.0, 1.0),
                y: (y / img_h as f32).clamp(0.0, 1.0),
                z: None,
            })
            .collect()
    });

    DetectionResult::detected(
        best.score.clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEIL),
        region,
        keypoints,
        DetectionMethod::Scrfd,
    )
}

/// Resize into a centered 640×640 canvas and normalize to NCHW RGB.
fn letterbox_tensor(image: &RgbImage) -> (Array4<f32>, Letterbox) {
    let (w, h) = image.dimensions();
    let scale = (INPUT_SIZE as f32 / w as f32).min(INPUT_SIZE as f32 / h as f32);
    let new_w = ((w as f32 * scale).round() as u32).clamp(1, INPUT_SIZE);
    let new_h = ((h as f32 * scale).round() as u32).clamp(1, INPUT_SIZE);
    let off_x = (INPUT_SIZE - new_w) / 2;
    let off_y = (INPUT_SIZE - new_h) / 2;

    let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);

    let size = INPUT_SIZE as usize;
    // Padding at the mean normalizes to zero.
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, px) in resized.enumerate_pixels() {
        let (tx, ty) = ((x + off_x) as usize, (y + off_y) as usize);
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = (px[c] as f32 - PIXEL_MEAN) / PIXEL_STD;
        }
    }

    let letterbox = Letterbox {
        scale,
        pad_x: off_x as f32,
        pad_y: off_y as f32,
    };
    (tensor, letterbox)
}

/// Find score/bbox/kps outputs by name (`score_8`, `bbox_16`, ...), or assume
/// the standard export order `[scores×3, boxes×3, kps×3]`.
fn map_heads(names: &[String]) -> [HeadSlots; 3] {
    let slot = |kind: &str, stride: usize| {
        names.iter().position(|n| *n == format!("{kind}_{stride}"))
    };

    let named: Option<Vec<HeadSlots>> = STRIDES
        .iter()
        .map(|&s| Some((slot("score", s)?, slot("bbox", s)?, slot("kps", s)?)))
        .collect();

    match named {
        Some(v) => [v[0], v[1], v[2]],
        None => [(0, 3, 6), (1, 4, 7), (2, 5, 8)],
    }
}

/// Decode one stride level into source-image candidates above threshold.
fn decode_level(
    scores: &[f32],
    boxes: &[f32],
    kps: &[f32],
    stride: usize,
    letterbox: &Letterbox,
) -> Vec<Candidate> {
    let cells_x = INPUT_SIZE as usize / stride;
    let cells_y = INPUT_SIZE as usize / stride;
    let anchors = cells_x * cells_y * ANCHORS_PER_CELL;
    let s = stride as f32;

    (0..anchors)
        .filter_map(|i| {
            let score = *scores.get(i)?;
            if score <= SCORE_THRESHOLD {
                return None;
            }
            let cell = i / ANCHORS_PER_CELL;
            let ax = (cell % cells_x) as f32 * s;
            let ay = (cell / cells_x) as f32 * s;

            let b = boxes.get(i * 4..i * 4 + 4)?;
            let (x0, y0) = letterbox.to_source(ax - b[0] * s, ay - b[1] * s);
            let (x1, y1) = letterbox.to_source(ax + b[2] * s, ay + b[3] * s);

            let landmarks = kps.get(i * 10..i * 10 + 10).map(|k| {
                std::array::from_fn(|p| {
                    letterbox.to_source(ax + k[p * 2] * s, ay + k[p * 2 + 1] * s)
                })
            });

            Some(Candidate { x0, y0, x1, y1, score, landmarks })
        })
        .collect()
}

/// Greedy non-maximum suppression; output sorted by descending score.
fn suppress(mut candidates: Vec<Candidate>, iou_limit: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut kept: Vec<Candidate> = Vec::new();
    for c in candidates {
        if kept.iter().all(|k| overlap(k, &c) <= iou_limit) {
            kept.push(c);
        }
    }
    kept
}

/// Intersection-over-union of two candidates.
fn overlap(a: &Candidate, b: &Candidate) -> f32 {
    let iw = (a.x1.min(b.x1) - a.x0.max(b.x0)).max(0.0);
    let ih = (a.y1.min(b.y1) - a.y0.max(b.y0)).max(0.0);
    let inter = iw * ih;
    let union = a.area() + b.area() - inter;
    if union > 0.0 { inter / union } else { 0.0 }
}

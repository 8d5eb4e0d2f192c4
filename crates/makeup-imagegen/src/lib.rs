//! makeup-imagegen — "after" image generation for makeup plans.
//!
//! Builds a natural-language prompt from a face analysis and plan, tries
//! each configured remote engine in priority order, and renders a local
//! placeholder when none succeeds. Engine unavailability is never an error
//! for the caller; only a failure of the local renderer is.

pub mod engines;
pub mod fallback;
pub mod orchestrator;
pub mod prompt;
pub mod types;

pub use engines::{EngineCredentials, ImageEngine};
pub use orchestrator::{GenerationPhase, GenerationProgress, ImageGenerator};
pub use types::{
    EngineKind, GeneratedImage, GenerationError, GenerationRequest, GenerationResult, ImageQuality,
};

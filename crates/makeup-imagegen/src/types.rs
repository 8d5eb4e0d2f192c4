use chrono::{DateTime, Utc};
use makeup_core::{FaceAnalysis, MakeupPlan, Preferences};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Image generation backends, in no particular order.
/// See [`EngineKind::PRIORITY`] for the order they are tried in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "stability")]
    Stability,
    #[serde(rename = "huggingface")]
    HuggingFace,
    #[serde(rename = "local-fallback")]
    LocalFallback,
}

impl EngineKind {
    /// Remote engines, most preferred first.
    pub const PRIORITY: [EngineKind; 3] =
        [EngineKind::OpenAi, EngineKind::Stability, EngineKind::HuggingFace];

    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::OpenAi => "openai",
            EngineKind::Stability => "stability",
            EngineKind::HuggingFace => "huggingface",
            EngineKind::LocalFallback => "local-fallback",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "openai" | "dall-e" | "dalle" => Some(EngineKind::OpenAi),
            "stability" | "stability-ai" => Some(EngineKind::Stability),
            "huggingface" | "hf" => Some(EngineKind::HuggingFace),
            "local" | "local-fallback" => Some(EngineKind::LocalFallback),
            _ => None,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageQuality {
    #[default]
    Standard,
    Hd,
}

impl ImageQuality {
    /// Square output edge in pixels.
    pub fn edge(&self) -> u32 {
        match self {
            ImageQuality::Standard => 512,
            ImageQuality::Hd => 1024,
        }
    }
}

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("engine {0} is not configured")]
    EngineUnavailable(EngineKind),
    #[error("engine {engine} request failed: {message}")]
    EngineRequestFailed { engine: EngineKind, message: String },
    #[error("local placeholder rendering failed: {0}")]
    FallbackRenderError(String),
}

impl GenerationError {
    pub fn request(engine: EngineKind, message: impl Into<String>) -> Self {
        GenerationError::EngineRequestFailed {
            engine,
            message: message.into(),
        }
    }
}

/// Everything needed to describe the desired "after" image.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub analysis: FaceAnalysis,
    pub plan: Option<MakeupPlan>,
    pub preferences: Preferences,
    /// Preferred engine; ignored if it has no credentials.
    pub engine: Option<EngineKind>,
    pub quality: ImageQuality,
    /// Source photo for engines that support image-to-image.
    pub reference_image: Option<Vec<u8>>,
}

impl GenerationRequest {
    pub fn new(analysis: FaceAnalysis, preferences: Preferences) -> Self {
        Self {
            analysis,
            plan: None,
            preferences,
            engine: None,
            quality: ImageQuality::default(),
            reference_image: None,
        }
    }

    pub fn with_plan(mut self, plan: MakeupPlan) -> Self {
        self.plan = Some(plan);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedImage {
    pub id: String,
    /// Remote URL or `data:` URL.
    pub url: String,
    pub prompt: String,
    pub engine: EngineKind,
    pub quality: ImageQuality,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    pub success: bool,
    pub images: Vec<GeneratedImage>,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationResult {
    pub fn succeeded(prompt: String, image: GeneratedImage) -> Self {
        Self {
            success: true,
            images: vec![image],
            prompt,
            error: None,
        }
    }

    pub fn failed(prompt: String, error: &GenerationError) -> Self {
        Self {
            success: false,
            images: Vec::new(),
            prompt,
            error: Some(error.to_string()),
        }
    }

    /// Engine that produced the first image, if any.
    pub fn engine(&self) -> Option<EngineKind> {
        self.images.first().map(|i| i.engine)
    }
}

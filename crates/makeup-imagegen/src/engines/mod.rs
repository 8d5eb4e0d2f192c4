//! Remote image-generation engines.
//!
//! Each engine speaks its vendor's published HTTP API and is otherwise
//! opaque: a prompt goes in, an image URL or image bytes come out.

mod huggingface;
mod openai;
mod stability;

pub use huggingface::HuggingFaceEngine;
pub use openai::OpenAiEngine;
pub use stability::StabilityEngine;

use crate::fallback::data_url;
use crate::types::{EngineKind, GenerationError, ImageQuality};
use async_trait::async_trait;
use reqwest::Client;

/// Per-request knobs passed through to an engine.
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub quality: ImageQuality,
    pub reference_image: Option<Vec<u8>>,
}

/// What an engine hands back.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineImage {
    /// Hosted image.
    Url(String),
    /// Raw encoded image.
    Bytes { data: Vec<u8>, mime_type: String },
}

impl EngineImage {
    /// URL usable by a caller: hosted URLs as-is, bytes as a `data:` URL.
    pub fn into_url(self) -> String {
        match self {
            EngineImage::Url(url) => url,
            EngineImage::Bytes { data, mime_type } => data_url(&mime_type, &data),
        }
    }
}

#[async_trait]
pub trait ImageEngine: Send + Sync {
    fn kind(&self) -> EngineKind;

    async fn generate(
        &self,
        prompt: &str,
        options: &EngineOptions,
    ) -> Result<EngineImage, GenerationError>;
}

/// Credential and endpoint for one remote engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiCredential {
    pub api_key: String,
    /// Overrides the vendor's public endpoint.
    pub base_url: Option<String>,
    /// Overrides the engine's default model.
    pub model: Option<String>,
}

impl ApiCredential {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Engine credentials. A missing entry removes that engine from rotation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineCredentials {
    pub openai: Option<ApiCredential>,
    pub stability: Option<ApiCredential>,
    pub huggingface: Option<ApiCredential>,
}

impl EngineCredentials {
    pub fn get(&self, kind: EngineKind) -> Option<&ApiCredential> {
        match kind {
            EngineKind::OpenAi => self.openai.as_ref(),
            EngineKind::Stability => self.stability.as_ref(),
            EngineKind::HuggingFace => self.huggingface.as_ref(),
            EngineKind::LocalFallback => None,
        }
        .filter(|c| !c.api_key.trim().is_empty())
    }
}

/// Instantiate every engine that has a credential, in priority order.
pub fn build_engines(credentials: &EngineCredentials, client: Client) -> Vec<Box<dyn ImageEngine>> {
    let mut engines: Vec<Box<dyn ImageEngine>> = Vec::new();
    for kind in EngineKind::PRIORITY {
        let Some(cred) = credentials.get(kind) else {
            tracing::debug!(engine = %kind, "no credential, engine excluded");
            continue;
        };
        let engine: Box<dyn ImageEngine> = match kind {
            EngineKind::OpenAi => Box::new(OpenAiEngine::new(client.clone(), cred.clone())),
            EngineKind::Stability => Box::new(StabilityEngine::new(client.clone(), cred.clone())),
            EngineKind::HuggingFace => {
                Box::new(HuggingFaceEngine::new(client.clone(), cred.clone()))
            }
            EngineKind::LocalFallback => continue,
        };
        engines.push(engine);
    }
    engines
}

/// Turn a non-success response into an `EngineRequestFailed`.
pub(crate) async fn check_status(
    engine: EngineKind,
    response: reqwest::Response,
) -> Result<reqwest::Response, GenerationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    Err(GenerationError::request(engine, format!("HTTP {status}: {snippet}")))
}

pub(crate) fn transport(engine: EngineKind) -> impl Fn(reqwest::Error) -> GenerationError {
    move |e| GenerationError::request(engine, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_engines_respects_priority_and_credentials() {
        let creds = EngineCredentials {
            openai: None,
            stability: Some(ApiCredential::new("sk-stab")),
            huggingface: Some(ApiCredential::new("hf_token")),
        };
        let kinds: Vec<_> = build_engines(&creds, Client::new()).iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![EngineKind::Stability, EngineKind::HuggingFace]);
    }

    #[test]
    fn test_blank_key_is_unconfigured() {
        let creds = EngineCredentials {
            openai: Some(ApiCredential::new("  ")),
            ..Default::default()
        };
        assert!(creds.get(EngineKind::OpenAi).is_none());
        assert!(build_engines(&creds, Client::new()).is_empty());
    }

    #[test]
    fn test_bytes_become_data_url() {
        let img = EngineImage::Bytes { data: vec![1, 2, 3], mime_type: "image/png".into() };
        assert_eq!(img.into_url(), "data:image/png;base64,AQID");
        assert_eq!(EngineImage::Url("https://x/y.png".into()).into_url(), "https://x/y.png");
    }
}

use super::{check_status, transport, ApiCredential, EngineImage, EngineOptions, ImageEngine};
use crate::types::{EngineKind, GenerationError, ImageQuality};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "dall-e-3";

#[derive(Deserialize)]
struct ImagesResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    url: Option<String>,
    b64_json: Option<String>,
}

/// OpenAI Images API (`/images/generations`).
pub struct OpenAiEngine {
    client: Client,
    credential: ApiCredential,
}

impl OpenAiEngine {
    pub fn new(client: Client, credential: ApiCredential) -> Self {
        Self { client, credential }
    }

    fn endpoint(&self) -> String {
        let base = self.credential.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        format!("{}/images/generations", base.trim_end_matches('/'))
    }
}

#[async_trait]
impl ImageEngine for OpenAiEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::OpenAi
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &EngineOptions,
    ) -> Result<EngineImage, GenerationError> {
        let kind = self.kind();
        let quality = match options.quality {
            ImageQuality::Standard => "standard",
            ImageQuality::Hd => "hd",
        };
        let body = serde_json::json!({
            "model": self.credential.model.as_deref().unwrap_or(DEFAULT_MODEL),
            "prompt": prompt,
            "n": 1,
            "size": "1024x1024",
            "quality": quality,
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.credential.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport(kind))?;
        let parsed: ImagesResponse = check_status(kind, response)
            .await?
            .json()
            .await
            .map_err(transport(kind))?;

        let datum = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::request(kind, "response contained no images"))?;
        match (datum.url, datum.b64_json) {
            (Some(url), _) => Ok(EngineImage::Url(url)),
            (None, Some(b64)) => {
                let data = BASE64
                    .decode(b64)
                    .map_err(|e| {
                        GenerationError::request(kind, format!("invalid base64 payload: {e}"))
                    })?;
                Ok(EngineImage::Bytes { data, mime_type: "image/png".into() })
            }
            (None, None) => Err(GenerationError::request(
                kind,
                "image entry had neither url nor b64_json",
            )),
        }
    }
}

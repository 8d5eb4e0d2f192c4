use super::{check_status, transport, ApiCredential, EngineImage, EngineOptions, ImageEngine};
use crate::types::{EngineKind, GenerationError, ImageQuality};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use image::imageops::FilterType;
use makeup_core::preprocess::encode_png;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

const DEFAULT_BASE_URL: &str = "https://api.stability.ai/v1";
const DEFAULT_MODEL: &str = "stable-diffusion-xl-1024-v1-0";
// Weight given to the reference photo in image-to-image mode.
const IMAGE_STRENGTH: f32 = 0.35;
// SDXL v1 only accepts a fixed set of sizes; both modes use the square one.
const SDXL_EDGE: u32 = 1024;

#[derive(Deserialize)]
struct ArtifactsResponse {
    artifacts: Vec<Artifact>,
}

#[derive(Deserialize)]
struct Artifact {
    base64: String,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

/// Stability AI generation API.
///
/// Text-to-image by default; switches to image-to-image when the request
/// carries a reference photo.
pub struct StabilityEngine {
    client: Client,
    credential: ApiCredential,
}

impl StabilityEngine {
    pub fn new(client: Client, credential: ApiCredential) -> Self {
        Self { client, credential }
    }

    fn endpoint(&self, mode: &str) -> String {
        let base = self.credential.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let model = self.credential.model.as_deref().unwrap_or(DEFAULT_MODEL);
        format!("{}/generation/{model}/{mode}", base.trim_end_matches('/'))
    }

    async fn text_to_image(
        &self,
        prompt: &str,
        steps: u32,
    ) -> Result<reqwest::Response, reqwest::Error> {
        let body = serde_json::json!({
            "text_prompts": [{"text": prompt, "weight": 1.0}],
            "cfg_scale": 7,
            "width": SDXL_EDGE,
            "height": SDXL_EDGE,
            "samples": 1,
            "steps": steps,
        });
        self.client
            .post(self.endpoint("text-to-image"))
            .bearer_auth(&self.credential.api_key)
            .header("accept", "application/json")
            .json(&body)
            .send()
            .await
    }

    async fn image_to_image(
        &self,
        prompt: &str,
        reference: &[u8],
        steps: u32,
    ) -> Result<reqwest::Response, GenerationError> {
        let kind = EngineKind::Stability;
        let part = Part::bytes(prepare_reference(reference)?)
            .file_name("reference.png")
            .mime_str("image/png")
            .map_err(transport(kind))?;
        let form = Form::new()
            .part("init_image", part)
            .text("init_image_mode", "IMAGE_STRENGTH")
            .text("image_strength", IMAGE_STRENGTH.to_string())
            .text("text_prompts[0][text]", prompt.to_string())
            .text("cfg_scale", "7")
            .text("samples", "1")
            .text("steps", steps.to_string());
        self.client
            .post(self.endpoint("image-to-image"))
            .bearer_auth(&self.credential.api_key)
            .header("accept", "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(transport(kind))
    }
}

fn steps_for(quality: ImageQuality) -> u32 {
    match quality {
        ImageQuality::Standard => 30,
        ImageQuality::Hd => 50,
    }
}

/// Crop-resize the reference photo to the SDXL square and re-encode as PNG.
fn prepare_reference(bytes: &[u8]) -> Result<Vec<u8>, GenerationError> {
    let kind = EngineKind::Stability;
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| GenerationError::request(kind, format!("unreadable reference image: {e}")))?;
    let squared = decoded
        .resize_to_fill(SDXL_EDGE, SDXL_EDGE, FilterType::Triangle)
        .to_rgb8();
    encode_png(&squared).map_err(|e| GenerationError::request(kind, e.to_string()))
}

#[async_trait]
impl ImageEngine for StabilityEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Stability
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &EngineOptions,
    ) -> Result<EngineImage, GenerationError> {
        let kind = self.kind();
        let steps = steps_for(options.quality);
        let response = match options.reference_image.as_deref() {
            Some(reference) => self.image_to_image(prompt, reference, steps).await?,
            None => self.text_to_image(prompt, steps).await.map_err(transport(kind))?,
        };
        let parsed: ArtifactsResponse = check_status(kind, response)
            .await?
            .json()
            .await
            .map_err(transport(kind))?;

        let artifact = parsed
            .artifacts
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::request(kind, "response contained no artifacts"))?;
        if artifact.finish_reason.as_deref() == Some("CONTENT_FILTERED") {
            return Err(GenerationError::request(kind, "output was content filtered"));
        }
        let data = BASE64
            .decode(artifact.base64)
            .map_err(|e| GenerationError::request(kind, format!("invalid base64 payload: {e}")))?;
        Ok(EngineImage::Bytes { data, mime_type: "image/png".into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};
    use mockito::Matcher;

    fn reference_png(width: u32, height: u32) -> Vec<u8> {
        encode_png(&RgbImage::from_pixel(width, height, Rgb([180, 140, 120]))).unwrap()
    }

    fn engine(server: &mockito::Server) -> StabilityEngine {
        let credential = ApiCredential::new("sk-stab").with_base_url(server.url());
        StabilityEngine::new(Client::new(), credential)
    }

    #[tokio::test]
    async fn test_text_to_image() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Regex(r"/generation/.+/text-to-image$".into()))
            .match_header("authorization", "Bearer sk-stab")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "width": 1024,
                "height": 1024,
                "steps": 30,
            })))
            .with_status(200)
            .with_body(r#"{"artifacts":[{"base64":"AQID","finishReason":"SUCCESS"}]}"#)
            .create_async()
            .await;

        let options = EngineOptions { quality: ImageQuality::Standard, ..Default::default() };
        let image = engine(&server).generate("p", &options).await.unwrap();
        assert_eq!(
            image,
            EngineImage::Bytes { data: vec![1, 2, 3], mime_type: "image/png".into() }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_reference_image_uses_image_to_image() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Regex(r"/generation/.+/image-to-image$".into()))
            .match_header("content-type", Matcher::Regex("multipart/form-data".into()))
            .with_status(200)
            .with_body(r#"{"artifacts":[{"base64":"AQID"}]}"#)
            .create_async()
            .await;

        let options = EngineOptions {
            reference_image: Some(reference_png(300, 400)),
            ..Default::default()
        };
        engine(&server).generate("p", &options).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_hd_keeps_sdxl_size() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Regex(r"/generation/.+/text-to-image$".into()))
            .match_body(Matcher::PartialJson(serde_json::json!({
                "width": 1024,
                "height": 1024,
                "steps": 50,
            })))
            .with_status(200)
            .with_body(r#"{"artifacts":[{"base64":"AQID"}]}"#)
            .create_async()
            .await;

        let options = EngineOptions { quality: ImageQuality::Hd, ..Default::default() };
        engine(&server).generate("p", &options).await.unwrap();
        mock.assert_async().await;
    }

    #[test]
    fn test_reference_is_resized_to_sdxl_square() {
        let prepared = prepare_reference(&reference_png(300, 400)).unwrap();
        assert_eq!(image::guess_format(&prepared).unwrap(), image::ImageFormat::Png);
        let decoded = image::load_from_memory(&prepared).unwrap();
        assert_eq!(decoded.dimensions(), (1024, 1024));
    }

    #[test]
    fn test_unreadable_reference_is_request_failure() {
        let err = prepare_reference(&[0x89, b'P', b'N', b'G']).unwrap_err();
        assert!(matches!(
            err,
            GenerationError::EngineRequestFailed { engine: EngineKind::Stability, .. }
        ));
    }

    #[tokio::test]
    async fn test_content_filtered_is_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", Matcher::Any)
            .with_status(200)
            .with_body(r#"{"artifacts":[{"base64":"","finishReason":"CONTENT_FILTERED"}]}"#)
            .create_async()
            .await;

        let err = engine(&server).generate("p", &EngineOptions::default()).await.unwrap_err();
        assert!(matches!(
            err,
            GenerationError::EngineRequestFailed { engine: EngineKind::Stability, .. }
        ));
    }
}

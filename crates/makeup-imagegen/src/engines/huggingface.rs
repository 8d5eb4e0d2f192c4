use super::{check_status, transport, ApiCredential, EngineImage, EngineOptions, ImageEngine};
use crate::types::{EngineKind, GenerationError};
use async_trait::async_trait;
use reqwest::Client;

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co/models";
const DEFAULT_MODEL: &str = "stabilityai/stable-diffusion-xl-base-1.0";

/// Hugging Face Inference API. Responds with raw image bytes.
pub struct HuggingFaceEngine {
    client: Client,
    credential: ApiCredential,
}

impl HuggingFaceEngine {
    pub fn new(client: Client, credential: ApiCredential) -> Self {
        Self { client, credential }
    }

    fn endpoint(&self) -> String {
        let base = self.credential.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let model = self.credential.model.as_deref().unwrap_or(DEFAULT_MODEL);
        format!("{}/{model}", base.trim_end_matches('/'))
    }
}

#[async_trait]
impl ImageEngine for HuggingFaceEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::HuggingFace
    }

    async fn generate(
        &self,
        prompt: &str,
        options: &EngineOptions,
    ) -> Result<EngineImage, GenerationError> {
        let kind = self.kind();
        let edge = options.quality.edge();
        let body = serde_json::json!({
            "inputs": prompt,
            "parameters": {"width": edge, "height": edge},
            "options": {"wait_for_model": true},
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.credential.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport(kind))?;
        let response = check_status(kind, response).await?;

        let data = response.bytes().await.map_err(transport(kind))?.to_vec();
        // A JSON body on 200 means the model is still loading or errored.
        let mime_type = match image::guess_format(&data) {
            Ok(format) => format.to_mime_type().to_string(),
            Err(_) => {
                let snippet: String = String::from_utf8_lossy(&data).chars().take(200).collect();
                let message = format!("response was not an image: {snippet}");
                return Err(GenerationError::request(kind, message));
            }
        };
        Ok(EngineImage::Bytes { data, mime_type })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn engine(server: &mockito::Server) -> HuggingFaceEngine {
        let credential = ApiCredential::new("hf_x").with_base_url(server.url());
        HuggingFaceEngine::new(Client::new(), credential)
    }

    #[tokio::test]
    async fn test_raw_bytes_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/stabilityai/stable-diffusion-xl-base-1.0")
            .match_header("authorization", "Bearer hf_x")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(PNG_MAGIC)
            .create_async()
            .await;

        let image = engine(&server).generate("p", &EngineOptions::default()).await.unwrap();
        assert_eq!(
            image,
            EngineImage::Bytes { data: PNG_MAGIC.to_vec(), mime_type: "image/png".into() }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_json_body_is_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"{"error":"Model is currently loading"}"#)
            .create_async()
            .await;

        let err = engine(&server).generate("p", &EngineOptions::default()).await.unwrap_err();
        assert!(err.to_string().contains("currently loading"));
    }
}

//! Engine selection, fall-through and the local fallback.

use crate::engines::{build_engines, EngineCredentials, EngineOptions, ImageEngine};
use crate::fallback;
use crate::prompt::build_prompt;
use crate::types::{
    EngineKind, GeneratedImage, GenerationError, GenerationRequest, GenerationResult,
};
use chrono::Utc;
use reqwest::Client;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPhase {
    BuildingPrompt,
    Generating(EngineKind),
    Retrying(EngineKind),
    Fallback,
    Done,
}

/// Progress event. `percent` only ever takes the values 20, 60, 90 and 100,
/// each exactly once per request, whichever engine path runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationProgress {
    pub phase: GenerationPhase,
    pub percent: u8,
}

struct Milestones<'a> {
    sink: &'a (dyn Fn(GenerationProgress) + Send + Sync),
    last: u8,
}

impl Milestones<'_> {
    fn reach(&mut self, percent: u8, phase: GenerationPhase) {
        if percent > self.last {
            self.last = percent;
            (self.sink)(GenerationProgress { phase, percent });
        }
    }
}

pub struct ImageGenerator {
    engines: Vec<Box<dyn ImageEngine>>,
    fallback_size: (u32, u32),
}

impl ImageGenerator {
    /// Engines are tried in the order given.
    pub fn new(engines: Vec<Box<dyn ImageEngine>>) -> Self {
        Self {
            engines,
            fallback_size: (512, 512),
        }
    }

    pub fn from_credentials(credentials: &EngineCredentials, client: Client) -> Self {
        Self::new(build_engines(credentials, client))
    }

    pub fn with_fallback_size(mut self, width: u32, height: u32) -> Self {
        self.fallback_size = (width, height);
        self
    }

    /// Configured remote engines, in the order they are tried.
    pub fn configured(&self) -> Vec<EngineKind> {
        self.engines.iter().map(|e| e.kind()).collect()
    }

    fn candidates(&self, requested: Option<EngineKind>) -> Vec<&dyn ImageEngine> {
        let all = || -> Vec<&dyn ImageEngine> { self.engines.iter().map(|e| e.as_ref()).collect() };
        match requested {
            None => all(),
            Some(EngineKind::LocalFallback) => Vec::new(),
            Some(kind) => match self.engines.iter().find(|e| e.kind() == kind) {
                Some(engine) => vec![engine.as_ref()],
                None => {
                    let err = GenerationError::EngineUnavailable(kind);
                    tracing::debug!(
                        error = %err,
                        "requested engine unavailable, using priority order"
                    );
                    all()
                }
            },
        }
    }

    /// Produce an "after" image for the request.
    ///
    /// Remote engine failures are logged and fall through; only a failure of
    /// the local renderer yields `success: false`.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        progress: &(dyn Fn(GenerationProgress) + Send + Sync),
    ) -> GenerationResult {
        let mut milestones = Milestones { sink: progress, last: 0 };

        let prompt = build_prompt(&request.analysis, request.plan.as_ref(), &request.preferences);
        milestones.reach(20, GenerationPhase::BuildingPrompt);

        let options = EngineOptions {
            quality: request.quality,
            reference_image: request.reference_image.clone(),
        };

        for (attempt, engine) in self.candidates(request.engine).into_iter().enumerate() {
            let kind = engine.kind();
            let phase = if attempt == 0 {
                GenerationPhase::Generating(kind)
            } else {
                GenerationPhase::Retrying(kind)
            };
            milestones.reach(60, phase);

            match engine.generate(&prompt, &options).await {
                Ok(image) => {
                    milestones.reach(90, phase);
                    let generated = GeneratedImage {
                        id: Uuid::new_v4().to_string(),
                        url: image.into_url(),
                        prompt: prompt.clone(),
                        engine: kind,
                        quality: request.quality,
                        generated_at: Utc::now(),
                        metadata: None,
                    };
                    tracing::info!(engine = %kind, "image generated");
                    milestones.reach(100, GenerationPhase::Done);
                    return GenerationResult::succeeded(prompt, generated);
                }
                Err(e) => {
                    tracing::warn!(engine = %kind, error = %e, "engine failed, falling through");
                }
            }
        }

        milestones.reach(60, GenerationPhase::Fallback);
        let (width, height) = self.fallback_size;
        let palette = request.plan.as_ref().map(|p| p.color_palette());
        let result = match fallback::render_data_url(&prompt, palette, width, height) {
            Ok(url) => {
                milestones.reach(90, GenerationPhase::Fallback);
                let generated = GeneratedImage {
                    id: Uuid::new_v4().to_string(),
                    url,
                    prompt: prompt.clone(),
                    engine: EngineKind::LocalFallback,
                    quality: request.quality,
                    generated_at: Utc::now(),
                    metadata: Some(serde_json::json!({
                        "placeholder": true,
                        "width": width,
                        "height": height,
                    })),
                };
                tracing::info!(engine = %EngineKind::LocalFallback, "placeholder rendered");
                GenerationResult::succeeded(prompt, generated)
            }
            Err(e) => {
                tracing::error!(error = %e, "local fallback failed");
                milestones.reach(90, GenerationPhase::Fallback);
                GenerationResult::failed(prompt, &e)
            }
        };
        milestones.reach(100, GenerationPhase::Done);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::{ApiCredential, EngineImage};
    use async_trait::async_trait;
    use makeup_core::recommend::generate_plan;
    use makeup_core::types::DetectionResult;
    use makeup_core::{FaceAnalysis, Preferences};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct Scripted {
        kind: EngineKind,
        succeed: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ImageEngine for Scripted {
        fn kind(&self) -> EngineKind {
            self.kind
        }

        async fn generate(
            &self,
            _prompt: &str,
            _options: &EngineOptions,
        ) -> Result<EngineImage, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(EngineImage::Url(format!("https://{}/img.png", self.kind)))
            } else {
                Err(GenerationError::request(self.kind, "boom"))
            }
        }
    }

    fn scripted(kind: EngineKind, succeed: bool) -> (Box<dyn ImageEngine>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Box::new(Scripted { kind, succeed, calls: calls.clone() }), calls)
    }

    fn request() -> GenerationRequest {
        let analysis = FaceAnalysis::undetected(DetectionResult::not_detected());
        let plan = generate_plan(&analysis, &Preferences::default());
        GenerationRequest::new(analysis, Preferences::default()).with_plan(plan)
    }

    type Events = Arc<Mutex<Vec<GenerationProgress>>>;

    fn recorder() -> (Events, impl Fn(GenerationProgress) + Send + Sync) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        (events, move |p| sink.lock().unwrap().push(p))
    }

    fn percents(events: &Mutex<Vec<GenerationProgress>>) -> Vec<u8> {
        events.lock().unwrap().iter().map(|p| p.percent).collect()
    }

    #[tokio::test]
    async fn test_no_engines_uses_fallback() {
        let (events, sink) = recorder();
        let result = ImageGenerator::new(Vec::new()).generate(&request(), &sink).await;

        assert!(result.success);
        assert_eq!(result.engine(), Some(EngineKind::LocalFallback));
        assert!(result.images[0].url.starts_with("data:image/png;base64,"));
        assert_eq!(percents(&events), vec![20, 60, 90, 100]);
    }

    #[tokio::test]
    async fn test_falls_through_priority_list() {
        let (openai, openai_calls) = scripted(EngineKind::OpenAi, false);
        let (stability, stability_calls) = scripted(EngineKind::Stability, true);
        let (hf, hf_calls) = scripted(EngineKind::HuggingFace, true);
        let (events, sink) = recorder();

        let result = ImageGenerator::new(vec![openai, stability, hf])
            .generate(&request(), &sink)
            .await;

        assert!(result.success);
        assert_eq!(result.engine(), Some(EngineKind::Stability));
        assert_eq!(result.images[0].url, "https://stability/img.png");
        assert_eq!(openai_calls.load(Ordering::SeqCst), 1);
        assert_eq!(stability_calls.load(Ordering::SeqCst), 1);
        assert_eq!(hf_calls.load(Ordering::SeqCst), 0);
        assert_eq!(percents(&events), vec![20, 60, 90, 100]);
    }

    #[tokio::test]
    async fn test_all_engines_fail_still_succeeds() {
        let (a, _) = scripted(EngineKind::OpenAi, false);
        let (b, _) = scripted(EngineKind::HuggingFace, false);
        let (events, sink) = recorder();

        let result = ImageGenerator::new(vec![a, b]).generate(&request(), &sink).await;

        assert!(result.success);
        assert_eq!(result.engine(), Some(EngineKind::LocalFallback));
        assert!(result.error.is_none());
        assert_eq!(percents(&events), vec![20, 60, 90, 100]);
    }

    #[tokio::test]
    async fn test_requested_engine_is_tried_alone() {
        let (openai, openai_calls) = scripted(EngineKind::OpenAi, true);
        let (hf, hf_calls) = scripted(EngineKind::HuggingFace, false);
        let mut req = request();
        req.engine = Some(EngineKind::HuggingFace);

        let result = ImageGenerator::new(vec![openai, hf]).generate(&req, &|_| {}).await;

        // Requested engine failed; go straight to the fallback.
        assert_eq!(result.engine(), Some(EngineKind::LocalFallback));
        assert_eq!(hf_calls.load(Ordering::SeqCst), 1);
        assert_eq!(openai_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_request_uses_priority() {
        let (openai, _) = scripted(EngineKind::OpenAi, true);
        let mut req = request();
        req.engine = Some(EngineKind::Stability);

        let result = ImageGenerator::new(vec![openai]).generate(&req, &|_| {}).await;
        assert_eq!(result.engine(), Some(EngineKind::OpenAi));
    }

    #[tokio::test]
    async fn test_fallback_render_error_is_only_failure() {
        let (events, sink) = recorder();
        let result = ImageGenerator::new(Vec::new())
            .with_fallback_size(0, 0)
            .generate(&request(), &sink)
            .await;

        assert!(!result.success);
        assert!(result.images.is_empty());
        assert!(result.error.is_some());
        assert!(!result.prompt.is_empty());
        assert_eq!(percents(&events), vec![20, 60, 90, 100]);
    }

    #[tokio::test]
    async fn test_http_engine_end_to_end() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/images/generations")
            .with_status(500)
            .create_async()
            .await;
        let creds = EngineCredentials {
            openai: Some(ApiCredential::new("sk").with_base_url(server.url())),
            ..Default::default()
        };
        let generator = ImageGenerator::from_credentials(&creds, Client::new());
        assert_eq!(generator.configured(), vec![EngineKind::OpenAi]);

        let result = generator.generate(&request(), &|_| {}).await;
        assert!(result.success);
        assert_eq!(result.engine(), Some(EngineKind::LocalFallback));
    }
}

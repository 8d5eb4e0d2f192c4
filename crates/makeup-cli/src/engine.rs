use crate::config::Config;
use makeup_capture::{Camera, CameraError, FrameError};
use makeup_core::preprocess::encode_png;
use makeup_core::{
    AnalysisRecord, CompositeDetector, DetectorStatus, FaceAnalyzer, Preferences, PreprocessError,
    UploadedFile,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("image error: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("failed to spawn engine thread: {0}")]
    Spawn(std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Monotonic id for an analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestTicket(u64);

impl RequestTicket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// A completed result tagged with the ticket it was issued under.
#[derive(Debug)]
pub struct Fenced<T> {
    pub ticket: RequestTicket,
    pub value: T,
}

/// Analysis of a captured still, plus the PNG it was run on.
pub struct CaptureOutcome {
    pub record: AnalysisRecord,
    pub png: Vec<u8>,
}

/// Messages sent from the command layer to the engine thread.
enum EngineRequest {
    Analyze {
        file: UploadedFile,
        prefs: Preferences,
        reply: oneshot::Sender<Result<AnalysisRecord, EngineError>>,
    },
    Capture {
        prefs: Preferences,
        reply: oneshot::Sender<Result<CaptureOutcome, EngineError>>,
    },
    Status {
        reply: oneshot::Sender<DetectorStatus>,
    },
}

/// Clone-safe handle to the engine thread.
///
/// Every analysis is issued a ticket; a result is only current if no newer
/// ticket has been issued since. Stale results are still delivered so the
/// caller decides whether to drop them.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    latest: Arc<AtomicU64>,
}

impl EngineHandle {
    fn issue(&self) -> RequestTicket {
        RequestTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// True if no request has been issued after `ticket`.
    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// Validate, process, detect, extract and recommend for an upload.
    pub async fn analyze(
        &self,
        file: UploadedFile,
        prefs: Preferences,
    ) -> Result<Fenced<AnalysisRecord>, EngineError> {
        let ticket = self.issue();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Analyze {
                file,
                prefs,
                reply: reply_tx,
            })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        let value = reply_rx.await.map_err(|_| EngineError::ChannelClosed)??;
        Ok(Fenced { ticket, value })
    }

    /// Take a still from the configured camera and analyze it.
    pub async fn capture(&self, prefs: Preferences) -> Result<Fenced<CaptureOutcome>, EngineError> {
        let ticket = self.issue();
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Capture { prefs, reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        let value = reply_rx.await.map_err(|_| EngineError::ChannelClosed)??;
        Ok(Fenced { ticket, value })
    }

    pub async fn status(&self) -> Result<DetectorStatus, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Status { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Load the ML detector with a bounded wait.
///
/// The load runs on a detached thread. On timeout its result is discarded
/// and the engine proceeds heuristic-only without waiting for it.
pub async fn init_detector(model_path: PathBuf, timeout: Duration) -> CompositeDetector {
    init_detector_with(move || CompositeDetector::initialize(&model_path), timeout).await
}

async fn init_detector_with<F>(load: F, timeout: Duration) -> CompositeDetector
where
    F: FnOnce() -> CompositeDetector + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let spawned = std::thread::Builder::new()
        .name("makeup-detector-init".into())
        .spawn(move || {
            let _ = tx.send(load());
        });
    if let Err(e) = spawned {
        tracing::warn!(
            error = %e,
            "failed to spawn detector init thread; using heuristic detector"
        );
        return CompositeDetector::heuristic_only();
    }

    match tokio::time::timeout(timeout, rx).await {
        Ok(Ok(detector)) => detector,
        Ok(Err(_)) => {
            tracing::warn!("detector init thread exited early; using heuristic detector");
            CompositeDetector::heuristic_only()
        }
        Err(_) => {
            tracing::warn!(
                timeout_ms = timeout.as_millis() as u64,
                "detector init timed out; using heuristic detector"
            );
            CompositeDetector::heuristic_only()
        }
    }
}

/// Spawn the engine on a dedicated OS thread.
///
/// The detector is initialized first (bounded by the configured timeout).
/// The camera is opened per capture request and released before replying.
pub async fn spawn_engine(config: &Config) -> Result<EngineHandle, EngineError> {
    let detector = init_detector(config.scrfd_model_path(), config.detector_init_timeout()).await;
    tracing::info!(status = detector.status().as_str(), "face detector ready");

    let analyzer = FaceAnalyzer::new(
        makeup_core::preprocess::Preprocessor::new(config.max_upload_bytes),
        config.process_options(),
        detector,
    );
    let camera_device = config.camera_device.clone();
    let warmup_frames = config.warmup_frames;

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("makeup-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Analyze { file, prefs, reply } => {
                        let result = analyzer.analyze(&file, &prefs).map_err(EngineError::from);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Capture { prefs, reply } => {
                        let result = run_capture(&analyzer, &camera_device, warmup_frames, &prefs);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Status { reply } => {
                        let _ = reply.send(analyzer.detector_status());
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle {
        tx,
        latest: Arc::new(AtomicU64::new(0)),
    })
}

fn run_capture(
    analyzer: &FaceAnalyzer,
    device: &str,
    warmup: usize,
    prefs: &Preferences,
) -> Result<CaptureOutcome, EngineError> {
    let camera = Camera::open(device)?;
    let frame = camera.capture_still(warmup)?;
    drop(camera);
    tracing::debug!(seq = frame.sequence, brightness = frame.avg_brightness(), "captured still");

    let image = frame.into_rgb_image()?;
    let png = encode_png(&image)?;
    let record = analyzer.analyze_frame(image, prefs)?;
    Ok(CaptureOutcome { record, png })
}

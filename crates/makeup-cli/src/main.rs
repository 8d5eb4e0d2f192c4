use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use makeup_capture::Camera;
use makeup_core::{Occasion, Preferences, Region, Style, UploadedFile};
use makeup_imagegen::{
    EngineKind, GenerationProgress, GenerationRequest, ImageGenerator, ImageQuality,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod engine;

use config::Config;
use engine::EngineHandle;

#[derive(Parser)]
#[command(name = "makeup", about = "Face analysis and makeup recommendations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct PreferenceArgs {
    /// natural, glamour, professional, casual or party
    #[arg(long, default_value = "natural")]
    style: String,
    /// daily, work, date, party or wedding
    #[arg(long, default_value = "daily")]
    occasion: String,
    /// global, japan, korea, china, usa or europe
    #[arg(long, default_value = "global")]
    region: String,
}

impl PreferenceArgs {
    fn preferences(&self) -> Preferences {
        Preferences {
            style: Style::from_label(&self.style),
            occasion: Occasion::from_label(&self.occasion),
            region: Region::from_label(&self.region),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a photo and print a makeup plan as JSON
    Analyze {
        image: PathBuf,
        #[command(flatten)]
        prefs: PreferenceArgs,
        /// Write the record here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Take a photo with the camera and analyze it
    Capture {
        #[command(flatten)]
        prefs: PreferenceArgs,
        /// Also save the captured still as PNG
        #[arg(long)]
        save_image: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Analyze a photo and render an "after" image
    Generate {
        image: PathBuf,
        #[command(flatten)]
        prefs: PreferenceArgs,
        /// openai, stability, huggingface or local
        #[arg(long)]
        engine: Option<String>,
        /// Request high-definition output
        #[arg(long)]
        hd: bool,
        /// Send the source photo to engines that support image-to-image
        #[arg(long)]
        reference: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show detector and engine status
    Status,
    /// List capture devices
    Devices,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    detector: &'static str,
    model_path: PathBuf,
    engines: Vec<EngineKind>,
    camera_device: String,
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote output");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn read_upload(path: &Path) -> Result<UploadedFile> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
    Ok(UploadedFile::sniffed(name, bytes))
}

fn generator(config: &Config) -> Result<ImageGenerator> {
    let client = reqwest::Client::builder()
        .timeout(config.engine_timeout())
        .build()
        .context("building HTTP client")?;
    Ok(ImageGenerator::from_credentials(&config.credentials, client))
}

async fn start_engine(config: &Config) -> Result<EngineHandle> {
    engine::spawn_engine(config).await.context("starting analysis engine")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Analyze { image, prefs, output } => {
            let handle = start_engine(&config).await?;
            let fenced = handle.analyze(read_upload(&image)?, prefs.preferences()).await?;
            if !handle.is_current(fenced.ticket) {
                tracing::warn!(
                    ticket = fenced.ticket.id(),
                    "analysis superseded by a newer request"
                );
            }
            write_json(&fenced.value, output.as_deref())?;
        }
        Commands::Capture {
            prefs,
            save_image,
            output,
        } => {
            let handle = start_engine(&config).await?;
            let fenced = handle.capture(prefs.preferences()).await?;
            if let Some(path) = save_image.as_deref() {
                std::fs::write(path, &fenced.value.png)
                    .with_context(|| format!("writing {}", path.display()))?;
            }
            write_json(&fenced.value.record, output.as_deref())?;
        }
        Commands::Generate {
            image,
            prefs,
            engine: engine_label,
            hd,
            reference,
            output,
        } => {
            let requested = match engine_label.as_deref() {
                Some(label) => Some(
                    EngineKind::from_label(label)
                        .with_context(|| format!("unknown engine {label:?}"))?,
                ),
                None => None,
            };
            let upload = read_upload(&image)?;
            let reference_image = reference.then(|| upload.bytes.clone());

            let handle = start_engine(&config).await?;
            let record = handle.analyze(upload, prefs.preferences()).await?.value;

            let mut request =
                GenerationRequest::new(record.analysis, record.preferences).with_plan(record.plan);
            request.engine = requested;
            request.quality = if hd { ImageQuality::Hd } else { ImageQuality::Standard };
            request.reference_image = reference_image;

            let result = generator(&config)?
                .generate(&request, &|p: GenerationProgress| {
                    tracing::info!(percent = p.percent, phase = ?p.phase, "generation progress");
                })
                .await;
            write_json(&result, output.as_deref())?;
            if !result.success {
                anyhow::bail!(result.error.unwrap_or_else(|| "image generation failed".into()));
            }
        }
        Commands::Status => {
            let handle = start_engine(&config).await?;
            let report = StatusReport {
                detector: handle.status().await?.as_str(),
                model_path: config.scrfd_model_path(),
                engines: generator(&config)?.configured(),
                camera_device: config.camera_device.clone(),
            };
            write_json(&report, None)?;
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                tracing::warn!("no V4L2 capture devices found");
            }
            write_json(&devices, None)?;
        }
    }

    Ok(())
}

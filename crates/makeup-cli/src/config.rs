use makeup_core::preprocess::{OutputFormat, ProcessOptions, DEFAULT_MAX_UPLOAD_BYTES};
use makeup_imagegen::engines::ApiCredential;
use makeup_imagegen::EngineCredentials;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Runtime configuration.
///
/// Layered as defaults, then the TOML file named by `MAKEUP_CONFIG`, then
/// `MAKEUP_*` environment variables. Engine credentials come from the
/// environment only.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Upper bound on detector model loading before running heuristic-only.
    pub detector_init_timeout_secs: u64,
    pub max_upload_bytes: usize,
    pub max_width: u32,
    pub max_height: u32,
    pub jpeg_quality: u8,
    /// V4L2 device path.
    pub camera_device: String,
    /// Frames discarded while the camera's auto-exposure settles.
    pub warmup_frames: usize,
    /// Per-request timeout for remote generation engines.
    pub engine_timeout_secs: u64,
    #[serde(skip)]
    pub credentials: EngineCredentials,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_dir: makeup_core::default_model_dir(),
            detector_init_timeout_secs: 10,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_width: 1024,
            max_height: 1024,
            jpeg_quality: 85,
            camera_device: "/dev/video0".to_string(),
            warmup_frames: 4,
            engine_timeout_secs: 60,
            credentials: EngineCredentials::default(),
        }
    }
}

impl Config {
    /// Load from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` in place of the process environment.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup("MAKEUP_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(&lookup);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("MAKEUP_MODEL_DIR") {
            self.model_dir = PathBuf::from(dir);
        }
        if let Some(dev) = lookup("MAKEUP_CAMERA_DEVICE") {
            self.camera_device = dev;
        }
        env_parse(
            lookup,
            "MAKEUP_DETECTOR_INIT_TIMEOUT_SECS",
            &mut self.detector_init_timeout_secs,
        );
        env_parse(lookup, "MAKEUP_MAX_UPLOAD_BYTES", &mut self.max_upload_bytes);
        env_parse(lookup, "MAKEUP_MAX_WIDTH", &mut self.max_width);
        env_parse(lookup, "MAKEUP_MAX_HEIGHT", &mut self.max_height);
        env_parse(lookup, "MAKEUP_JPEG_QUALITY", &mut self.jpeg_quality);
        env_parse(lookup, "MAKEUP_WARMUP_FRAMES", &mut self.warmup_frames);
        env_parse(lookup, "MAKEUP_ENGINE_TIMEOUT_SECS", &mut self.engine_timeout_secs);

        self.credentials = EngineCredentials {
            openai: credential(lookup, "MAKEUP_OPENAI_API_KEY", "MAKEUP_OPENAI_BASE_URL"),
            stability: credential(lookup, "MAKEUP_STABILITY_API_KEY", "MAKEUP_STABILITY_BASE_URL"),
            huggingface: credential(
                lookup,
                "MAKEUP_HUGGINGFACE_TOKEN",
                "MAKEUP_HUGGINGFACE_BASE_URL",
            ),
        };
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> PathBuf {
        self.model_dir.join("det_10g.onnx")
    }

    pub fn process_options(&self) -> ProcessOptions {
        ProcessOptions {
            max_width: self.max_width,
            max_height: self.max_height,
            quality: self.jpeg_quality.clamp(1, 100),
            format: OutputFormat::Jpeg,
        }
    }

    pub fn detector_init_timeout(&self) -> Duration {
        Duration::from_secs(self.detector_init_timeout_secs)
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }
}

fn env_parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(v) => *slot = v,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparsable environment override"),
    }
}

fn credential(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    base_url_key: &str,
) -> Option<ApiCredential> {
    let api_key = lookup(key).filter(|k| !k.trim().is_empty())?;
    Some(ApiCredential {
        api_key,
        base_url: lookup(base_url_key),
        model: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::load_with(env(&[])).unwrap();
        assert_eq!(config.detector_init_timeout_secs, 10);
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(config.camera_device, "/dev/video0");
        assert!(config.scrfd_model_path().ends_with("det_10g.onnx"));
        assert_eq!(config.credentials, EngineCredentials::default());
    }

    #[test]
    fn test_file_then_env_layering() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "max_width = 800\nwarmup_frames = 2\ncamera_device = \"/dev/video4\""
        )
        .unwrap();
        let path = file.path().to_string_lossy().into_owned();

        let config = Config::load_with(env(&[
            ("MAKEUP_CONFIG", path.as_str()),
            ("MAKEUP_WARMUP_FRAMES", "6"),
            ("MAKEUP_MAX_HEIGHT", "not-a-number"),
        ]))
        .unwrap();

        assert_eq!(config.max_width, 800);
        assert_eq!(config.camera_device, "/dev/video4");
        assert_eq!(config.warmup_frames, 6);
        assert_eq!(config.max_height, 1024);
    }

    #[test]
    fn test_unknown_key_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "similarity_threshold = 0.4").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err =
            Config::load_with(env(&[("MAKEUP_CONFIG", "/nonexistent/makeup.toml")])).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_credentials_from_env() {
        let config = Config::load_with(env(&[
            ("MAKEUP_STABILITY_API_KEY", "sk-stab"),
            ("MAKEUP_STABILITY_BASE_URL", "http://localhost:9000"),
            ("MAKEUP_OPENAI_API_KEY", ""),
        ]))
        .unwrap();
        assert!(config.credentials.openai.is_none());
        let stab = config.credentials.stability.unwrap();
        assert_eq!(stab.api_key, "sk-stab");
        assert_eq!(stab.base_url.as_deref(), Some("http://localhost:9000"));
    }
}

//! Runtime configuration: JSON file, then CLI overrides, then `validate`.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alerting::alert_state_machine::DEFAULT_HIGH_RISK_THRESHOLD;
use crate::annotation::infrastructure::frame_annotator::{
    DEFAULT_FONT_SIZE, DEFAULT_LINE_THICKNESS,
};
use crate::capture::domain::capture_target::CaptureTarget;
use crate::capture::infrastructure::ffmpeg_capture::CaptureOptions;
use crate::detection::infrastructure::onnx_yolo_detector::{
    DEFAULT_CONFIDENCE, DEFAULT_INPUT_SIZE,
};
use crate::pipeline::streaming_loop::StreamingOptions;
use crate::shared::constants::{
    DEFAULT_CAPTURE_HEIGHT, DEFAULT_CAPTURE_WIDTH, DEFAULT_JPEG_QUALITY, DEFAULT_TRANSMIT_HEIGHT,
    DEFAULT_TRANSMIT_WIDTH,
};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub source: CaptureTarget,
    pub width: u32,
    pub height: u32,
    /// Stay idle until the viewer page is first requested.
    pub open_on_demand: bool,
    pub idle_retry_ms: u64,
    pub glitch_retry_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: CaptureTarget::default(),
            width: DEFAULT_CAPTURE_WIDTH,
            height: DEFAULT_CAPTURE_HEIGHT,
            open_on_demand: true,
            idle_retry_ms: 1000,
            glitch_retry_ms: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub model_path: Option<PathBuf>,
    pub model_url: Option<String>,
    pub input_size: u32,
    pub confidence: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            model_url: None,
            input_size: DEFAULT_INPUT_SIZE,
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub threshold: u32,
    pub summary_interval_ms: u64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_HIGH_RISK_THRESHOLD,
            summary_interval_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub frame_interval_ms: u64,
    pub decimation: usize,
    pub transmit_width: u32,
    pub transmit_height: u32,
    pub jpeg_quality: u8,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 30,
            decimation: 3,
            transmit_width: DEFAULT_TRANSMIT_WIDTH,
            transmit_height: DEFAULT_TRANSMIT_HEIGHT,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
    pub line_thickness: u32,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            font_size: DEFAULT_FONT_SIZE,
            line_thickness: DEFAULT_LINE_THICKNESS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Alert texts that may wait per viewer. Frames keep only the latest.
    pub client_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8000".to_string(),
            client_queue: 32,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskwatchConfig {
    pub capture: CaptureConfig,
    pub detector: DetectorConfig,
    pub alert: AlertConfig,
    pub stream: StreamConfig,
    pub annotation: AnnotationConfig,
    pub server: ServerConfig,
}

impl MaskwatchConfig {
    /// `config.json` under the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Maskwatch").join("config.json"))
    }

    /// Load from `path`, or from [`Self::default_path`] when it exists,
    /// or fall back to defaults. The result is not validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };
        let json = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_json(&json).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if !(0.0..=1.0).contains(&self.detector.confidence) {
            return invalid("detector.confidence must be within [0, 1]");
        }
        if self.detector.input_size == 0 {
            return invalid("detector.input_size must be > 0");
        }
        if self.alert.threshold == 0 {
            return invalid("alert.threshold must be >= 1");
        }
        if self.alert.summary_interval_ms == 0 {
            return invalid("alert.summary_interval_ms must be > 0");
        }
        if self.stream.frame_interval_ms == 0 {
            return invalid("stream.frame_interval_ms must be > 0");
        }
        if self.capture.idle_retry_ms == 0 {
            return invalid("capture.idle_retry_ms must be > 0");
        }
        if self.stream.decimation == 0 {
            return invalid("stream.decimation must be >= 1");
        }
        if !(1..=100).contains(&self.stream.jpeg_quality) {
            return invalid("stream.jpeg_quality must be within 1..=100");
        }
        if self.stream.transmit_width == 0 || self.stream.transmit_height == 0 {
            return invalid("stream transmit size must be non-zero");
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return invalid("capture size must be non-zero");
        }
        if let CaptureTarget::Camera { indices } = &self.capture.source {
            if indices.is_empty() {
                return invalid("capture.source needs at least one camera index");
            }
        }
        if self.annotation.font_size <= 0.0 {
            return invalid("annotation.font_size must be > 0");
        }
        if self.server.client_queue == 0 {
            return invalid("server.client_queue must be > 0");
        }
        self.bind_addr()?;
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.bind_addr.parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "server.bind_addr is not a socket address: {}",
                self.server.bind_addr
            ))
        })
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            width: self.capture.width,
            height: self.capture.height,
        }
    }

    pub fn streaming_options(&self) -> StreamingOptions {
        StreamingOptions {
            frame_interval: Duration::from_millis(self.stream.frame_interval_ms),
            idle_retry: Duration::from_millis(self.capture.idle_retry_ms),
            glitch_retry: Duration::from_millis(self.capture.glitch_retry_ms),
            decimation: self.stream.decimation,
        }
    }

    pub fn summary_interval(&self) -> Duration {
        Duration::from_millis(self.alert.summary_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = MaskwatchConfig::default();
        config.validate().unwrap();
        assert_eq!(config.alert.threshold, 2);
        assert_eq!(config.stream.decimation, 3);
        assert_eq!(config.stream.jpeg_quality, 90);
        assert_eq!(config.server.client_queue, 32);
        assert_eq!(config.summary_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = MaskwatchConfig::from_json(
            r#"{ "alert": { "threshold": 4 }, "capture": { "source": { "kind": "file", "path": "demo.mp4" } } }"#,
        )
        .unwrap();
        assert_eq!(config.alert.threshold, 4);
        assert_eq!(config.alert.summary_interval_ms, 5000);
        assert_eq!(
            config.capture.source,
            CaptureTarget::File {
                path: PathBuf::from("demo.mp4")
            }
        );
        assert!(config.capture.open_on_demand);
    }

    #[test]
    fn test_load_explicit_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{ "stream": { "jpeg_quality": 70 } }"#).unwrap();

        let config = MaskwatchConfig::load(Some(&path)).unwrap();
        assert_eq!(config.stream.jpeg_quality, 70);
    }

    #[test]
    fn test_load_missing_explicit_file_errors() {
        let err = MaskwatchConfig::load(Some(Path::new("/nonexistent/config.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_malformed_file_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let err = MaskwatchConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_serde_roundtrip_preserves_values() {
        let mut config = MaskwatchConfig::default();
        config.detector.model_url = Some("https://example.com/best.onnx".into());
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert_eq!(MaskwatchConfig::from_json(&json).unwrap(), config);
    }

    #[rstest]
    #[case(r#"{ "detector": { "confidence": 1.5 } }"#)]
    #[case(r#"{ "detector": { "confidence": -0.1 } }"#)]
    #[case(r#"{ "alert": { "threshold": 0 } }"#)]
    #[case(r#"{ "alert": { "summary_interval_ms": 0 } }"#)]
    #[case(r#"{ "stream": { "frame_interval_ms": 0 } }"#)]
    #[case(r#"{ "stream": { "decimation": 0 } }"#)]
    #[case(r#"{ "stream": { "jpeg_quality": 0 } }"#)]
    #[case(r#"{ "stream": { "jpeg_quality": 101 } }"#)]
    #[case(r#"{ "stream": { "transmit_width": 0 } }"#)]
    #[case(r#"{ "capture": { "source": { "kind": "camera", "indices": [] } } }"#)]
    #[case(r#"{ "server": { "bind_addr": "not-an-address" } }"#)]
    #[case(r#"{ "server": { "client_queue": 0 } }"#)]
    fn test_validate_rejects(#[case] json: &str) {
        let config = MaskwatchConfig::from_json(json).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_streaming_options_mapping() {
        let config = MaskwatchConfig::default();
        let options = config.streaming_options();
        assert_eq!(options.frame_interval, Duration::from_millis(30));
        assert_eq!(options.idle_retry, Duration::from_secs(1));
        assert_eq!(options.glitch_retry, Duration::from_millis(10));
        assert_eq!(options.decimation, 3);
    }
}

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::VideoError;

/// Frame rate of the rendered slideshow.
pub const DEFAULT_FPS: u32 = 30;
pub const DEFAULT_MODEL: &str = "glm-4.6v-flash";
pub const DEFAULT_TTS_PROGRAM: &str = "chatterbox-tts";
pub const API_KEY_ENV: &str = "ELYRIA_API_KEY";

/// Target video size, written as `WxH` on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = VideoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || VideoError::InvalidArgument(format!("resolution must look like 1920x1080, got '{}'", s));
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: u32 = w.trim().parse().map_err(|_| invalid())?;
        let height: u32 = h.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

/// Device the voice model runs on. `gpu` is accepted as an alias for `cuda`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
    Tpu,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
            Device::Tpu => "tpu",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Device {
    type Err = VideoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda),
            "tpu" => Ok(Device::Tpu),
            other => Err(VideoError::InvalidArgument(format!(
                "unknown device '{}', expected cpu, cuda, gpu or tpu",
                other
            ))),
        }
    }
}

/// Settings for one video pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub resolution: Resolution,
    pub fps: u32,
    /// Final output path; intermediates are derived from its stem.
    pub output_path: PathBuf,
    pub voice_path: PathBuf,
    /// Accepted for CLI compatibility, not used by the pipeline.
    pub delay: f64,
    /// Accepted for CLI compatibility, not used by the pipeline.
    pub similarity: f64,
}

impl PipelineConfig {
    pub fn new(output_path: PathBuf, voice_path: PathBuf) -> Self {
        Self {
            resolution: Resolution::default(),
            fps: DEFAULT_FPS,
            output_path,
            voice_path,
            delay: 5.0,
            similarity: 0.65,
        }
    }
}

/// Image API settings shared by the video pipeline and the batch generator.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Option<Duration>,
}

impl ApiConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            timeout: None,
        }
    }

    pub fn generations_url(&self) -> String {
        format!("{}/images/generations", self.endpoint)
    }
}

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VideoError {
    #[error("{kind} file not found: {}", path.display())]
    InputNotFound { kind: &'static str, path: PathBuf },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Voice synthesis error: {0}")]
    VoiceError(String),

    #[error("Video generation error: {0}")]
    VideoGenerationError(String),

    #[error("Monitor error: {0}")]
    MonitorError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("WAV error: {0}")]
    WavError(#[from] hound::Error),

    #[error("FFmpeg error: {0}")]
    FfmpegError(String),
}

pub type Result<T> = std::result::Result<T, VideoError>;

/// Fails with [`VideoError::InputNotFound`] unless `path` exists.
pub fn require_file(kind: &'static str, path: &std::path::Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(VideoError::InputNotFound {
            kind,
            path: path.to_path_buf(),
        })
    }
}

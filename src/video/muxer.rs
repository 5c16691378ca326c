use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum MuxError {
    #[error("muxing tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("muxing tool failed with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// Merges a video-only file and an audio file into one container.
pub trait Muxer {
    fn merge(&self, video: &Path, audio: &Path) -> Result<PathBuf, MuxError>;

    /// Command an operator can run by hand when `merge` fails.
    fn manual_command(&self, video: &Path, audio: &Path) -> String;
}

/// `<stem>_final.mp4` next to the video.
pub fn final_path(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    video.with_file_name(format!("{}_final.mp4", stem))
}

/// `<stem>_audio.wav` next to the video.
pub fn audio_path(video: &Path) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    video.with_file_name(format!("{}_audio.wav", stem))
}

#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    program: PathBuf,
}

impl FfmpegMuxer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_owned(),
            "-i".to_owned(),
            video.to_string_lossy().into_owned(),
            "-i".to_owned(),
            audio.to_string_lossy().into_owned(),
            "-c:v".to_owned(),
            "copy".to_owned(),
            "-c:a".to_owned(),
            "aac".to_owned(),
            "-strict".to_owned(),
            "experimental".to_owned(),
            output.to_string_lossy().into_owned(),
        ]
    }
}

impl Default for FfmpegMuxer {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Muxer for FfmpegMuxer {
    fn merge(&self, video: &Path, audio: &Path) -> Result<PathBuf, MuxError> {
        info!("Adding audio to video...");
        let output = final_path(video);

        let result = Command::new(&self.program)
            .args(Self::args(video, audio, &output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output();

        let result = match result {
            Ok(result) => result,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(MuxError::ToolUnavailable(format!(
                    "'{}' not found",
                    self.program.display()
                )))
            }
            Err(e) => return Err(MuxError::ToolUnavailable(e.to_string())),
        };

        if !result.status.success() {
            return Err(MuxError::Failed {
                status: result.status.to_string(),
                stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }

        info!("Added audio to video: {}", output.display());
        Ok(output)
    }

    fn manual_command(&self, video: &Path, audio: &Path) -> String {
        format!(
            "{} -i {} -i {} -c:v copy -c:a aac {}",
            self.program.display(),
            video.display(),
            audio.display(),
            final_path(video).display()
        )
    }
}

/// Where the rendered output ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuxOutcome {
    Merged(PathBuf),
    Separate {
        video: PathBuf,
        audio: PathBuf,
        command: String,
        reason: String,
    },
}

impl MuxOutcome {
    pub fn paths(&self) -> Vec<&Path> {
        match self {
            MuxOutcome::Merged(path) => vec![path.as_path()],
            MuxOutcome::Separate { video, audio, .. } => vec![video.as_path(), audio.as_path()],
        }
    }
}

/// Merges the intermediates; on success they are deleted, on failure they are
/// kept and reported together with the manual merge command.
pub fn finish_mux(muxer: &dyn Muxer, video: &Path, audio: &Path) -> MuxOutcome {
    match muxer.merge(video, audio) {
        Ok(merged) => {
            for intermediate in [video, audio] {
                if let Err(e) = std::fs::remove_file(intermediate) {
                    warn!("Could not remove {}: {}", intermediate.display(), e);
                }
            }
            MuxOutcome::Merged(merged)
        }
        Err(e) => {
            warn!("Could not merge video and audio: {}", e);
            MuxOutcome::Separate {
                video: video.to_path_buf(),
                audio: audio.to_path_buf(),
                command: muxer.manual_command(video, audio),
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_sibling_paths() {
        let video = Path::new("output/video.mp4");
        assert_eq!(final_path(video), PathBuf::from("output/video_final.mp4"));
        assert_eq!(audio_path(video), PathBuf::from("output/video_audio.wav"));
    }

    #[test]
    fn args_copy_video_and_encode_aac() {
        let args = FfmpegMuxer::args(Path::new("v.mp4"), Path::new("a.wav"), Path::new("f.mp4"));
        assert_eq!(
            args.join(" "),
            "-y -i v.mp4 -i a.wav -c:v copy -c:a aac -strict experimental f.mp4"
        );
    }

    #[cfg(unix)]
    #[test]
    fn failing_tool_keeps_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("video.mp4");
        let audio = dir.path().join("video_audio.wav");
        std::fs::write(&video, b"v").unwrap();
        std::fs::write(&audio, b"a").unwrap();

        let muxer = FfmpegMuxer::new("false");
        assert!(matches!(muxer.merge(&video, &audio), Err(MuxError::Failed { .. })));

        let outcome = finish_mux(&muxer, &video, &audio);
        match &outcome {
            MuxOutcome::Separate { reason, .. } => assert!(reason.contains("failed with")),
            other => panic!("expected separate outputs, got {:?}", other),
        }
        assert_eq!(outcome.paths(), vec![video.as_path(), audio.as_path()]);
        assert!(video.exists() && audio.exists());
        assert!(!dir.path().join("video_final.mp4").exists());
    }

    #[test]
    fn missing_tool_keeps_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("video.mp4");
        let audio = dir.path().join("video_audio.wav");
        std::fs::write(&video, b"v").unwrap();
        std::fs::write(&audio, b"a").unwrap();

        let muxer = FfmpegMuxer::new("/nonexistent/ffmpeg");
        let outcome = finish_mux(&muxer, &video, &audio);

        match &outcome {
            MuxOutcome::Separate { command, reason, .. } => {
                assert!(command.contains("-c:v copy -c:a aac"));
                assert!(reason.contains("unavailable"));
            }
            other => panic!("expected separate outputs, got {:?}", other),
        }
        assert_eq!(outcome.paths(), vec![video.as_path(), audio.as_path()]);
        assert!(video.exists() && audio.exists());
    }
}

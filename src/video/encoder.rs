use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use tracing::info;

use super::slides::{ImageId, ImageRegistry};
use super::timeline::Timeline;
use crate::error::{Result, VideoError};

/// Writes a timeline's frames to a video-only file.
pub trait VideoEncoder {
    fn encode(&self, timeline: &Timeline, slides: &ImageRegistry, output: &Path) -> Result<()>;
}

/// Pipes raw RGB frames into an `ffmpeg` child process.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    program: PathBuf,
}

impl FfmpegEncoder {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

pub fn rawvideo_args(size: &str, fps: u32, output: &Path) -> Vec<String> {
    vec![
        "-hide_banner".to_owned(),
        "-loglevel".to_owned(),
        "error".to_owned(),
        "-y".to_owned(),
        "-f".to_owned(),
        "rawvideo".to_owned(),
        "-pix_fmt".to_owned(),
        "rgb24".to_owned(),
        "-s:v".to_owned(),
        size.to_owned(),
        "-r".to_owned(),
        fps.to_string(),
        "-i".to_owned(),
        "-".to_owned(),
        "-an".to_owned(),
        "-c:v".to_owned(),
        "libx264".to_owned(),
        "-preset".to_owned(),
        "medium".to_owned(),
        "-crf".to_owned(),
        "18".to_owned(),
        "-pix_fmt".to_owned(),
        "yuv420p".to_owned(),
        output.to_string_lossy().into_owned(),
    ]
}

impl VideoEncoder for FfmpegEncoder {
    fn encode(&self, timeline: &Timeline, slides: &ImageRegistry, output: &Path) -> Result<()> {
        let resolution = slides.resolution();
        let args = rawvideo_args(&resolution.to_string(), timeline.fps, output);
        info!(
            "Encoding {} frames at {} fps into {}",
            timeline.total_frames(),
            timeline.fps,
            output.display()
        );

        let mut frames: HashMap<ImageId, Vec<u8>> = HashMap::new();
        for run in &timeline.runs {
            if let Entry::Vacant(slot) = frames.entry(run.image) {
                slot.insert(slides.load_rgb(run.image)?.into_raw());
            }
        }

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    VideoError::FfmpegError(format!(
                        "ffmpeg executable not found at '{}'",
                        self.program.display()
                    ))
                } else {
                    VideoError::FfmpegError(format!("failed to spawn ffmpeg encoder: {}", e))
                }
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| VideoError::FfmpegError("failed to capture ffmpeg stdin".to_string()))?;
        // Drained while frames are written.
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = pipe.read_to_string(&mut buf);
                buf
            })
        });

        let mut write_result = Ok(());
        for run in &timeline.runs {
            let Some(frame) = frames.get(&run.image) else {
                continue;
            };
            for _ in 0..run.count {
                if let Err(e) = stdin.write_all(frame) {
                    write_result = Err(e);
                    break;
                }
            }
            if write_result.is_err() {
                break;
            }
        }
        drop(stdin);

        let status = child.wait()?;
        let stderr = stderr_reader
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(VideoError::FfmpegError(format!(
                "ffmpeg encoder failed with {}: {}",
                status,
                stderr.trim()
            )));
        }
        write_result.map_err(|e| VideoError::FfmpegError(format!("failed to write frame: {}", e)))?;

        info!("Video created: {}", output.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_describe_raw_rgb_input() {
        let args = rawvideo_args("1280x720", 30, Path::new("out/video.mp4"));
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt rgb24 -s:v 1280x720 -r 30 -i -"));
        assert!(joined.contains("-an -c:v libx264"));
        assert!(joined.contains("-pix_fmt yuv420p"));
        assert_eq!(args.last().map(String::as_str), Some("out/video.mp4"));
    }

    #[cfg(unix)]
    #[test]
    fn noisy_failing_encoder_does_not_hang() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("noisy-ffmpeg");
        std::fs::write(&program, "#!/bin/sh\nhead -c 262144 /dev/zero | tr '\\0' x >&2\nexit 3\n").unwrap();
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o755)).unwrap();

        let slides = ImageRegistry::new(dir.path(), crate::config::Resolution::new(4, 4));
        let timeline = Timeline {
            fps: 30,
            runs: Vec::new(),
            track: crate::video::audio::AudioClip::silence(0, 24_000),
        };
        let err = FfmpegEncoder::new(&program)
            .encode(&timeline, &slides, &dir.path().join("v.mp4"))
            .unwrap_err();
        match err {
            VideoError::FfmpegError(msg) => assert!(msg.contains("xxxx")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn missing_program_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let slides = ImageRegistry::new(dir.path(), crate::config::Resolution::new(4, 4));
        let timeline = Timeline {
            fps: 30,
            runs: Vec::new(),
            track: crate::video::audio::AudioClip::silence(0, 24_000),
        };
        let encoder = FfmpegEncoder::new("/nonexistent/ffmpeg");
        let err = encoder
            .encode(&timeline, &slides, &dir.path().join("v.mp4"))
            .unwrap_err();
        assert!(matches!(err, VideoError::FfmpegError(_)));
    }
}

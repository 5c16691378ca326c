use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::{Device, DEFAULT_TTS_PROGRAM};
use crate::error::{Result, VideoError};
use crate::video::audio::AudioClip;

/// Conditioning strength passed to the voice model.
pub const CFG_WEIGHT: f32 = 0.5;
pub const EXAGGERATION: f32 = 0.5;
/// Length of the silent clip written when synthesis fails.
pub const FALLBACK_SILENCE_MS: u64 = 1000;

/// Something that speaks `text` in the voice of a reference sample.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &Path, output: &Path) -> Result<()>;
}

/// Whether a sentence got real speech or the silent fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisOutcome {
    Spoken,
    Silent { reason: String },
}

/// Runs an external text-to-speech program once per request.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: PathBuf,
    device: Device,
    cfg_weight: f32,
    exaggeration: f32,
}

impl CommandSynthesizer {
    pub fn new(program: impl Into<PathBuf>, device: Device) -> Self {
        Self {
            program: program.into(),
            device,
            cfg_weight: CFG_WEIGHT,
            exaggeration: EXAGGERATION,
        }
    }

    pub fn args(&self, text: &str, voice: &Path, output: &Path) -> Vec<String> {
        vec![
            "--text".to_owned(),
            text.to_owned(),
            "--voice".to_owned(),
            voice.to_string_lossy().into_owned(),
            "--output".to_owned(),
            output.to_string_lossy().into_owned(),
            "--cfg-weight".to_owned(),
            self.cfg_weight.to_string(),
            "--exaggeration".to_owned(),
            self.exaggeration.to_string(),
            "--device".to_owned(),
            self.device.to_string(),
        ]
    }
}

impl Default for CommandSynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_TTS_PROGRAM, Device::Cpu)
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    async fn synthesize(&self, text: &str, voice: &Path, output: &Path) -> Result<()> {
        let mut command = Command::new(&self.program);
        command
            .args(self.args(text, voice, output))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let result = command.output().await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                VideoError::VoiceError(format!(
                    "voice program '{}' not found",
                    self.program.display()
                ))
            } else {
                VideoError::VoiceError(format!("failed to run voice program: {}", e))
            }
        })?;

        if !result.status.success() {
            return Err(VideoError::VoiceError(format!(
                "voice program failed with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        if !output.exists() {
            return Err(VideoError::VoiceError(format!(
                "voice program wrote no audio to {}",
                output.display()
            )));
        }
        Ok(())
    }
}

/// Synthesizes one sentence and checks the clip decodes, writing a silent
/// clip instead if either step fails.
pub async fn narrate_sentence(
    synth: &dyn SpeechSynthesizer,
    text: &str,
    voice: &Path,
    output: &Path,
    sample_rate: u32,
) -> Result<SynthesisOutcome> {
    let spoken = match synth.synthesize(text, voice, output).await {
        Ok(()) => AudioClip::read(output, sample_rate)
            .map(|_| ())
            .map_err(|e| VideoError::VoiceError(format!("unreadable voice clip: {}", e))),
        Err(e) => Err(e),
    };

    match spoken {
        Ok(()) => Ok(SynthesisOutcome::Spoken),
        Err(e) => {
            warn!("Error synthesizing voice: {}", e);
            AudioClip::silence(FALLBACK_SILENCE_MS, sample_rate).write(output)?;
            Ok(SynthesisOutcome::Silent {
                reason: e.to_string(),
            })
        }
    }
}

/// Speaks a whole script file into one WAV file.
pub async fn synthesize_script(
    synth: &dyn SpeechSynthesizer,
    script: &Path,
    voice: &Path,
    output: &Path,
) -> Result<()> {
    crate::error::require_file("Voice", voice)?;
    crate::error::require_file("Script", script)?;

    let text = tokio::fs::read_to_string(script).await?;
    let text = text.trim();
    info!("Synthesizing speech for: {:.50}...", text);

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    synth.synthesize(text, voice, output).await?;
    info!("Audio saved to: {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::audio::TRACK_SAMPLE_RATE;

    struct Broken;

    #[async_trait]
    impl SpeechSynthesizer for Broken {
        async fn synthesize(&self, _: &str, _: &Path, _: &Path) -> Result<()> {
            Err(VideoError::VoiceError("model crashed".into()))
        }
    }

    /// Reports success but leaves a file that is not a WAV.
    struct Garbage;

    #[async_trait]
    impl SpeechSynthesizer for Garbage {
        async fn synthesize(&self, _: &str, _: &Path, output: &Path) -> Result<()> {
            std::fs::write(output, b"not a wav")?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_synthesis_writes_one_second_of_silence() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("audio_0.wav");
        let outcome = narrate_sentence(&Broken, "Hello.", Path::new("voice.wav"), &out, TRACK_SAMPLE_RATE)
            .await
            .unwrap();

        assert!(matches!(outcome, SynthesisOutcome::Silent { ref reason } if reason.contains("model crashed")));
        let clip = AudioClip::read(&out, TRACK_SAMPLE_RATE).unwrap();
        assert_eq!(clip.duration_ms(), 1000.0);
        assert!(clip.samples.iter().all(|&s| s == 0));
    }

    #[tokio::test]
    async fn undecodable_clip_is_replaced_by_silence() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("audio_0.wav");
        let outcome = narrate_sentence(&Garbage, "Hello.", Path::new("voice.wav"), &out, TRACK_SAMPLE_RATE)
            .await
            .unwrap();

        assert!(matches!(outcome, SynthesisOutcome::Silent { ref reason } if reason.contains("unreadable voice clip")));
        let clip = AudioClip::read(&out, TRACK_SAMPLE_RATE).unwrap();
        assert_eq!(clip.duration_ms(), 1000.0);
    }

    #[tokio::test]
    async fn missing_program_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("a.wav");
        let synth = CommandSynthesizer::new("/nonexistent/tts", Device::Cpu);
        let outcome = narrate_sentence(&synth, "Hi.", Path::new("v.wav"), &out, TRACK_SAMPLE_RATE)
            .await
            .unwrap();
        assert!(matches!(outcome, SynthesisOutcome::Silent { .. }));
        assert!(out.exists());
    }

    #[test]
    fn passes_fixed_inference_parameters() {
        let synth = CommandSynthesizer::new("tts", Device::Cuda);
        let args = synth.args("Hi.", Path::new("v.wav"), Path::new("o.wav"));
        assert_eq!(
            args.join(" "),
            "--text Hi. --voice v.wav --output o.wav --cfg-weight 0.5 --exaggeration 0.5 --device cuda"
        );
    }

    #[tokio::test]
    async fn script_tool_requires_inputs() {
        let dir = tempfile::tempdir().unwrap();
        let err = synthesize_script(
            &Broken,
            &dir.path().join("missing.txt"),
            &dir.path().join("missing.wav"),
            &dir.path().join("out.wav"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, VideoError::InputNotFound { kind: "Voice", .. }));
    }
}

use std::path::Path;

use tracing::{info, warn};

use super::audio::TRACK_SAMPLE_RATE;
use super::encoder::VideoEncoder;
use super::muxer::{audio_path, finish_mux, MuxOutcome, Muxer};
use super::placeholder::PlaceholderRenderer;
use super::slides::{ImageId, ImageOrigin, ImageRegistry};
use super::timeline::{assemble, AudioUnit};
use crate::api::{ImageFetch, ImageSource};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::script::{split_sentences, Segment};
use crate::voice::{narrate_sentence, SpeechSynthesizer, SynthesisOutcome};

const DEFAULT_SLIDE_CAPTION: &str = "Default Slide";
const CAPTION_PROMPT_CHARS: usize = 30;

/// A remote generation that was replaced by a local asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fallback {
    Image { prompt: String, reason: String },
    Voice { sentence: String, reason: String },
}

/// Slides and audio units produced from a script, before assembly.
#[derive(Debug)]
pub struct Narration {
    pub slides: ImageRegistry,
    pub units: Vec<AudioUnit>,
    pub fallbacks: Vec<Fallback>,
    pending_gap: Option<ImageId>,
    sentences: usize,
}

impl Narration {
    fn new(slides: ImageRegistry) -> Self {
        Self {
            slides,
            units: Vec::new(),
            fallbacks: Vec::new(),
            pending_gap: None,
            sentences: 0,
        }
    }

    pub fn sentence_count(&self) -> usize {
        self.sentences
    }
}

/// Outcome of a full run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// `None` when the script had nothing to narrate.
    pub output: Option<MuxOutcome>,
    pub fallbacks: Vec<Fallback>,
    pub sentences: usize,
    pub slides: usize,
    pub frames: u64,
    pub audio_ms: f64,
}

pub struct VideoGenerator<'a> {
    config: PipelineConfig,
    images: &'a dyn ImageSource,
    voice: &'a dyn SpeechSynthesizer,
    encoder: &'a dyn VideoEncoder,
    muxer: &'a dyn Muxer,
    placeholder: PlaceholderRenderer,
}

impl<'a> VideoGenerator<'a> {
    pub fn new(
        config: PipelineConfig,
        images: &'a dyn ImageSource,
        voice: &'a dyn SpeechSynthesizer,
        encoder: &'a dyn VideoEncoder,
        muxer: &'a dyn Muxer,
    ) -> Self {
        Self {
            config,
            images,
            voice,
            encoder,
            muxer,
            placeholder: PlaceholderRenderer::discover(),
        }
    }

    pub fn with_placeholder(mut self, placeholder: PlaceholderRenderer) -> Self {
        self.placeholder = placeholder;
        self
    }

    /// Renders the slideshow for `segments` and merges it with the narration.
    pub async fn generate_video(&self, segments: &[Segment]) -> Result<RunReport> {
        info!("Starting video generation...");
        let assets = tempfile::Builder::new().prefix("elyria-").tempdir()?;

        let narration = self.narrate(segments, assets.path()).await?;
        let mut report = RunReport {
            output: None,
            fallbacks: narration.fallbacks.clone(),
            sentences: narration.sentence_count(),
            slides: narration.slides.len(),
            frames: 0,
            audio_ms: 0.0,
        };

        if narration.units.is_empty() {
            warn!("No audio segments to process");
            assets.close()?;
            return Ok(report);
        }

        let timeline = assemble(&narration.units, self.config.fps, TRACK_SAMPLE_RATE)?;
        report.frames = timeline.total_frames();
        report.audio_ms = timeline.audio_duration_ms();
        info!(
            "Timeline: {} frames ({:.0} ms) for {:.0} ms of audio",
            report.frames,
            timeline.video_duration_ms(),
            report.audio_ms
        );

        let video = self.config.output_path.clone();
        if let Some(parent) = video.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let audio = audio_path(&video);

        self.encoder.encode(&timeline, &narration.slides, &video)?;
        timeline.track.write(&audio)?;
        info!("Audio created: {}", audio.display());

        report.output = Some(finish_mux(self.muxer, &video, &audio));
        assets.close()?;
        Ok(report)
    }

    /// Resolves every image and synthesizes every sentence into `assets_dir`.
    pub async fn narrate(&self, segments: &[Segment], assets_dir: &Path) -> Result<Narration> {
        let mut narration = Narration::new(ImageRegistry::new(assets_dir, self.config.resolution));
        let mut active: Option<ImageId> = None;

        for (i, segment) in segments.iter().enumerate() {
            match segment {
                Segment::Image { prompt } => {
                    info!("Generating image {}: {:.50}...", i + 1, prompt);
                    active = Some(self.resolve_image(prompt, &mut narration).await?);
                }
                Segment::Text { content } => {
                    let image = match active {
                        Some(image) => image,
                        None => {
                            let img = self
                                .placeholder
                                .render(self.config.resolution, DEFAULT_SLIDE_CAPTION);
                            narration.slides.register(img, ImageOrigin::Default)?
                        }
                    };
                    active = Some(image);
                    self.narrate_text(content, image, assets_dir, &mut narration).await?;
                }
            }
        }

        Ok(narration)
    }

    async fn resolve_image(&self, prompt: &str, narration: &mut Narration) -> Result<ImageId> {
        let reason = match self.images.fetch(prompt, self.config.resolution).await {
            ImageFetch::Bytes(bytes) => {
                let origin = ImageOrigin::Generated {
                    prompt: prompt.to_string(),
                };
                match narration.slides.register_bytes(&bytes, origin) {
                    Ok(id) => return Ok(id),
                    Err(e) => format!("unusable image data: {}", e),
                }
            }
            ImageFetch::Failed(reason) => reason,
        };

        warn!("Using placeholder for '{:.50}': {}", prompt, reason);
        let truncated: String = prompt.chars().take(CAPTION_PROMPT_CHARS).collect();
        let img = self.placeholder.render(
            self.config.resolution,
            &format!("Failed to generate: {}...", truncated),
        );
        narration.fallbacks.push(Fallback::Image {
            prompt: prompt.to_string(),
            reason: reason.clone(),
        });
        narration.slides.register(
            img,
            ImageOrigin::Fallback {
                prompt: prompt.to_string(),
                reason,
            },
        )
    }

    async fn narrate_text(
        &self,
        content: &str,
        image: ImageId,
        assets_dir: &Path,
        narration: &mut Narration,
    ) -> Result<()> {
        for sentence in split_sentences(content) {
            if let Some(previous) = narration.pending_gap.take() {
                narration.units.push(AudioUnit::gap(previous));
            }

            let index = narration.sentences;
            info!("Synthesizing audio for sentence {}: {:.50}...", index + 1, sentence);
            let path = assets_dir.join(format!("audio_{}.wav", index));
            let outcome = narrate_sentence(
                self.voice,
                &sentence,
                &self.config.voice_path,
                &path,
                TRACK_SAMPLE_RATE,
            )
            .await?;
            if let SynthesisOutcome::Silent { reason } = outcome {
                narration.fallbacks.push(Fallback::Voice {
                    sentence: sentence.clone(),
                    reason,
                });
            }

            narration.units.push(AudioUnit::speech(path, sentence, image));
            narration.pending_gap = Some(image);
            narration.sentences += 1;
        }
        Ok(())
    }
}

use std::path::PathBuf;

use tracing::debug;

use super::audio::AudioClip;
use super::slides::ImageId;
use crate::error::Result;

/// Length of the pause between two sentences.
pub const GAP_MS: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    Speech { path: PathBuf, sentence: String },
    Gap,
}

/// One piece of narration and the slide shown while it plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioUnit {
    pub source: AudioSource,
    pub image: ImageId,
}

impl AudioUnit {
    pub fn speech(path: impl Into<PathBuf>, sentence: impl Into<String>, image: ImageId) -> Self {
        Self {
            source: AudioSource::Speech {
                path: path.into(),
                sentence: sentence.into(),
            },
            image,
        }
    }

    pub fn gap(image: ImageId) -> Self {
        Self {
            source: AudioSource::Gap,
            image,
        }
    }

    pub fn is_gap(&self) -> bool {
        matches!(self.source, AudioSource::Gap)
    }

    fn clip(&self, sample_rate: u32) -> Result<AudioClip> {
        match &self.source {
            AudioSource::Speech { path, .. } => AudioClip::read(path, sample_rate),
            AudioSource::Gap => Ok(AudioClip::silence(GAP_MS, sample_rate)),
        }
    }
}

/// Number of frames that covers `duration_ms` at `fps`, rounded to nearest.
pub fn frames_for(duration_ms: f64, fps: u32) -> u64 {
    (duration_ms * fps as f64 / 1000.0).round().max(0.0) as u64
}

pub fn frame_duration_ms(fps: u32) -> f64 {
    1000.0 / fps as f64
}

/// A slide held on screen for `count` consecutive frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRun {
    pub image: ImageId,
    pub count: u64,
    pub duration_ms: f64,
}

impl FrameRun {
    /// Rendered duration minus audio duration for this unit.
    pub fn drift_ms(&self, fps: u32) -> f64 {
        self.count as f64 * frame_duration_ms(fps) - self.duration_ms
    }
}

/// Frame runs plus the concatenated narration track.
#[derive(Debug, Clone)]
pub struct Timeline {
    pub fps: u32,
    pub runs: Vec<FrameRun>,
    pub track: AudioClip,
}

impl Timeline {
    pub fn total_frames(&self) -> u64 {
        self.runs.iter().map(|run| run.count).sum()
    }

    pub fn video_duration_ms(&self) -> f64 {
        self.total_frames() as f64 * frame_duration_ms(self.fps)
    }

    pub fn audio_duration_ms(&self) -> f64 {
        self.track.duration_ms()
    }

    /// Slide id for every frame, in order.
    pub fn frames(&self) -> impl Iterator<Item = ImageId> + '_ {
        self.runs
            .iter()
            .flat_map(|run| std::iter::repeat(run.image).take(run.count as usize))
    }
}

/// Concatenates unit audio in order and derives each unit's frame count from
/// its decoded length.
pub fn assemble(units: &[AudioUnit], fps: u32, sample_rate: u32) -> Result<Timeline> {
    let mut track = AudioClip {
        samples: Vec::new(),
        sample_rate,
    };
    let mut runs = Vec::with_capacity(units.len());

    for unit in units {
        let clip = unit.clip(sample_rate)?;
        let duration_ms = clip.duration_ms();
        let count = frames_for(duration_ms, fps);
        debug!(
            "Unit on slide {}: {:.1} ms -> {} frames",
            unit.image.0, duration_ms, count
        );
        runs.push(FrameRun {
            image: unit.image,
            count,
            duration_ms,
        });
        track.samples.extend_from_slice(&clip.samples);
    }

    Ok(Timeline { fps, runs, track })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::audio::TRACK_SAMPLE_RATE;

    #[test]
    fn rounds_to_nearest_frame() {
        assert_eq!(frames_for(1033.0, 30), 31);
        assert_eq!(frames_for(500.0, 30), 15);
        assert_eq!(frames_for(1000.0, 30), 30);
        // 1051 ms is 31.53 frames, flooring would give 31
        assert_eq!(frames_for(1049.0, 30), 31);
        assert_eq!(frames_for(1051.0, 30), 32);
        assert_eq!(frames_for(0.0, 30), 0);
    }

    #[test]
    fn per_unit_drift_is_under_one_frame() {
        let frame = frame_duration_ms(30);
        for ms in (0..5000).step_by(7) {
            let count = frames_for(ms as f64, 30);
            let drift = count as f64 * frame - ms as f64;
            assert!(drift.abs() < frame, "{} ms drifted {} ms", ms, drift);
        }
    }

    #[test]
    fn assembles_gaps_and_speech_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let speech = dir.path().join("speech.wav");
        AudioClip {
            samples: vec![100; 24_792],
            sample_rate: TRACK_SAMPLE_RATE,
        }
        .write(&speech)
        .unwrap();

        let units = vec![
            AudioUnit::speech(&speech, "Hello.", ImageId(0)),
            AudioUnit::gap(ImageId(0)),
            AudioUnit::speech(&speech, "Again.", ImageId(1)),
        ];
        let timeline = assemble(&units, 30, TRACK_SAMPLE_RATE).unwrap();

        // 24_792 samples at 24 kHz is 1033 ms
        let counts: Vec<u64> = timeline.runs.iter().map(|r| r.count).collect();
        assert_eq!(counts, vec![31, 15, 31]);
        assert_eq!(timeline.track.samples.len(), 24_792 * 2 + 12_000);
        assert_eq!(&timeline.track.samples[24_792..24_792 + 12_000], &[0; 12_000][..]);

        for run in &timeline.runs {
            assert!(run.drift_ms(30).abs() < frame_duration_ms(30));
        }
        let frames: Vec<ImageId> = timeline.frames().collect();
        assert_eq!(frames.len() as u64, timeline.total_frames());
        assert_eq!(frames[0], ImageId(0));
        assert_eq!(frames[frames.len() - 1], ImageId(1));
    }

    #[test]
    fn missing_clip_is_an_error() {
        let units = vec![AudioUnit::speech("/nonexistent/a.wav", "x.", ImageId(0))];
        assert!(assemble(&units, 30, TRACK_SAMPLE_RATE).is_err());
    }
}

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::Result;

/// Sample rate of the assembled narration track.
pub const TRACK_SAMPLE_RATE: u32 = 24_000;

/// Mono 16-bit PCM audio at a known sample rate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn silence(duration_ms: u64, sample_rate: u32) -> Self {
        let len = (duration_ms * sample_rate as u64 / 1000) as usize;
        Self {
            samples: vec![0; len],
            sample_rate,
        }
    }

    pub fn duration_ms(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Decodes a WAV file and converts it to mono at `sample_rate`.
    pub fn read(path: &Path, sample_rate: u32) -> Result<Self> {
        let mut reader = WavReader::open(path)?;
        let spec = reader.spec();

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>()?,
            SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<_, _>>()?
            }
        };

        let mono = downmix(&interleaved, spec.channels.max(1) as usize);
        let resampled = resample(&mono, spec.sample_rate, sample_rate);
        Ok(Self {
            samples: resampled.into_iter().map(to_i16).collect(),
            sample_rate,
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_wav(path, &self.samples, self.sample_rate)
    }
}

pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

// Linear interpolation; voice clips only need to line up in time.
fn resample(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || from == 0 || samples.is_empty() {
        return samples.to_vec();
    }
    let out_len = (samples.len() as f64 * to as f64 / from as f64).round() as usize;
    let step = from as f64 / to as f64;
    let last = samples.len() - 1;
    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos.floor() as usize).min(last);
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx];
            let b = samples[(idx + 1).min(last)];
            a + (b - a) * frac
        })
        .collect()
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_has_requested_length() {
        let clip = AudioClip::silence(500, TRACK_SAMPLE_RATE);
        assert_eq!(clip.samples.len(), 12_000);
        assert_eq!(clip.duration_ms(), 500.0);
    }

    #[test]
    fn reads_stereo_float_and_resamples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 48_000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..48_000 {
            writer.write_sample(0.5f32).unwrap();
            writer.write_sample(0.5f32).unwrap();
        }
        writer.finalize().unwrap();

        let clip = AudioClip::read(&path, TRACK_SAMPLE_RATE).unwrap();
        assert_eq!(clip.samples.len(), 24_000);
        assert!((clip.duration_ms() - 1000.0).abs() < 1.0);
        assert!(clip.samples.iter().all(|&s| (s - i16::MAX / 2).abs() <= 1));
    }

    #[test]
    fn write_then_read_keeps_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.wav");
        let clip = AudioClip {
            samples: (0..2_400).map(|i| (i % 100) as i16).collect(),
            sample_rate: TRACK_SAMPLE_RATE,
        };
        clip.write(&path).unwrap();
        let back = AudioClip::read(&path, TRACK_SAMPLE_RATE).unwrap();
        assert_eq!(back, clip);
    }
}

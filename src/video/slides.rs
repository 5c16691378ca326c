use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::RgbImage;
use tracing::info;

use crate::config::Resolution;
use crate::error::Result;

/// Index of a slide in an [`ImageRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOrigin {
    Generated { prompt: String },
    Fallback { prompt: String, reason: String },
    Default,
}

#[derive(Debug, Clone)]
pub struct Slide {
    pub path: PathBuf,
    pub origin: ImageOrigin,
}

/// Slides of one run, stored as PNG files in the run's asset directory.
#[derive(Debug)]
pub struct ImageRegistry {
    dir: PathBuf,
    resolution: Resolution,
    slides: Vec<Slide>,
}

impl ImageRegistry {
    pub fn new(dir: impl Into<PathBuf>, resolution: Resolution) -> Self {
        Self {
            dir: dir.into(),
            resolution,
            slides: Vec::new(),
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn get(&self, id: ImageId) -> Option<&Slide> {
        self.slides.get(id.0)
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    /// Resizes `img` to the target resolution if needed and stores it.
    pub fn register(&mut self, img: RgbImage, origin: ImageOrigin) -> Result<ImageId> {
        let id = ImageId(self.slides.len());
        let img = fit(img, self.resolution);
        let path = self.dir.join(format!("img_{}.png", id.0));
        img.save(&path)?;
        info!("Registered slide {} at {}", id.0, path.display());
        self.slides.push(Slide { path, origin });
        Ok(id)
    }

    /// Decodes encoded image bytes and registers them.
    pub fn register_bytes(&mut self, bytes: &[u8], origin: ImageOrigin) -> Result<ImageId> {
        let img = image::load_from_memory(bytes)?.to_rgb8();
        self.register(img, origin)
    }

    /// Loads a slide back as raw RGB pixels.
    pub fn load_rgb(&self, id: ImageId) -> Result<RgbImage> {
        let slide = self.get(id).ok_or_else(|| {
            crate::error::VideoError::VideoGenerationError(format!("unknown slide {}", id.0))
        })?;
        load_rgb(&slide.path, self.resolution)
    }
}

pub fn load_rgb(path: &Path, resolution: Resolution) -> Result<RgbImage> {
    let img = image::open(path)?.to_rgb8();
    Ok(fit(img, resolution))
}

fn fit(img: RgbImage, resolution: Resolution) -> RgbImage {
    if img.dimensions() == (resolution.width, resolution.height) {
        img
    } else {
        image::imageops::resize(&img, resolution.width, resolution.height, FilterType::Lanczos3)
    }
}

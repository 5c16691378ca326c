use std::path::{Path, PathBuf};

use fontdue::{Font, FontSettings};
use image::{Rgb, RgbImage};
use tracing::{debug, warn};

use crate::config::Resolution;
use crate::error::{Result, VideoError};

pub const BACKGROUND: Rgb<u8> = Rgb([73, 109, 137]);
pub const CAPTION_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const CAPTION_PX: f32 = 36.0;
pub const FONT_ENV: &str = "ELYRIA_FONT";

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Draws solid slides with a centered caption.
///
/// Without a usable font the slide is drawn without its caption.
pub struct PlaceholderRenderer {
    font: Option<Font>,
    px: f32,
}

impl PlaceholderRenderer {
    pub fn new(font: Option<Font>) -> Self {
        Self {
            font,
            px: CAPTION_PX,
        }
    }

    /// Uses `$ELYRIA_FONT` or the first common system font that loads.
    pub fn discover() -> Self {
        let env_font = std::env::var_os(FONT_ENV).map(PathBuf::from);
        let font = env_font
            .iter()
            .map(PathBuf::as_path)
            .chain(FONT_CANDIDATES.iter().map(Path::new))
            .filter(|path| path.exists())
            .find_map(|path| match load_font(path) {
                Ok(font) => {
                    debug!("Using caption font {}", path.display());
                    Some(font)
                }
                Err(e) => {
                    warn!("Skipping caption font {}: {}", path.display(), e);
                    None
                }
            });
        if font.is_none() {
            warn!("No caption font found, placeholder slides will have no text");
        }
        Self::new(font)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn render(&self, resolution: Resolution, caption: &str) -> RgbImage {
        let mut img = RgbImage::from_pixel(resolution.width, resolution.height, BACKGROUND);
        if let Some(font) = &self.font {
            draw_centered(&mut img, font, self.px, caption);
        }
        img
    }
}

pub fn load_font(path: &Path) -> Result<Font> {
    let bytes = std::fs::read(path)?;
    Font::from_bytes(bytes, FontSettings::default())
        .map_err(|e| VideoError::VideoGenerationError(format!("invalid font {}: {}", path.display(), e)))
}

fn draw_centered(img: &mut RgbImage, font: &Font, px: f32, text: &str) {
    let glyphs: Vec<_> = text.chars().map(|ch| font.rasterize(ch, px)).collect();
    let text_width: f32 = glyphs.iter().map(|(metrics, _)| metrics.advance_width).sum();
    let (ascent, descent) = font
        .horizontal_line_metrics(px)
        .map(|line| (line.ascent, line.descent))
        .unwrap_or((px, 0.0));
    let text_height = ascent - descent;

    let (width, height) = (img.width() as i32, img.height() as i32);
    let mut pen_x = (width as f32 - text_width) / 2.0;
    let baseline = ((height as f32 - text_height) / 2.0 + ascent).round() as i32;

    for (metrics, bitmap) in &glyphs {
        let x0 = pen_x.round() as i32 + metrics.xmin;
        let y0 = baseline - (metrics.height as i32 + metrics.ymin);
        for gy in 0..metrics.height {
            for gx in 0..metrics.width {
                let coverage = bitmap[gy * metrics.width + gx];
                if coverage == 0 {
                    continue;
                }
                let (px_x, px_y) = (x0 + gx as i32, y0 + gy as i32);
                if px_x < 0 || px_y < 0 || px_x >= width || px_y >= height {
                    continue;
                }
                let pixel = img.get_pixel_mut(px_x as u32, px_y as u32);
                *pixel = blend(*pixel, CAPTION_COLOR, coverage);
            }
        }
        pen_x += metrics.advance_width;
    }
}

fn blend(under: Rgb<u8>, over: Rgb<u8>, coverage: u8) -> Rgb<u8> {
    let a = coverage as u16;
    let mix = |u: u8, o: u8| ((u as u16 * (255 - a) + o as u16 * a) / 255) as u8;
    Rgb([
        mix(under[0], over[0]),
        mix(under[1], over[1]),
        mix(under[2], over[2]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fontless_slide_is_solid_background() {
        let renderer = PlaceholderRenderer::new(None);
        let img = renderer.render(Resolution::new(64, 36), "Default Slide");
        assert_eq!(img.dimensions(), (64, 36));
        assert!(img.pixels().all(|p| *p == BACKGROUND));
    }

    #[test]
    fn discovered_renderer_keeps_resolution() {
        let renderer = PlaceholderRenderer::discover();
        let img = renderer.render(Resolution::new(320, 180), "Failed to generate: A castle in the mist...");
        assert_eq!(img.dimensions(), (320, 180));
        if renderer.has_font() {
            assert!(img.pixels().any(|p| *p != BACKGROUND));
        }
    }

    #[test]
    fn blend_extremes() {
        assert_eq!(blend(BACKGROUND, CAPTION_COLOR, 0), BACKGROUND);
        assert_eq!(blend(BACKGROUND, CAPTION_COLOR, 255), CAPTION_COLOR);
    }
}

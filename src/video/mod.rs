pub mod audio;
pub mod encoder;
mod generator;
pub mod muxer;
pub mod placeholder;
pub mod slides;
pub mod timeline;

pub use generator::{Fallback, Narration, RunReport, VideoGenerator};

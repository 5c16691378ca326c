pub mod api;
pub mod config;
pub mod error;
pub mod monitor;
pub mod prompt;
pub mod script;
pub mod video;
pub mod voice;

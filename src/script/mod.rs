mod sentence;

pub use sentence::split_sentences;

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{require_file, Result};

/// One parsed unit of a script, in file order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Segment {
    Text { content: String },
    Image { prompt: String },
}

impl Segment {
    pub fn text(content: impl Into<String>) -> Self {
        Segment::Text {
            content: content.into(),
        }
    }

    pub fn image(prompt: impl Into<String>) -> Self {
        Segment::Image {
            prompt: prompt.into(),
        }
    }
}

// Shortest match: a prompt ends at its first `]`, there is no escaping.
fn directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[IMG:\s*(.*?)\]").expect("directive pattern is valid"))
}

/// Splits a script into narration and image segments.
///
/// Text between directives becomes a `Text` segment when it is non-empty after
/// trimming; directive prompts are trimmed and kept when non-empty.
pub fn parse_script(content: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for caps in directive_regex().captures_iter(content) {
        let (Some(whole), Some(prompt)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_text(&mut segments, &content[cursor..whole.start()]);
        let prompt = prompt.as_str().trim();
        if !prompt.is_empty() {
            segments.push(Segment::image(prompt));
        }
        cursor = whole.end();
    }
    push_text(&mut segments, &content[cursor..]);

    segments
}

fn push_text(segments: &mut Vec<Segment>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        segments.push(Segment::text(text));
    }
}

/// Reads and parses a script file.
pub async fn load_script(path: &Path) -> Result<Vec<Segment>> {
    require_file("Script", path)?;
    let content = tokio::fs::read_to_string(path).await?;
    Ok(parse_script(&content))
}

/// Writes segments back out as script text, one segment per line.
pub fn render_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Text { content } => content.clone(),
            Segment::Image { prompt } => format!("[IMG: {}]", prompt),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

use tracing::info;

use super::generate_prompt;

/// Output of [`insert_infoboxes`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoboxResult {
    pub script: String,
    pub prompts: Vec<String>,
}

fn is_candidate(line: &str) -> bool {
    line.chars().count() > 10 && line.contains(['.', '!', '?'])
}

/// Inserts an `[IMG: ...]` line before sentence lines of a script.
///
/// A line that already carries a directive suppresses insertion before the
/// next candidate line only. The first line never gets a directive.
pub fn insert_infoboxes(script: &str) -> InfoboxResult {
    let lines: Vec<&str> = script.split_inclusive('\n').collect();
    let mut result = InfoboxResult::default();
    let mut prev_has_image = false;

    for (i, line) in lines.iter().enumerate() {
        let stripped = line.trim();
        let has_directive = stripped.contains("[IMG:");

        if stripped.is_empty() || has_directive {
            result.script.push_str(line);
            if has_directive {
                prev_has_image = true;
            }
            continue;
        }

        if is_candidate(stripped) {
            if !prev_has_image && i > 0 {
                let context = lines[i - 1].trim();
                let prompt = generate_prompt(stripped, context);
                info!("Added image prompt: {:.50}...", prompt);
                result.script.push_str(&format!("[IMG: {}]\n", prompt));
                result.prompts.push(prompt);
            }
            prev_has_image = false;
        }

        result.script.push_str(line);
    }

    result
}

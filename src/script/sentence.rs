/// Splits narration into sentences on literal periods.
///
/// Each piece is trimmed, empty pieces are dropped, and a period is put back on
/// the end. Abbreviations and decimal numbers are split too.
pub fn split_sentences(text: &str) -> Vec<String> {
    text.split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("{}.", s))
        .collect()
}

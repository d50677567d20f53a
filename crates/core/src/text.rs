//! Text preview helpers.

/// Preview length used for prompts, outputs, and outline steps.
pub const PREVIEW_LEN: usize = 200;

/// First `max` characters of `s`, respecting char boundaries.
pub fn preview(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// Whether [`preview`] would drop anything.
pub fn exceeds(s: &str, max: usize) -> bool {
    s.chars().count() > max
}

#[cfg(test)]
#[path = "text_tests.rs"]
mod tests;

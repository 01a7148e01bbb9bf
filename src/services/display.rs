//! Human-readable rendering of a single text segment.

pub const DEFAULT_MAX_DISPLAY_LENGTH: usize = 1000;

const EMPTY_SEGMENT: &str = "[empty segment]";
const TRUNCATED_MARKER: &str = "\n\n[content truncated...]";

pub fn format_segment(segment: &str, show_stats: bool, max_display_length: usize) -> String {
    if segment.trim().is_empty() {
        return EMPTY_SEGMENT.to_string();
    }

    let mut output = Vec::new();
    let char_count = segment.chars().count();

    if show_stats {
        output.push("Segment statistics:".to_string());
        output.push(format!("Characters: {}", char_count));
        output.push(format!("Lines: {}", segment.lines().count()));
        output.push(format!("Estimated words: {}", segment.split_whitespace().count()));
        output.push("=".repeat(50));
    }

    if char_count > max_display_length {
        let head: String = segment.chars().take(max_display_length).collect();
        output.push(format!("{}{}", head, TRUNCATED_MARKER));
    } else {
        output.push(segment.to_string());
    }

    output.join("\n")
}

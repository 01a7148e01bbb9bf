use crate::error::{Result, VolcanoError};
use crate::types::{SplitConfig, SplitMethod, SplitResult};
use regex::Regex;
use tracing::{debug, info, warn};

const PREVIEW_CHARS: usize = 100;
const EMPTY_INPUT_MESSAGE: &str = "input text is empty";

pub struct TextSplitter {
    paragraph_pattern: Regex,
    sentence_pattern: Regex,
}

impl TextSplitter {
    pub fn new() -> Result<Self> {
        let paragraph_pattern = Regex::new(r"\n\s*\n").map_err(|e| VolcanoError::SplitFailed {
            reason: format!("Invalid paragraph pattern: {}", e),
        })?;
        let sentence_pattern =
            Regex::new(r"[。！？.!?]+").map_err(|e| VolcanoError::SplitFailed {
                reason: format!("Invalid sentence pattern: {}", e),
            })?;

        Ok(Self {
            paragraph_pattern,
            sentence_pattern,
        })
    }

    /// Splits `text` and never fails: errors come back as a zero-segment
    /// result whose preview describes the problem.
    pub fn split_text(&self, text: &str, config: &SplitConfig) -> SplitResult {
        let text = text.trim();
        if text.is_empty() {
            return SplitResult::diagnostic(EMPTY_INPUT_MESSAGE);
        }

        match self.try_split(text, config) {
            Ok(segments) => {
                let preview = Self::generate_preview(&segments);
                info!(
                    "Split {} characters into {} segments using {:?}",
                    text.chars().count(),
                    segments.len(),
                    config.method
                );
                SplitResult::new(segments, preview)
            }
            Err(e) => {
                warn!("Text split failed: {}", e);
                SplitResult::diagnostic(e.to_string())
            }
        }
    }

    fn try_split(&self, text: &str, config: &SplitConfig) -> Result<Vec<String>> {
        config.validate()?;

        let mut segments = self.perform_split(text, config)?;
        debug!("Raw split produced {} segments", segments.len());

        if config.remove_empty {
            segments = segments
                .into_iter()
                .map(|seg| seg.trim().to_string())
                .filter(|seg| !seg.is_empty())
                .collect();
        }

        segments.truncate(config.max_segments);
        Ok(segments)
    }

    fn perform_split(&self, text: &str, config: &SplitConfig) -> Result<Vec<String>> {
        let segments = match config.method {
            SplitMethod::Paragraph => self.split_by_pattern(&self.paragraph_pattern, text),
            SplitMethod::Sentence => self.split_by_pattern(&self.sentence_pattern, text),
            SplitMethod::CustomSeparator => {
                if config.separator.is_empty() {
                    return Err(VolcanoError::SplitFailed {
                        reason: "empty separator".to_string(),
                    });
                }
                text.split(config.separator.as_str())
                    .map(str::to_string)
                    .collect()
            }
            SplitMethod::FixedLength => Self::split_fixed(text, config.chars_per_segment)?,
        };

        Ok(segments)
    }

    fn split_by_pattern(&self, pattern: &Regex, text: &str) -> Vec<String> {
        pattern.split(text).map(str::to_string).collect()
    }

    fn split_fixed(text: &str, chars_per_segment: usize) -> Result<Vec<String>> {
        if chars_per_segment == 0 {
            return Err(VolcanoError::SplitFailed {
                reason: "chars_per_segment must be at least 1".to_string(),
            });
        }

        let chars: Vec<char> = text.chars().collect();
        Ok(chars
            .chunks(chars_per_segment)
            .map(|window| window.iter().collect())
            .collect())
    }

    pub fn generate_preview(segments: &[String]) -> String {
        let mut lines = Vec::with_capacity(segments.len() * 4 + 3);
        lines.push("=== Text split preview ===".to_string());
        lines.push(format!("Total segments: {}", segments.len()));
        lines.push(String::new());

        for (idx, segment) in segments.iter().enumerate() {
            let char_count = segment.chars().count();
            lines.push(format!("[Segment {}]", idx + 1));
            if char_count > PREVIEW_CHARS {
                let head: String = segment.chars().take(PREVIEW_CHARS).collect();
                lines.push(format!("{}...", head));
            } else {
                lines.push(segment.clone());
            }
            lines.push(format!("Characters: {}", char_count));
            lines.push("-".repeat(40));
        }

        lines.join("\n")
    }
}

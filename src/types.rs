use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Result, VolcanoError};

/// Number of individually addressable segment outputs the node host exposes.
pub const MAX_OUTPUT_SLOTS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum SplitMethod {
    #[default]
    Paragraph,
    Sentence,
    CustomSeparator,
    FixedLength,
}

impl SplitMethod {
    /// Unrecognized names fall back to paragraph splitting.
    pub fn parse_lenient(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "paragraph" | "按段落分割" => SplitMethod::Paragraph,
            "sentence" | "按句子分割" => SplitMethod::Sentence,
            "custom" | "custom_separator" | "custom-separator" | "按自定义分隔符分割" => {
                SplitMethod::CustomSeparator
            }
            "fixed" | "fixed_length" | "fixed-length" | "按字符数分割" => {
                SplitMethod::FixedLength
            }
            _ => SplitMethod::Paragraph,
        }
    }
}

impl From<String> for SplitMethod {
    fn from(name: String) -> Self {
        Self::parse_lenient(&name)
    }
}

impl FromStr for SplitMethod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse_lenient(s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    pub method: SplitMethod,
    pub max_segments: usize,
    /// Only used by [`SplitMethod::CustomSeparator`].
    pub separator: String,
    /// Only used by [`SplitMethod::FixedLength`], counted in characters.
    pub chars_per_segment: usize,
    pub remove_empty: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            method: SplitMethod::Paragraph,
            max_segments: 8,
            separator: "\n\n".to_string(),
            chars_per_segment: 500,
            remove_empty: true,
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_segments < 2 {
            return Err(VolcanoError::SplitFailed {
                reason: format!("max_segments must be at least 2, got {}", self.max_segments),
            });
        }

        if self.method == SplitMethod::FixedLength && self.chars_per_segment == 0 {
            return Err(VolcanoError::SplitFailed {
                reason: "chars_per_segment must be at least 1".to_string(),
            });
        }

        if self.method == SplitMethod::CustomSeparator && self.separator.is_empty() {
            return Err(VolcanoError::SplitFailed {
                reason: "empty separator".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitResult {
    pub segments: Vec<String>,
    pub segment_count: usize,
    pub preview: String,
}

impl SplitResult {
    pub fn new(segments: Vec<String>, preview: String) -> Self {
        Self {
            segment_count: segments.len(),
            segments,
            preview,
        }
    }

    /// Zero segments, with the diagnostic carried in the preview.
    pub fn diagnostic(message: impl Into<String>) -> Self {
        Self::new(Vec::new(), message.into())
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segments laid out over a fixed number of output slots, padding unused
    /// slots with empty strings.
    pub fn outputs(&self, slots: usize) -> Vec<&str> {
        (0..slots)
            .map(|idx| self.segments.get(idx).map(String::as_str).unwrap_or(""))
            .collect()
    }
}

/// Raw or ready-to-send image input.
#[derive(Debug, Clone)]
pub enum ImageRef {
    /// An `http(s)` URL, a `data:` URI or a local file path.
    Reference(String),
    Bitmap(image::DynamicImage),
    /// Pixel values in either `0..=1` or `0..=255`, optionally batched and
    /// optionally channel-first.
    Pixels(ndarray::ArrayD<f32>),
}

impl From<PathBuf> for ImageRef {
    fn from(path: PathBuf) -> Self {
        ImageRef::Reference(path.to_string_lossy().into_owned())
    }
}

#[derive(Debug, Clone)]
pub enum ContentItem {
    Text(String),
    Image(ImageRef),
    Video(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: MediaUrl },
    VideoUrl { video_url: MediaUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(parts),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiMode {
    /// OpenAI-compatible chat completions.
    OpenApi,
    /// Vendor REST endpoint.
    Rest,
}

impl ApiMode {
    pub fn default_base_url(&self, region: &str) -> String {
        match self {
            ApiMode::OpenApi => format!("https://ark.{}.volcengine.com/v1/", region),
            ApiMode::Rest => format!("https://ark.{}.volces.com/api/v3/", region),
        }
    }
}

pub const DEFAULT_REGION: &str = "cn-beijing";

#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    pub mode: ApiMode,
    pub endpoint_id: Option<String>,
    pub api_key: String,
    pub base_url: String,
}

impl ChatClientConfig {
    pub fn new(mode: ApiMode, api_key: impl Into<String>) -> Self {
        Self {
            mode,
            endpoint_id: None,
            api_key: api_key.into(),
            base_url: mode.default_base_url(DEFAULT_REGION),
        }
    }

    pub fn with_endpoint_id(mut self, endpoint_id: impl Into<String>) -> Self {
        let endpoint_id = endpoint_id.into();
        self.endpoint_id = if endpoint_id.trim().is_empty() {
            None
        } else {
            Some(endpoint_id)
        };
        self
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.base_url = self.mode.default_base_url(region);
        self
    }

    /// Overrides the region-derived base URL. Blank values are ignored.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        if !base_url.trim().is_empty() {
            self.base_url = base_url.trim().to_string();
        }
        if !self.base_url.ends_with('/') {
            self.base_url.push('/');
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub stop: Option<Vec<String>>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
            top_p: 0.9,
            stop: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, deserialize_with = "null_as_zero")]
    pub prompt_tokens: u64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub completion_tokens: u64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub total_tokens: u64,
}

fn null_as_zero<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<u64>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub finish_reason: String,
    pub usage: Usage,
}

impl ResponseInfo {
    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| VolcanoError::ProcessingFailed {
            message: format!("Failed to serialize response info: {}", e),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    pub text: String,
    pub info: ResponseInfo,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamChunk {
    pub delta: String,
    pub finish_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_method_fallback() {
        assert_eq!(SplitMethod::parse_lenient("sentence"), SplitMethod::Sentence);
        assert_eq!(SplitMethod::parse_lenient("按字符数分割"), SplitMethod::FixedLength);
        assert_eq!(SplitMethod::parse_lenient("by-magic"), SplitMethod::Paragraph);
        assert_eq!("".parse::<SplitMethod>().unwrap(), SplitMethod::Paragraph);
    }

    #[test]
    fn test_split_config_deserializes_leniently() {
        let config: SplitConfig = serde_json::from_value(serde_json::json!({
            "method": "by-magic",
            "max_segments": 4,
            "separator": "|",
            "chars_per_segment": 10,
            "remove_empty": false
        }))
        .unwrap();
        assert_eq!(config.method, SplitMethod::Paragraph);

        let method: SplitMethod = serde_json::from_str("\"按句子分割\"").unwrap();
        assert_eq!(method, SplitMethod::Sentence);

        let json = serde_json::to_string(&SplitMethod::FixedLength).unwrap();
        assert_eq!(json, "\"fixed_length\"");
        assert_eq!(
            serde_json::from_str::<SplitMethod>(&json).unwrap(),
            SplitMethod::FixedLength
        );
    }

    #[test]
    fn test_usage_null_counts_are_zero() {
        let usage: Usage = serde_json::from_str(
            r#"{"prompt_tokens": 3, "completion_tokens": null, "total_tokens": null}"#,
        )
        .unwrap();
        assert_eq!(usage.prompt_tokens, 3);
        assert_eq!(usage.completion_tokens, 0);
        assert_eq!(usage.total_tokens, 0);

        let usage: Usage = serde_json::from_str("{}").unwrap();
        assert_eq!(usage, Usage::default());
    }

    #[test]
    fn test_split_config_validation() {
        assert!(SplitConfig::default().validate().is_ok());

        let config = SplitConfig {
            max_segments: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SplitConfig {
            method: SplitMethod::CustomSeparator,
            separator: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_outputs_pad_to_slot_count() {
        let result = SplitResult::new(vec!["a".into(), "b".into()], String::new());
        let outputs = result.outputs(4);
        assert_eq!(outputs, vec!["a", "b", "", ""]);
        assert_eq!(result.outputs(1), vec!["a"]);
    }

    #[test]
    fn test_base_url_resolution() {
        let config = ChatClientConfig::new(ApiMode::OpenApi, "key").with_region("cn-shanghai");
        assert_eq!(config.base_url, "https://ark.cn-shanghai.volcengine.com/v1/");

        let config = ChatClientConfig::new(ApiMode::Rest, "key")
            .with_base_url("http://localhost:8080/api");
        assert_eq!(config.base_url, "http://localhost:8080/api/");

        let config = ChatClientConfig::new(ApiMode::Rest, "key").with_base_url("  ");
        assert_eq!(config.base_url, "https://ark.cn-beijing.volces.com/api/v3/");
    }

    #[test]
    fn test_user_parts_wire_shape() {
        let message = ChatMessage::user_parts(vec![ContentPart::Text { text: "hi".into() }]);
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"role": "user", "content": [{"type": "text", "text": "hi"}]})
        );
    }
}

use crate::error::{Result, VolcanoError};
use crate::services::assembler::MessageAssembler;
use crate::types::{
    ApiMode, ChatClientConfig, ChatMessage, ContentItem, Generation, GenerationParams,
    ResponseInfo, StreamChunk, Usage,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Default, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct ChunkError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

impl ChunkError {
    fn into_message(self) -> String {
        let message = self
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| "stream reported an error".to_string());
        match self.code {
            Some(serde_json::Value::String(code)) => format!("{} ({})", message, code),
            Some(serde_json::Value::Number(code)) => format!("{} ({})", message, code),
            _ => message,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ResponseMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

/// One parsed server-sent event line.
#[derive(Debug, PartialEq)]
pub enum SseEvent {
    Chunk(StreamChunk),
    Done,
}

pub struct ChatClient {
    config: ChatClientConfig,
    base_url: Url,
    http: reqwest::Client,
}

impl ChatClient {
    pub fn new(config: ChatClientConfig) -> Result<Self> {
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }

        let base_url = Url::parse(&base)?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(VolcanoError::invalid_configuration(format!(
                "unsupported base URL scheme: {}",
                base_url.scheme()
            )));
        }

        let http = reqwest::Client::builder().build()?;

        info!(
            "Initialized chat client: mode={:?}, endpoint_id={}, base_url={}",
            config.mode,
            config.endpoint_id.as_deref().unwrap_or("-"),
            base_url
        );

        Ok(Self {
            config,
            base_url,
            http,
        })
    }

    pub fn config(&self) -> &ChatClientConfig {
        &self.config
    }

    pub fn completions_url(&self) -> Result<Url> {
        Ok(self.base_url.join("chat/completions")?)
    }

    pub fn models_url(&self) -> Result<Url> {
        Ok(self.base_url.join("models")?)
    }

    /// Picks the model for a request. OpenAPI mode falls back to the
    /// configured endpoint id; REST mode needs the model spelled out.
    pub fn resolve_model(&self, model: Option<&str>) -> Result<String> {
        let explicit = model.map(str::trim).filter(|m| !m.is_empty());

        let resolved = match self.config.mode {
            ApiMode::OpenApi => explicit.or_else(|| {
                self.config
                    .endpoint_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
            }),
            ApiMode::Rest => explicit,
        };

        resolved.map(str::to_string).ok_or_else(|| match self.config.mode {
            ApiMode::OpenApi => VolcanoError::invalid_configuration(
                "OpenAPI mode requires an endpoint id or a model override",
            ),
            ApiMode::Rest => {
                VolcanoError::invalid_configuration("REST API mode requires an explicit model")
            }
        })
    }

    pub async fn generate(
        &self,
        prompt: &str,
        system_prompt: &str,
        params: &GenerationParams,
        model: Option<&str>,
    ) -> Result<Generation> {
        let messages = MessageAssembler::build_text_messages(prompt, system_prompt);
        self.chat(&messages, params, model).await
    }

    pub async fn generate_multimodal(
        &self,
        items: &[ContentItem],
        system_prompt: &str,
        params: &GenerationParams,
        model: Option<&str>,
    ) -> Result<Generation> {
        let messages = MessageAssembler::build_messages(items, system_prompt)?;
        self.chat(&messages, params, model).await
    }

    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
        model: Option<&str>,
    ) -> Result<Generation> {
        let model = self.resolve_model(model)?;
        let response = self.send(&model, messages, params, false).await?;

        let body: ChatCompletionResponse =
            response
                .json()
                .await
                .map_err(|e| VolcanoError::ProcessingFailed {
                    message: format!("Failed to decode chat completion: {}", e),
                })?;

        let generation = self.build_generation(body)?;
        debug!(
            "Received {} characters, finish_reason={}",
            generation.text.chars().count(),
            generation.info.finish_reason
        );
        Ok(generation)
    }

    /// Streams the completion as it is generated. The caller drives the
    /// stream to completion; chunks are yielded as they arrive.
    pub async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
        model: Option<&str>,
    ) -> Result<impl Stream<Item = Result<StreamChunk>>> {
        let model = self.resolve_model(model)?;
        let response = self.send(&model, messages, params, true).await?;
        Ok(sse_chunks(Box::pin(response.bytes_stream())))
    }

    pub async fn test_connection(&self) -> Result<()> {
        let url = self.models_url()?;
        info!("Testing connection to {}", url);

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;
        Self::check_status(response).await?;

        info!("Connection test succeeded");
        Ok(())
    }

    async fn send(
        &self,
        model: &str,
        messages: &[ChatMessage],
        params: &GenerationParams,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let url = self.completions_url()?;
        let request = ChatCompletionRequest {
            model,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            stop: params.stop.as_deref(),
            stream,
        };

        info!(
            "Sending chat request: mode={:?}, model={}, messages={}, stream={}",
            self.config.mode,
            model,
            messages.len(),
            stream
        );

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        Self::check_status(response).await
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Request returned HTTP {}: {}", status.as_u16(), body);
        Err(VolcanoError::from_status(status, &body))
    }

    fn build_generation(&self, body: ChatCompletionResponse) -> Result<Generation> {
        let usage = body.usage.unwrap_or_default();

        let choice = match body.choices.into_iter().next() {
            Some(choice) => choice,
            None if self.config.mode == ApiMode::Rest => Choice::default(),
            None => {
                return Err(VolcanoError::ProcessingFailed {
                    message: "response contained no choices".to_string(),
                })
            }
        };

        Ok(Generation {
            text: choice.message.and_then(|m| m.content).unwrap_or_default(),
            info: ResponseInfo {
                finish_reason: choice.finish_reason.unwrap_or_default(),
                usage,
            },
        })
    }
}

/// Parses one line of an event stream. Comments, blank lines and chunks
/// without choices yield `None`; an error event yields `Err`.
pub fn parse_sse_line(line: &str) -> Option<Result<SseEvent>> {
    let data = line.trim().strip_prefix("data:")?.trim();
    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(Ok(SseEvent::Done));
    }

    let chunk: ChatCompletionChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            return Some(Err(VolcanoError::ProcessingFailed {
                message: format!("Malformed stream chunk: {}", e),
            }))
        }
    };

    if let Some(error) = chunk.error {
        let message = error.into_message();
        warn!("Stream reported an error: {}", message);
        return Some(Err(VolcanoError::ProcessingFailed { message }));
    }

    let choice = chunk.choices.into_iter().next()?;
    Some(Ok(SseEvent::Chunk(StreamChunk {
        delta: choice.delta.and_then(|d| d.content).unwrap_or_default(),
        finish_reason: choice.finish_reason,
    })))
}

struct SseState<S> {
    inner: S,
    buffer: Vec<u8>,
    finished: bool,
}

impl<S> SseState<S> {
    fn next_line(&mut self) -> Option<String> {
        let end = self.buffer.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Turns a raw byte stream into completion chunks. Lines are only decoded
/// once complete, so multi-byte characters split across reads survive.
pub fn sse_chunks<S, B>(inner: S) -> impl Stream<Item = Result<StreamChunk>>
where
    S: Stream<Item = reqwest::Result<B>> + Unpin,
    B: AsRef<[u8]>,
{
    let state = SseState {
        inner,
        buffer: Vec::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.next_line() {
                match parse_sse_line(&line) {
                    Some(Ok(SseEvent::Chunk(chunk))) => return Some((Ok(chunk), state)),
                    Some(Ok(SseEvent::Done)) => return None,
                    Some(Err(e)) => return Some((Err(e), state)),
                    None => continue,
                }
            }

            if state.finished {
                return None;
            }

            match state.inner.next().await {
                Some(Ok(bytes)) => state.buffer.extend_from_slice(bytes.as_ref()),
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(VolcanoError::from(e)), state));
                }
                None => {
                    state.finished = true;
                    if !state.buffer.is_empty() {
                        state.buffer.push(b'\n');
                    }
                }
            }
        }
    })
}

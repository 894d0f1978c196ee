//! Client for an OpenAI-compatible server such as vLLM.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::error::GptError;
use crate::model::ChatMessage;
use crate::parser::{ParsedResponse, ReasoningMode, StreamAccumulator, ThinkingParser};
use crate::utils::preview;

/// Longest response body quoted in errors
const ERROR_BODY_CHARS: usize = 512;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_SERVED_MODEL: &str = "Qwen3-8B";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Why the server stopped generating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum FinishReason {
    Stop,
    Length,
    Other(String),
}
impl From<Option<String>> for FinishReason {
    fn from(reason: Option<String>) -> Self {
        match reason.as_deref() {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some(other) => FinishReason::Other(other.to_string()),
            None => FinishReason::Other(String::new()),
        }
    }
}
impl From<FinishReason> for String {
    fn from(reason: FinishReason) -> Self {
        reason.to_string()
    }
}
impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FinishReason::Stop => write!(f, "stop"),
            FinishReason::Length => write!(f, "length"),
            FinishReason::Other(reason) => write!(f, "{reason}"),
        }
    }
}

/// Raw output of one generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedText {
    pub text: String,
    pub finish_reason: FinishReason,
}

/// Text generation capability consumed by the chat and batch callers.
pub trait GenerationService {
    fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> impl Future<Output = Result<GeneratedText, GptError>> + Send;
}

/// Generation from chat messages, with the template applied by the server.
pub trait ChatService {
    fn chat(
        &self,
        messages: &[ChatMessage],
        config: &GenerationConfig,
    ) -> impl Future<Output = Result<ChatCompletion, GptError>> + Send;
}

/// Assistant message returned by the chat completions endpoint.
///
/// Servers started with a reasoning parser return the reasoning block
/// separately in `reasoning_content`; otherwise it is still inline in
/// `content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatCompletion {
    pub content: String,
    pub reasoning_content: Option<String>,
    pub finish_reason: FinishReason,
}
impl ChatCompletion {
    pub fn parse(&self, parser: &ThinkingParser, mode: ReasoningMode) -> ParsedResponse {
        match &self.reasoning_content {
            Some(reasoning) => ParsedResponse {
                reasoning: if mode.is_requested() {
                    reasoning.trim().to_string()
                } else {
                    String::new()
                },
                answer: parser.strip(&self.content),
            },
            None => parser.parse(&self.content, mode),
        }
    }
    /// Raw text with any server-side reasoning put back in its markers
    pub fn to_generated(&self, parser: &ThinkingParser) -> GeneratedText {
        let text = match &self.reasoning_content {
            Some(reasoning) => format!(
                "{}{}{}{}",
                parser.start_marker(),
                reasoning,
                parser.end_marker(),
                self.content
            ),
            None => self.content.clone(),
        };
        GeneratedText {
            text,
            finish_reason: self.finish_reason.clone(),
        }
    }
}

/// One streamed fragment of a chat completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDelta<'a> {
    Reasoning(&'a str),
    Answer(&'a str),
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}
impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_SERVED_MODEL.to_string(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    top_p: f32,
    top_k: i32,
    min_p: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "is_empty")]
    stop: &'a [String],
    #[serde(skip_serializing_if = "is_empty")]
    stop_token_ids: &'a [u32],
    stream: bool,
}

fn is_empty<T>(values: &&[T]) -> bool {
    values.is_empty()
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
    finish_reason: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    top_p: f32,
    top_k: i32,
    min_p: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "is_empty")]
    stop: &'a [String],
    #[serde(skip_serializing_if = "is_empty")]
    stop_token_ids: &'a [u32],
    stream: bool,
    chat_template_kwargs: TemplateKwargs,
}

#[derive(Serialize)]
struct TemplateKwargs {
    enable_thinking: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// `message` in full responses, `delta` in streamed chunks
#[derive(Deserialize)]
struct ChatChoice {
    #[serde(default, alias = "delta")]
    message: ChatContent,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChatContent {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl CompletionClient {
    pub fn new(config: ClientConfig) -> Result<Self, GptError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }
    pub fn served_model(&self) -> &str {
        &self.config.model
    }
    fn endpoint(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.config.base_url.trim_end_matches('/'))
    }
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
    async fn checked(response: reqwest::Response) -> Result<reqwest::Response, GptError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(GptError::ServerStatus {
            status: status.as_u16(),
            body: preview(&body, ERROR_BODY_CHARS),
        })
    }
    async fn post_completion(
        &self,
        prompt: &str,
        config: &GenerationConfig,
        stream: bool,
    ) -> Result<reqwest::Response, GptError> {
        let body = CompletionRequest {
            model: &self.config.model,
            prompt,
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            min_p: config.min_p,
            max_tokens: config.max_tokens,
            stop: &config.stop,
            stop_token_ids: &config.stop_token_ids,
            stream,
        };
        log::debug!(
            "POST {} (stream: {stream}, temperature: {}, top_p: {}, max_tokens: {})",
            self.endpoint("completions"),
            config.temperature,
            config.top_p,
            config.max_tokens
        );
        let request = self.authorize(self.http.post(self.endpoint("completions")).json(&body));
        Self::checked(request.send().await?).await
    }
    /// Ids of the models served at the endpoint
    pub async fn check_health(&self) -> Result<Vec<String>, GptError> {
        let request = self.authorize(self.http.get(self.endpoint("models")));
        let response = Self::checked(request.send().await?).await?;
        let models: ModelList = response.json().await?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }
    /// Stream a completion, calling `on_delta` with each text fragment and
    /// the text assembled so far.
    pub async fn generate_stream<F>(
        &self,
        prompt: &str,
        config: &GenerationConfig,
        mut on_delta: F,
    ) -> Result<GeneratedText, GptError>
    where
        F: FnMut(&str, &StreamAccumulator),
    {
        let response = self.post_completion(prompt, config, true).await?;

        let mut events = SseStream::new(response);
        let mut accumulator = StreamAccumulator::default();
        let mut finish_reason = FinishReason::Other(String::new());

        while let Some(data) = events.next_data().await? {
            let chunk: CompletionResponse = decode_event(&data)?;
            for choice in chunk.choices {
                if !choice.text.is_empty() {
                    accumulator.push(&choice.text);
                    on_delta(&choice.text, &accumulator);
                }
                if choice.finish_reason.is_some() {
                    finish_reason = FinishReason::from(choice.finish_reason);
                }
            }
        }
        log::debug!("Stream finished after {} chunks ({finish_reason})", accumulator.chunks());

        Ok(GeneratedText {
            text: accumulator.into_text(),
            finish_reason,
        })
    }
    async fn post_chat(
        &self,
        messages: &[ChatMessage],
        config: &GenerationConfig,
        stream: bool,
    ) -> Result<reqwest::Response, GptError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            min_p: config.min_p,
            max_tokens: config.max_tokens,
            stop: &config.stop,
            stop_token_ids: &config.stop_token_ids,
            stream,
            chat_template_kwargs: TemplateKwargs {
                enable_thinking: config.enable_thinking,
            },
        };
        log::debug!(
            "POST {} ({} messages, stream: {stream}, enable_thinking: {})",
            self.endpoint("chat/completions"),
            messages.len(),
            config.enable_thinking
        );
        let request = self.authorize(self.http.post(self.endpoint("chat/completions")).json(&body));
        Self::checked(request.send().await?).await
    }
    /// Stream a chat completion. Fragments are reported as reasoning when the
    /// server sends `reasoning_content` or while an inline reasoning block is
    /// still open.
    pub async fn chat_stream<F>(
        &self,
        messages: &[ChatMessage],
        config: &GenerationConfig,
        mut on_delta: F,
    ) -> Result<ChatCompletion, GptError>
    where
        F: FnMut(StreamDelta<'_>),
    {
        let response = self.post_chat(messages, config, true).await?;

        let mut events = SseStream::new(response);
        let mut accumulator = StreamAccumulator::default();
        let mut reasoning = String::new();
        let mut finish_reason = FinishReason::Other(String::new());

        while let Some(data) = events.next_data().await? {
            let chunk: ChatResponse = decode_event(&data)?;
            for choice in chunk.choices {
                if let Some(delta) = choice.message.reasoning_content.filter(|d| !d.is_empty()) {
                    reasoning.push_str(&delta);
                    on_delta(StreamDelta::Reasoning(&delta));
                }
                if let Some(delta) = choice.message.content.filter(|d| !d.is_empty()) {
                    accumulator.push(&delta);
                    if accumulator.in_reasoning() {
                        on_delta(StreamDelta::Reasoning(&delta));
                    } else {
                        on_delta(StreamDelta::Answer(&delta));
                    }
                }
                if choice.finish_reason.is_some() {
                    finish_reason = FinishReason::from(choice.finish_reason);
                }
            }
        }
        log::debug!(
            "Chat stream finished after {} content chunks ({finish_reason})",
            accumulator.chunks()
        );

        Ok(ChatCompletion {
            content: accumulator.into_text(),
            reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
            finish_reason,
        })
    }
}

fn decode_event<T: serde::de::DeserializeOwned>(data: &str) -> Result<T, GptError> {
    serde_json::from_str(data)
        .map_err(|e| GptError::StreamEvent(format!("{e}: {}", preview(data, ERROR_BODY_CHARS))))
}

impl ChatService for CompletionClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        config: &GenerationConfig,
    ) -> Result<ChatCompletion, GptError> {
        let response = self.post_chat(messages, config, false).await?;
        let completion: ChatResponse = response.json().await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(GptError::EmptyChoices)?;
        Ok(ChatCompletion {
            content: choice.message.content.unwrap_or_default(),
            reasoning_content: choice.message.reasoning_content,
            finish_reason: FinishReason::from(choice.finish_reason),
        })
    }
}

impl GenerationService for CompletionClient {
    async fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GeneratedText, GptError> {
        let response = self.post_completion(prompt, config, false).await?;
        let completion: CompletionResponse = response.json().await?;
        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or(GptError::EmptyChoices)?;
        Ok(GeneratedText {
            text: choice.text,
            finish_reason: FinishReason::from(choice.finish_reason),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseEvent {
    Data(String),
    Done,
}

/// Splits a server-sent event byte stream into `data:` payloads.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}
impl SseDecoder {
    /// Feed raw bytes; returns the events completed by them. Partial lines
    /// (including split UTF-8 sequences) stay buffered.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Result<Vec<SseEvent>, GptError> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            events.extend(Self::decode_line(&line)?);
        }
        Ok(events)
    }
    /// Decode a last line that was not terminated before the stream ended
    pub(crate) fn finish(&mut self) -> Result<Option<SseEvent>, GptError> {
        let line = std::mem::take(&mut self.buffer);
        Self::decode_line(&line)
    }
    fn decode_line(line: &[u8]) -> Result<Option<SseEvent>, GptError> {
        let line = std::str::from_utf8(line)
            .map_err(|e| GptError::StreamEvent(e.to_string()))?
            .trim();
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(None);
        };
        Ok(match data.trim() {
            "[DONE]" => Some(SseEvent::Done),
            "" => None,
            data => Some(SseEvent::Data(data.to_string())),
        })
    }
}

/// `data:` payloads of a streaming response, up to `[DONE]` or the end of
/// the body.
struct SseStream {
    response: reqwest::Response,
    decoder: SseDecoder,
    pending: VecDeque<SseEvent>,
    ended: bool,
}
impl SseStream {
    fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            ended: false,
        }
    }
    async fn next_data(&mut self) -> Result<Option<String>, GptError> {
        loop {
            match self.pending.pop_front() {
                Some(SseEvent::Data(data)) => return Ok(Some(data)),
                Some(SseEvent::Done) => {
                    self.ended = true;
                    self.pending.clear();
                    return Ok(None);
                }
                None if self.ended => return Ok(None),
                None => {}
            }
            match self.response.chunk().await? {
                Some(bytes) => self.pending.extend(self.decoder.push(&bytes)?),
                None => {
                    self.ended = true;
                    self.pending.extend(self.decoder.finish()?);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> CompletionClient {
        CompletionClient::new(ClientConfig {
            base_url: server.base_url(),
            api_key: Some("sk-test".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn decoder_handles_split_lines_and_utf8() {
        let mut decoder = SseDecoder::default();
        let payload = "data: {\"t\":\"思\"}\n\n".as_bytes();
        // split inside the multi-byte character
        let split = payload.iter().position(|b| *b >= 0x80).unwrap() + 1;

        assert!(decoder.push(&payload[..split]).unwrap().is_empty());
        let events = decoder.push(&payload[split..]).unwrap();
        assert_eq!(events, vec![SseEvent::Data("{\"t\":\"思\"}".to_string())]);

        let events = decoder.push(b": keep-alive\ndata: [DONE]\n").unwrap();
        assert_eq!(events, vec![SseEvent::Done]);
    }

    #[test]
    fn decoder_flushes_unterminated_last_line() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"data: {\"a\":1}\n\ndata: {\"b\":2}").unwrap();
        assert_eq!(events, vec![SseEvent::Data("{\"a\":1}".to_string())]);
        assert_eq!(decoder.finish().unwrap(), Some(SseEvent::Data("{\"b\":2}".to_string())));
        assert_eq!(decoder.finish().unwrap(), None);
    }

    #[test]
    fn finish_reason_mapping() {
        assert_eq!(FinishReason::from(Some("stop".to_string())), FinishReason::Stop);
        assert_eq!(FinishReason::from(Some("length".to_string())), FinishReason::Length);
        assert_eq!(
            FinishReason::from(Some("abort".to_string())),
            FinishReason::Other("abort".to_string())
        );
        assert_eq!(FinishReason::Length.to_string(), "length");
    }

    #[tokio::test]
    async fn generate_posts_sampling_parameters() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/completions")
                .header("authorization", "Bearer sk-test")
                .json_body_partial(
                    r#"{ "model": "Qwen3-8B", "prompt": "hi", "top_k": 20, "stop_token_ids": [151645, 151643], "stream": false }"#,
                );
            then.status(200).json_body(json!({
                "id": "cmpl-1",
                "choices": [{ "index": 0, "text": "<think>\nx\n</think>\n\nHello", "finish_reason": "stop" }]
            }));
        });

        let config = GenerationConfig::for_mode(ReasoningMode::ReasoningRequested);
        let generated = client(&server).generate("hi", &config).await.unwrap();

        mock.assert();
        assert_eq!(generated.text, "<think>\nx\n</think>\n\nHello");
        assert_eq!(generated.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn generate_reports_server_errors() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/completions");
            then.status(400).body("max_tokens is too large");
        });

        let config = GenerationConfig::default();
        let err = client(&server).generate("hi", &config).await.unwrap_err();
        match err {
            GptError::ServerStatus { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "max_tokens is too large");
            }
            other => panic!("unexpected error variant {other:?}"),
        }
    }

    #[tokio::test]
    async fn generate_rejects_empty_choices() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/completions");
            then.status(200).json_body(json!({ "choices": [] }));
        });

        let err = client(&server)
            .generate("hi", &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GptError::EmptyChoices));
    }

    #[tokio::test]
    async fn stream_assembles_deltas() {
        let server = MockServer::start();
        let body = [
            r#"data: {"choices":[{"text":"<think>\nok","finish_reason":null}]}"#,
            r#"data: {"choices":[{"text":"\n</think>\n\n","finish_reason":null}]}"#,
            r#"data: {"choices":[{"text":"Done.","finish_reason":"length"}]}"#,
            "data: [DONE]",
        ]
        .map(|line| format!("{line}\n\n"))
        .concat();
        server.mock(|when, then| {
            when.method(POST)
                .path("/v1/completions")
                .json_body_partial(r#"{ "stream": true }"#);
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(body);
        });

        let mut deltas = Vec::new();
        let mut open_flags = Vec::new();
        let generated = client(&server)
            .generate_stream("hi", &GenerationConfig::default(), |delta, acc| {
                deltas.push(delta.to_string());
                open_flags.push(acc.in_reasoning());
            })
            .await
            .unwrap();

        assert_eq!(deltas.len(), 3);
        assert_eq!(open_flags, vec![true, false, false]);
        assert_eq!(generated.text, "<think>\nok\n</think>\n\nDone.");
        assert_eq!(generated.finish_reason, FinishReason::Length);
    }

    #[tokio::test]
    async fn stream_keeps_last_event_without_newline() {
        let server = MockServer::start();
        let body = concat!(
            "data: {\"choices\":[{\"text\":\"4\",\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"text\":\"2\",\"finish_reason\":\"stop\"}]}",
        );
        server.mock(|when, then| {
            when.method(POST).path("/v1/completions");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(body);
        });

        let generated = client(&server)
            .generate_stream("hi", &GenerationConfig::default(), |_, _| {})
            .await
            .unwrap();
        assert_eq!(generated.text, "42");
        assert_eq!(generated.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn chat_sends_messages_and_thinking_switch() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer sk-test")
                .json_body_partial(
                    r#"{
                        "model": "Qwen3-8B",
                        "messages": [{ "role": "user", "content": "What is 5!?" }],
                        "top_p": 0.8,
                        "stream": false,
                        "chat_template_kwargs": { "enable_thinking": false }
                    }"#,
                );
            then.status(200).json_body(json!({
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": "120", "reasoning_content": null },
                    "finish_reason": "stop"
                }]
            }));
        });

        let config = GenerationConfig::for_mode(ReasoningMode::ReasoningSuppressed);
        let messages = [ChatMessage::user("What is 5!?")];
        let completion = client(&server).chat(&messages, &config).await.unwrap();

        mock.assert();
        assert_eq!(completion.content, "120");
        assert_eq!(completion.reasoning_content, None);
        assert_eq!(completion.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn chat_prefers_server_reasoning_content() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .json_body_partial(r#"{ "chat_template_kwargs": { "enable_thinking": true } }"#);
            then.status(200).json_body(json!({
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "\n\n120",
                        "reasoning_content": "\n5 * 4 * 3 * 2 * 1\n"
                    },
                    "finish_reason": "stop"
                }]
            }));
        });

        let config = GenerationConfig::for_mode(ReasoningMode::ReasoningRequested);
        let completion = client(&server)
            .chat(&[ChatMessage::user("What is 5!?")], &config)
            .await
            .unwrap();

        let parser = ThinkingParser::default();
        let parsed = completion.parse(&parser, ReasoningMode::ReasoningRequested);
        assert_eq!(parsed.reasoning, "5 * 4 * 3 * 2 * 1");
        assert_eq!(parsed.answer, "120");
        assert!(!completion.parse(&parser, ReasoningMode::ReasoningSuppressed).has_reasoning());
    }

    #[test]
    fn chat_completion_without_reasoning_content_is_parsed_inline() {
        let completion = ChatCompletion {
            content: "<think>\nsum\n</think>\n\n4".to_string(),
            reasoning_content: None,
            finish_reason: FinishReason::Stop,
        };
        let parser = ThinkingParser::default();
        let parsed = completion.parse(&parser, ReasoningMode::ReasoningRequested);
        assert_eq!(parsed.reasoning, "sum");
        assert_eq!(parsed.answer, "4");
        assert_eq!(completion.to_generated(&parser).text, completion.content);
    }

    #[tokio::test]
    async fn chat_rejects_empty_choices() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200).json_body(json!({ "choices": [] }));
        });

        let err = client(&server)
            .chat(&[ChatMessage::user("hi")], &GenerationConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GptError::EmptyChoices));
    }

    #[tokio::test]
    async fn chat_stream_separates_reasoning_deltas() {
        let server = MockServer::start();
        let body = [
            r#"data: {"choices":[{"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#,
            r#"data: {"choices":[{"delta":{"reasoning_content":"add"},"finish_reason":null}]}"#,
            r#"data: {"choices":[{"delta":{"reasoning_content":" them"},"finish_reason":null}]}"#,
            r#"data: {"choices":[{"delta":{"content":"\n\n4"},"finish_reason":"stop"}]}"#,
            "data: [DONE]",
        ]
        .map(|line| format!("{line}\n\n"))
        .concat();
        server.mock(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .json_body_partial(r#"{ "stream": true }"#);
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(body);
        });

        let mut deltas = Vec::new();
        let completion = client(&server)
            .chat_stream(
                &[ChatMessage::user("2+2?")],
                &GenerationConfig::for_mode(ReasoningMode::ReasoningRequested),
                |delta| deltas.push(format!("{delta:?}")),
            )
            .await
            .unwrap();

        assert_eq!(
            deltas,
            vec![
                r#"Reasoning("add")"#.to_string(),
                r#"Reasoning(" them")"#.to_string(),
                r#"Answer("\n\n4")"#.to_string(),
            ]
        );
        assert_eq!(completion.reasoning_content.as_deref(), Some("add them"));
        assert_eq!(completion.content, "\n\n4");
        assert_eq!(completion.finish_reason, FinishReason::Stop);
    }

    #[tokio::test]
    async fn chat_stream_marks_inline_reasoning() {
        let server = MockServer::start();
        let body = [
            r#"data: {"choices":[{"delta":{"content":"<think>"},"finish_reason":null}]}"#,
            r#"data: {"choices":[{"delta":{"content":"hmm"},"finish_reason":null}]}"#,
            r#"data: {"choices":[{"delta":{"content":"</think>ok"},"finish_reason":"stop"}]}"#,
        ]
        .map(|line| format!("{line}\n\n"))
        .concat();
        server.mock(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200)
                .header("content-type", "text/event-stream")
                .body(body);
        });

        let mut reasoning_flags = Vec::new();
        let completion = client(&server)
            .chat_stream(&[ChatMessage::user("hi")], &GenerationConfig::default(), |delta| {
                reasoning_flags.push(matches!(delta, StreamDelta::Reasoning(_)));
            })
            .await
            .unwrap();

        assert_eq!(reasoning_flags, vec![true, true, false]);
        assert_eq!(completion.reasoning_content, None);
        assert_eq!(
            completion.parse(&ThinkingParser::default(), ReasoningMode::ReasoningRequested),
            ParsedResponse {
                reasoning: "hmm".to_string(),
                answer: "ok".to_string()
            }
        );
    }

    #[tokio::test]
    async fn health_lists_served_models() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/models");
            then.status(200).json_body(json!({
                "object": "list",
                "data": [{ "id": "Qwen3-8B", "object": "model" }]
            }));
        });

        let models = client(&server).check_health().await.unwrap();
        assert_eq!(models, vec!["Qwen3-8B".to_string()]);
    }
}

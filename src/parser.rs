//! Splits a model's `<think>` reasoning block from its final answer.

use serde::{Deserialize, Serialize};

pub const THINK_START: &str = "<think>";
pub const THINK_END: &str = "</think>";

/// Whether the caller wants the reasoning segment surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReasoningMode {
    ReasoningRequested,
    ReasoningSuppressed,
}
impl ReasoningMode {
    pub fn is_requested(&self) -> bool {
        matches!(self, ReasoningMode::ReasoningRequested)
    }
}
impl From<bool> for ReasoningMode {
    fn from(enable_thinking: bool) -> Self {
        if enable_thinking {
            ReasoningMode::ReasoningRequested
        } else {
            ReasoningMode::ReasoningSuppressed
        }
    }
}

/// Result of splitting one generated text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedResponse {
    pub reasoning: String,
    pub answer: String,
}
impl ParsedResponse {
    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }
    pub fn answer(&self) -> &str {
        &self.answer
    }
    /// Empty and whitespace-only segments count as no reasoning
    pub fn has_reasoning(&self) -> bool {
        !self.reasoning.is_empty()
    }
    pub fn into_parts(self) -> (String, String) {
        (self.reasoning, self.answer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinkingParser {
    start: String,
    end: String,
}
impl Default for ThinkingParser {
    fn default() -> Self {
        Self::new(THINK_START, THINK_END)
    }
}
impl ThinkingParser {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }
    pub fn start_marker(&self) -> &str {
        &self.start
    }
    pub fn end_marker(&self) -> &str {
        &self.end
    }
    /// Split `text` into reasoning and answer.
    ///
    /// Only the first start marker and the first end marker following it
    /// are considered. Anything after that end marker is answer text, even
    /// if it looks like another reasoning block. Text in front of the start
    /// marker is dropped.
    pub fn parse(&self, text: &str, mode: ReasoningMode) -> ParsedResponse {
        let Some((reasoning, answer)) = self.split(text) else {
            log::trace!("No complete reasoning block found, treating text as answer");
            return ParsedResponse {
                reasoning: String::new(),
                answer: text.trim().to_string(),
            };
        };

        let reasoning = if mode.is_requested() {
            reasoning.trim().to_string()
        } else {
            String::new()
        };

        ParsedResponse {
            reasoning,
            answer: answer.trim().to_string(),
        }
    }
    /// Answer with any reasoning block removed.
    pub fn strip(&self, text: &str) -> String {
        self.parse(text, ReasoningMode::ReasoningSuppressed).answer
    }
    fn split<'a>(&self, text: &'a str) -> Option<(&'a str, &'a str)> {
        let open = text.find(&self.start)?;
        let body_start = open + self.start.len();
        let close = body_start + text[body_start..].find(&self.end)?;
        Some((&text[body_start..close], &text[close + self.end.len()..]))
    }
}

/// Parse with the default `<think>` markers.
pub fn parse(text: &str, mode: ReasoningMode) -> ParsedResponse {
    ThinkingParser::default().parse(text, mode)
}

/// Position of the stream relative to the first reasoning block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum BlockState {
    #[default]
    Before,
    Open,
    Closed,
}

/// Collects streamed text chunks until the response is complete.
///
/// The parser is only defined over complete text, so chunks are appended
/// here and parsed once in [`StreamAccumulator::finish`].
#[derive(Debug, Clone, Default)]
pub struct StreamAccumulator {
    parser: ThinkingParser,
    buffer: String,
    chunks: usize,
    state: BlockState,
    // byte offset where the next marker search starts
    scanned: usize,
}
impl StreamAccumulator {
    pub fn new(parser: ThinkingParser) -> Self {
        Self {
            parser,
            ..Default::default()
        }
    }
    pub fn push(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
        self.chunks += 1;
        self.advance();
    }
    /// Only the unscanned tail plus a possible partial marker is searched
    fn advance(&mut self) {
        loop {
            let (marker, next) = match self.state {
                BlockState::Before => (self.parser.start_marker(), BlockState::Open),
                BlockState::Open => (self.parser.end_marker(), BlockState::Closed),
                BlockState::Closed => return,
            };
            match self.buffer[self.scanned..].find(marker) {
                Some(pos) => {
                    self.scanned += pos + marker.len();
                    self.state = next;
                }
                None => {
                    let keep = marker.len().saturating_sub(1);
                    let mut from = self.buffer.len().saturating_sub(keep).max(self.scanned);
                    while !self.buffer.is_char_boundary(from) {
                        from -= 1;
                    }
                    self.scanned = from;
                    return;
                }
            }
        }
    }
    pub fn text(&self) -> &str {
        &self.buffer
    }
    pub fn chunks(&self) -> usize {
        self.chunks
    }
    /// True while a start marker has been seen without its end marker
    pub fn in_reasoning(&self) -> bool {
        self.state == BlockState::Open
    }
    pub fn into_text(self) -> String {
        self.buffer
    }
    pub fn finish(self, mode: ReasoningMode) -> ParsedResponse {
        log::debug!(
            "Parsing streamed response assembled from {} chunks ({} bytes)",
            self.chunks,
            self.buffer.len()
        );
        self.parser.parse(&self.buffer, mode)
    }
}

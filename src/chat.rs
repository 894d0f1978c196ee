use std::collections::VecDeque;

use crate::client::{ChatService, GeneratedText, GenerationService};
use crate::config::GenerationConfig;
use crate::error::GptError;
use crate::model::{ChatMessage, GeneratorModel};
use crate::parser::{ParsedResponse, ThinkingParser};

/// Most recent user and assistant messages kept in the prompt
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// One reply of a conversation turn.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub parsed: ParsedResponse,
    pub generated: GeneratedText,
}

/// Multi-turn conversation rendered through a model's chat template.
///
/// Only answers are stored as assistant turns; reasoning is returned to the
/// caller but never fed back into later prompts. A turn is committed to the
/// history only after the service replied.
#[derive(Debug, Clone)]
pub struct Conversation {
    model: GeneratorModel,
    system: Option<ChatMessage>,
    history: VecDeque<ChatMessage>,
    limit: usize,
    parser: ThinkingParser,
}

impl Conversation {
    pub fn new(model: GeneratorModel) -> Self {
        Self {
            model,
            system: None,
            history: VecDeque::new(),
            limit: DEFAULT_HISTORY_LIMIT,
            parser: ThinkingParser::default(),
        }
    }
    pub fn with_system(mut self, content: impl Into<String>) -> Self {
        self.system = Some(ChatMessage::system(content));
        self
    }
    /// At least one message is always kept
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self.truncate();
        self
    }
    pub fn history(&self) -> impl Iterator<Item = &ChatMessage> {
        self.history.iter()
    }
    pub fn len(&self) -> usize {
        self.history.len()
    }
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
    pub fn clear(&mut self) {
        self.history.clear();
    }
    /// System message followed by the retained history
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.system
            .iter()
            .chain(self.history.iter())
            .cloned()
            .collect()
    }
    /// Messages of the next prompt: the retained history and the new input
    fn pending(&self, user: &ChatMessage) -> Vec<ChatMessage> {
        let mut messages = self.messages();
        messages.push(user.clone());
        messages
    }
    fn commit(&mut self, user: ChatMessage, parsed: &ParsedResponse, generated: &GeneratedText) {
        log::debug!(
            "Turn finished ({}), reasoning: {} chars, answer: {} chars",
            generated.finish_reason,
            parsed.reasoning.len(),
            parsed.answer.len()
        );
        self.history.push_back(user);
        self.history.push_back(ChatMessage::assistant(parsed.answer.clone()));
        self.truncate();
    }
    fn truncate(&mut self) {
        while self.history.len() > self.limit {
            self.history.pop_front();
        }
    }
    /// Render the conversation locally and generate the next reply
    pub async fn ask<S: GenerationService>(
        &mut self,
        service: &S,
        input: &str,
        config: &GenerationConfig,
    ) -> Result<ChatReply, GptError> {
        let user = ChatMessage::user(input);
        let prompt = self.model.format_conversation(&self.pending(&user), config.mode());

        let generated = service.generate(&prompt, config).await?;
        let parsed = self.parser.parse(&generated.text, config.mode());
        self.commit(user, &parsed, &generated);

        Ok(ChatReply { parsed, generated })
    }
    /// Send the conversation as messages and let the server apply the template
    pub async fn ask_chat<S: ChatService>(
        &mut self,
        service: &S,
        input: &str,
        config: &GenerationConfig,
    ) -> Result<ChatReply, GptError> {
        let user = ChatMessage::user(input);

        let completion = service.chat(&self.pending(&user), config).await?;
        let parsed = completion.parse(&self.parser, config.mode());
        let generated = completion.to_generated(&self.parser);
        self.commit(user, &parsed, &generated);

        Ok(ChatReply { parsed, generated })
    }
}

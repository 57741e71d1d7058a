use crate::history::build_history;
use crate::llm::error::error_message_content;
use crate::llm::{ default_bot, find_bot, BotKind, BotOption, Gateway, GatewayError, HistoryTurn };
use crate::models::chat::{ ChatMessage, ContentType };

use log::{ debug, error, info, warn };
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

/// What gets read aloud for a message that is not text.
pub const MEDIA_SPEECH_TEXT: &str = "I generated an image for you.";

#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The input was blank; nothing happened.
    Empty,
    /// Another request is still in flight; nothing happened.
    Busy,
    /// The model reply (or the formatted failure) that was appended.
    Replied(ChatMessage),
    /// The conversation was reset while waiting; the reply was dropped.
    Discarded,
}

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("message '{0}' not found")]
    UnknownMessage(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// A request that has been accepted and is waiting for `dispatch`.
#[derive(Debug)]
pub struct PendingRequest {
    user_message: ChatMessage,
    bot: &'static BotOption,
    history: Vec<HistoryTurn>,
    generation: u64,
}

impl PendingRequest {
    pub fn user_message(&self) -> &ChatMessage {
        &self.user_message
    }

    pub fn bot(&self) -> &'static BotOption {
        self.bot
    }
}

struct AgentState {
    messages: Vec<ChatMessage>,
    selected: &'static BotOption,
    input: String,
    pending: bool,
    generation: u64,
}

/// Clears the pending flag however `dispatch` ends, including when its
/// future is dropped.
struct PendingRelease<'a>(&'a Mutex<AgentState>);

impl Drop for PendingRelease<'_> {
    fn drop(&mut self) {
        self.0.lock().pending = false;
    }
}

/// Owns one conversation: the message list, the selected bot and the
/// single in-flight request.
pub struct ChatAgent {
    gateway: Arc<dyn Gateway>,
    state: Mutex<AgentState>,
}

impl ChatAgent {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            state: Mutex::new(AgentState {
                messages: Vec::new(),
                selected: default_bot(),
                input: String::new(),
                pending: false,
                generation: 0,
            }),
        }
    }

    pub fn set_input(&self, text: impl Into<String>) {
        self.state.lock().input = text.into();
    }

    pub fn input(&self) -> String {
        self.state.lock().input.clone()
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.lock().messages.clone()
    }

    pub fn find_message(&self, id: &str) -> Option<ChatMessage> {
        self.state
            .lock()
            .messages.iter()
            .find(|m| m.id == id)
            .cloned()
    }

    pub fn selected_bot(&self) -> &'static BotOption {
        self.state.lock().selected
    }

    pub fn is_pending(&self) -> bool {
        self.state.lock().pending
    }

    /// Switches the bot for later sends. Messages and any in-flight request
    /// are left alone.
    pub fn select_bot(&self, bot_id: &str) -> Option<&'static BotOption> {
        let bot = find_bot(bot_id)?;
        self.state.lock().selected = bot;
        info!("Selected bot {} ({})", bot.id, bot.model);
        Some(bot)
    }

    /// Empties the conversation and goes back to the default bot. A reply
    /// still in flight will be discarded when it arrives.
    pub fn new_conversation(&self) -> &'static BotOption {
        let mut state = self.state.lock();
        state.messages.clear();
        state.selected = default_bot();
        state.generation += 1;
        info!("New conversation (generation {})", state.generation);
        state.selected
    }

    /// Takes the current input, appends it as a user message and marks the
    /// conversation pending.
    pub fn begin_send(&self) -> Result<PendingRequest, SendOutcome> {
        let mut state = self.state.lock();
        if state.pending {
            debug!("Send ignored: a request is already in flight");
            return Err(SendOutcome::Busy);
        }
        if state.input.trim().is_empty() {
            return Err(SendOutcome::Empty);
        }

        let prompt = std::mem::take(&mut state.input);
        let history = build_history(&state.messages);
        let user_message = ChatMessage::user(prompt);
        state.messages.push(user_message.clone());
        state.pending = true;

        Ok(PendingRequest {
            user_message,
            bot: state.selected,
            history,
            generation: state.generation,
        })
    }

    /// Runs an accepted request against the gateway and appends the reply.
    pub async fn dispatch(&self, request: PendingRequest) -> SendOutcome {
        let _release = PendingRelease(&self.state);
        let prompt = request.user_message.content.as_str();
        let bot = request.bot;

        let result = match bot.kind {
            BotKind::Image => {
                self.gateway
                    .generate_image(prompt).await
                    .map(|content| (ContentType::Image, content))
            }
            BotKind::Text => {
                self.gateway
                    .generate_text(&bot.model, &request.history, prompt).await
                    .map(|content| (ContentType::Text, content))
            }
        };

        let reply = match result {
            Ok((content_type, content)) => ChatMessage::model(content_type, content),
            Err(e) => {
                error!("Request to {} failed ({:?}): {}", bot.model, e.kind(), e);
                ChatMessage::model(ContentType::Text, error_message_content(&e))
            }
        };

        let mut state = self.state.lock();
        if state.generation != request.generation {
            warn!(
                "Dropping reply from {}: conversation was reset (generation {} != {})",
                bot.model,
                request.generation,
                state.generation
            );
            return SendOutcome::Discarded;
        }
        state.messages.push(reply.clone());
        SendOutcome::Replied(reply)
    }

    /// Sends the current input and waits for the reply.
    pub async fn send(&self) -> SendOutcome {
        match self.begin_send() {
            Ok(request) => self.dispatch(request).await,
            Err(outcome) => outcome,
        }
    }

    pub async fn send_prompt(&self, prompt: impl Into<String>) -> SendOutcome {
        self.set_input(prompt);
        self.send().await
    }

    /// Synthesizes speech for a message in this conversation.
    pub async fn synthesize_speech(&self, message_id: &str) -> Result<String, SpeechError> {
        let message = self
            .find_message(message_id)
            .ok_or_else(|| SpeechError::UnknownMessage(message_id.to_string()))?;
        let text = if message.is_text() { message.content.as_str() } else { MEDIA_SPEECH_TEXT };
        Ok(self.gateway.generate_speech(text).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct EchoGateway;

    #[async_trait]
    impl Gateway for EchoGateway {
        async fn generate_text(
            &self,
            model: &str,
            history: &[HistoryTurn],
            prompt: &str
        ) -> Result<String, GatewayError> {
            Ok(format!("{}|{}|{}", model, history.len(), prompt))
        }

        async fn generate_image(&self, _prompt: &str) -> Result<String, GatewayError> {
            Ok("data:image/png;base64,AAAA".to_string())
        }

        async fn generate_speech(&self, text: &str) -> Result<String, GatewayError> {
            Ok(format!("speech:{}", text))
        }
    }

    fn agent() -> ChatAgent {
        ChatAgent::new(Arc::new(EchoGateway))
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let agent = agent();
        assert_eq!(agent.send_prompt("   ").await, SendOutcome::Empty);
        assert!(agent.messages().is_empty());
    }

    #[tokio::test]
    async fn send_appends_user_and_model_messages() {
        let agent = agent();
        agent.send_prompt("hello").await;
        let outcome = agent.send_prompt("again").await;

        let messages = agent.messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2].content, "again");
        match outcome {
            SendOutcome::Replied(reply) => {
                assert_eq!(reply.content, "gemini-3-flash-preview|2|again");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(agent.input().is_empty());
        assert!(!agent.is_pending());
    }

    #[tokio::test]
    async fn image_bot_produces_image_message() {
        let agent = agent();
        agent.select_bot("zinegpt-pro").unwrap();
        agent.send_prompt("a cat").await;
        let messages = agent.messages();
        assert_eq!(messages[1].content_type, ContentType::Image);
    }

    #[tokio::test]
    async fn speech_for_media_uses_placeholder_text() {
        let agent = agent();
        agent.select_bot("zinegpt-pro").unwrap();
        agent.send_prompt("a cat").await;
        let image_id = agent.messages()[1].id.clone();
        let speech = agent.synthesize_speech(&image_id).await.unwrap();
        assert_eq!(speech, format!("speech:{}", MEDIA_SPEECH_TEXT));

        assert!(matches!(
            agent.synthesize_speech("nope").await,
            Err(SpeechError::UnknownMessage(_))
        ));
    }

    #[test]
    fn unknown_bot_keeps_selection() {
        let agent = agent();
        assert!(agent.select_bot("missing").is_none());
        assert_eq!(agent.selected_bot().id, default_bot().id);
    }
}

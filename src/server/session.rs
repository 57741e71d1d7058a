use crate::agent::{ ChatAgent, SendOutcome, SpeechError };
use crate::audio::Speaker;
use crate::llm::error::describe_error;
use crate::llm::{ Gateway, BOTS };
use crate::models::websocket::{ ClientMessage, ServerMessage };

use log::{ debug, info, warn };
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

/// One browser connection: its conversation plus read-aloud bookkeeping.
/// Replies are pushed to `outbox` as they become available.
pub struct Session {
    agent: Arc<ChatAgent>,
    speaker: Option<Arc<dyn Speaker>>,
    /// Messages whose audio is loading or playing.
    speaking: Arc<Mutex<HashSet<String>>>,
    outbox: UnboundedSender<ServerMessage>,
}

impl Session {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        speaker: Option<Arc<dyn Speaker>>,
        outbox: UnboundedSender<ServerMessage>
    ) -> Self {
        Self {
            agent: Arc::new(ChatAgent::new(gateway)),
            speaker,
            speaking: Arc::new(Mutex::new(HashSet::new())),
            outbox,
        }
    }

    pub fn agent(&self) -> &Arc<ChatAgent> {
        &self.agent
    }

    fn send(&self, msg: ServerMessage) {
        if self.outbox.send(msg).is_err() {
            debug!("Session outbox closed; dropping message");
        }
    }

    pub fn handle(&self, msg: ClientMessage) {
        match msg {
            ClientMessage::Chat { content } => self.chat(content),
            ClientMessage::SelectBot { bot_id } => {
                match self.agent.select_bot(&bot_id) {
                    Some(bot) => self.send(ServerMessage::BotSelected { bot_id: bot.id.clone() }),
                    None =>
                        self.send(ServerMessage::Error {
                            message: format!("Unknown bot: {}", bot_id),
                        }),
                }
            }
            ClientMessage::NewConversation => {
                let bot = self.agent.new_conversation();
                self.send(ServerMessage::ConversationReset { bot_id: bot.id.clone() });
            }
            ClientMessage::Speak { message_id } => self.speak(message_id),
            ClientMessage::Bots => self.send(ServerMessage::Bots { bots: BOTS.clone() }),
        }
    }

    fn chat(&self, content: String) {
        self.agent.set_input(content);
        let request = match self.agent.begin_send() {
            Ok(request) => request,
            Err(SendOutcome::Busy) => {
                self.send(ServerMessage::Busy);
                return;
            }
            Err(_) => {
                return;
            }
        };

        self.send(ServerMessage::Message { message: request.user_message().clone() });
        self.send(ServerMessage::Processing);

        let agent = Arc::clone(&self.agent);
        let outbox = self.outbox.clone();
        tokio::spawn(async move {
            match agent.dispatch(request).await {
                SendOutcome::Replied(message) => {
                    let _ = outbox.send(ServerMessage::Message { message });
                }
                outcome => debug!("Request ended without a reply: {:?}", outcome),
            }
        });
    }

    fn speak(&self, message_id: String) {
        if !self.speaking.lock().insert(message_id.clone()) {
            self.send(ServerMessage::Error {
                message: "Audio for this message is already loading or playing".to_string(),
            });
            return;
        }

        let agent = Arc::clone(&self.agent);
        let speaker = self.speaker.clone();
        let speaking = Arc::clone(&self.speaking);
        let outbox = self.outbox.clone();

        tokio::spawn(async move {
            match agent.synthesize_speech(&message_id).await {
                Ok(data_uri) => {
                    let _ = outbox.send(ServerMessage::Audio {
                        message_id: message_id.clone(),
                        data_uri: data_uri.clone(),
                    });
                    if let Some(speaker) = speaker {
                        play_locally(speaker, &message_id, data_uri, &outbox).await;
                    }
                }
                Err(SpeechError::Gateway(e)) => {
                    warn!("Speech synthesis failed for {}: {}", message_id, e);
                    let _ = outbox.send(ServerMessage::Error { message: describe_error(&e) });
                }
                Err(e) => {
                    let _ = outbox.send(ServerMessage::Error { message: e.to_string() });
                }
            }
            speaking.lock().remove(&message_id);
        });
    }
}

/// Plays on the server's speakers. Failures only mean the playing flag
/// never turns on. Opening the output stream blocks, so it runs on the
/// blocking pool.
async fn play_locally(
    speaker: Arc<dyn Speaker>,
    message_id: &str,
    data_uri: String,
    outbox: &UnboundedSender<ServerMessage>
) {
    let started = tokio::task::spawn_blocking(move || speaker.decode_and_play(&data_uri)).await;
    let handle = match started {
        Ok(Ok(handle)) => handle,
        Ok(Err(e)) => {
            warn!("Local playback failed for {} ({:?}): {}", message_id, e.kind(), e);
            return;
        }
        Err(e) => {
            warn!("Local playback task for {} did not complete: {}", message_id, e);
            return;
        }
    };
    info!("Playing speech for {} ({:?})", message_id, handle.duration());
    let _ = outbox.send(ServerMessage::Playback {
        message_id: message_id.to_string(),
        playing: true,
    });
    handle.finished().await;
    let _ = outbox.send(ServerMessage::Playback {
        message_id: message_id.to_string(),
        playing: false,
    });
}

use serde::{ Serialize, Deserialize };

use super::chat::ChatMessage;
use crate::llm::BotOption;

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "select_bot")] SelectBot {
        bot_id: String,
    },
    #[serde(rename = "new_conversation")]
    NewConversation,
    #[serde(rename = "speak")] Speak {
        message_id: String,
    },
    #[serde(rename = "bots")]
    Bots,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "message")] Message {
        message: ChatMessage,
    },
    #[serde(rename = "busy")]
    Busy,
    #[serde(rename = "conversation_reset")] ConversationReset {
        bot_id: String,
    },
    #[serde(rename = "bot_selected")] BotSelected {
        bot_id: String,
    },
    #[serde(rename = "audio")] Audio {
        message_id: String,
        data_uri: String,
    },
    #[serde(rename = "playback")] Playback {
        message_id: String,
        playing: bool,
    },
    #[serde(rename = "bots")] Bots {
        bots: Vec<BotOption>,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_client_messages() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"chat","content":"hi"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Chat { content } if content == "hi"));

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"new_conversation"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::NewConversation));

        let msg: ClientMessage = serde_json
            ::from_str(r#"{"type":"select_bot","bot_id":"zinegpt-pro"}"#)
            .unwrap();
        assert!(matches!(msg, ClientMessage::SelectBot { bot_id } if bot_id == "zinegpt-pro"));
    }

    #[test]
    fn server_messages_carry_type_tag() {
        let json = serde_json::to_value(ServerMessage::Busy).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "busy" }));

        let json = serde_json
            ::to_value(ServerMessage::Playback { message_id: "m1".into(), playing: true })
            .unwrap();
        assert_eq!(json["type"], "playback");
        assert_eq!(json["playing"], true);
    }
}

use crate::llm::HistoryTurn;
use crate::models::chat::ChatMessage;

/// Prior turns for the text model. Only text messages take part; images
/// and audio never reach the model as history.
pub fn build_history(messages: &[ChatMessage]) -> Vec<HistoryTurn> {
    messages
        .iter()
        .filter(|msg| msg.is_text())
        .map(|msg| HistoryTurn {
            role: msg.role,
            text: msg.content.clone(),
        })
        .collect()
}

/// Plain transcript, used when printing a conversation to the terminal.
pub fn format_transcript(messages: &[ChatMessage]) -> String {
    let mut result = String::new();
    for msg in messages {
        let role_display = match msg.role {
            crate::models::chat::Role::User => "You",
            crate::models::chat::Role::Model => "Hrilagpt",
        };
        let body = if msg.is_text() {
            msg.content.as_str()
        } else {
            "[generated media]"
        };
        result.push_str(&format!("{}: {}\n", role_display, body));
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::{ ContentType, Role };

    #[test]
    fn excludes_media_messages() {
        let messages = vec![
            ChatMessage::user("draw a cat"),
            ChatMessage::model(ContentType::Image, "data:image/png;base64,AAAA"),
            ChatMessage::user("now describe it"),
            ChatMessage::model(ContentType::Text, "A cat."),
            ChatMessage::model(ContentType::Audio, "data:audio/pcm;base64,AAAA")
        ];
        let history = build_history(&messages);
        assert_eq!(history.len(), 3);
        assert_eq!(history[0], HistoryTurn { role: Role::User, text: "draw a cat".into() });
        assert_eq!(history[2].role, Role::Model);
        assert_eq!(history[2].text, "A cat.");
    }

    #[test]
    fn transcript_hides_media_payloads() {
        let messages = vec![
            ChatMessage::user("hi"),
            ChatMessage::model(ContentType::Image, "data:image/png;base64,AAAA")
        ];
        assert_eq!(format_transcript(&messages), "You: hi\nHrilagpt: [generated media]\n");
    }
}

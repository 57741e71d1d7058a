use async_trait::async_trait;
use serde::{ Deserialize, Serialize };

use super::error::GatewayError;
use crate::models::chat::Role;

/// One prior turn as the text model expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub text: String,
}

/// The three remote operations the chat needs.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn generate_text(
        &self,
        model: &str,
        history: &[HistoryTurn],
        prompt: &str
    ) -> Result<String, GatewayError>;

    /// Returns a `data:<mime>;base64,...` URI.
    async fn generate_image(&self, prompt: &str) -> Result<String, GatewayError>;

    /// Returns a `data:audio/pcm;base64,...` URI of 16-bit mono PCM at 24 kHz.
    async fn generate_speech(&self, text: &str) -> Result<String, GatewayError>;
}

/// First `limit` characters of `text`.
pub fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("hello", 5), "hello");
        assert_eq!(truncate_chars("hello", 2), "he");
        assert_eq!(truncate_chars("ééé", 2), "éé");
        assert_eq!(truncate_chars("", 3), "");
    }
}

use chrono::Utc;
use serde::{ Deserialize, Serialize };
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// How `ChatMessage::content` is to be read: plain text, or a base64 data-URI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
    Audio,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub content: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

impl ChatMessage {
    pub fn new(role: Role, content_type: ContentType, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content_type,
            content: content.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, ContentType::Text, content)
    }

    pub fn model(content_type: ContentType, content: impl Into<String>) -> Self {
        Self::new(Role::Model, content_type, content)
    }

    pub fn is_text(&self) -> bool {
        self.content_type == ContentType::Text
    }
}

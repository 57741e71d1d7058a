pub mod data_uri;
pub mod error;
pub mod gateway;
pub mod gemini;

use once_cell::sync::Lazy;
use serde::{ Deserialize, Serialize };
use std::fmt;
use std::str::FromStr;

pub use data_uri::DataUri;
pub use error::{ ErrorKind, GatewayError };
pub use gateway::{ Gateway, HistoryTurn };
pub use gemini::GeminiGateway;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
pub const DEFAULT_SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_VOICE: &str = "Kore";
pub const DEFAULT_SYSTEM_INSTRUCTION: &str =
    "You are Hrilagpt, a helpful, professional, and intelligent AI assistant. You answer concisely and professionally.";
/// Returned when the text model answers without any text part.
pub const EMPTY_TEXT_FALLBACK: &str = "I couldn't generate a response.";
/// Speech requests are cut to this many characters.
pub const SPEECH_CHAR_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BotKind {
    Text,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BotOption {
    pub id: String,
    pub name: String,
    pub description: String,
    pub model: String,
    #[serde(rename = "type")]
    pub kind: BotKind,
}

impl BotOption {
    fn new(id: &str, name: &str, description: &str, model: &str, kind: BotKind) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            model: model.to_string(),
            kind,
        }
    }
}

/// The selectable bots. The first entry is the default selection.
pub static BOTS: Lazy<Vec<BotOption>> = Lazy::new(|| {
    vec![
        BotOption::new(
            "hrilagpt-pro",
            "Hrilagpt Pro",
            "Great for everyday tasks",
            "gemini-3-flash-preview",
            BotKind::Text
        ),
        BotOption::new(
            "hrilagpt-pro-2.1",
            "Hrilagpt Pro 2.1",
            "Advanced reasoning & coding",
            "gemini-3-pro-preview",
            BotKind::Text
        ),
        BotOption::new(
            "zinegpt-pro",
            "ZineGPT Pro",
            "Generates DALL-E style images",
            DEFAULT_IMAGE_MODEL,
            BotKind::Image
        )
    ]
});

pub fn default_bot() -> &'static BotOption {
    &BOTS[0]
}

pub fn find_bot(id: &str) -> Option<&'static BotOption> {
    BOTS.iter().find(|bot| bot.id == id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "3:4")]
    Portrait,
    #[serde(rename = "4:3")]
    Landscape,
    #[serde(rename = "9:16")]
    Mobile,
    #[serde(rename = "16:9")]
    Widescreen,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Portrait,
        AspectRatio::Landscape,
        AspectRatio::Mobile,
        AspectRatio::Widescreen,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "3:4",
            AspectRatio::Landscape => "4:3",
            AspectRatio::Mobile => "9:16",
            AspectRatio::Widescreen => "16:9",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AspectRatio::Square => "Square",
            AspectRatio::Portrait => "Portrait",
            AspectRatio::Landscape => "Landscape",
            AspectRatio::Mobile => "Mobile",
            AspectRatio::Widescreen => "Widescreen",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct ParseAspectRatioError {
    message: String,
}

impl fmt::Display for ParseAspectRatioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseAspectRatioError {}

impl FromStr for AspectRatio {
    type Err = ParseAspectRatioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AspectRatio::ALL
            .iter()
            .copied()
            .find(|ratio| ratio.as_str() == s.trim())
            .ok_or_else(|| ParseAspectRatioError {
                message: format!("Invalid aspect ratio: '{}'", s),
            })
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Explicit key; when `None` the environment is consulted on first use.
    pub api_key: Option<String>,
    pub base_url: String,
    pub image_model: String,
    pub speech_model: String,
    pub voice: String,
    pub system_instruction: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            speech_model: DEFAULT_SPEECH_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

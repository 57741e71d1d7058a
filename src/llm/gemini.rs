use async_trait::async_trait;
use log::{ debug, error, info };
use once_cell::sync::OnceCell;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use std::env;
use url::Url;

use super::data_uri::DataUri;
use super::error::GatewayError;
use super::gateway::{ truncate_chars, Gateway, HistoryTurn };
use super::{ GatewayConfig, AspectRatio, EMPTY_TEXT_FALLBACK, SPEECH_CHAR_LIMIT };
use crate::models::chat::Role;

/// Environment variables consulted, in order, when no key is configured.
pub const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

impl GeminiContent {
    fn text(role: Option<&str>, text: &str) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![GeminiPart { text: Some(text.to_string()), ..Default::default() }],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_config: Option<ImageConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: AspectRatio,
}

#[derive(Deserialize, Debug, Default)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    #[serde(default)]
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl GenerateContentResponse {
    fn first_parts(&self) -> &[GeminiPart] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| content.parts.as_slice())
            .unwrap_or(&[])
    }

    /// Concatenated non-thought text of the first candidate.
    fn text(&self) -> Option<String> {
        let text: String = self
            .first_parts()
            .iter()
            .filter(|p| p.thought != Some(true))
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.is_empty() { None } else { Some(text) }
    }

    fn first_inline_data(&self) -> Option<(Option<&str>, &str)> {
        self.first_parts()
            .iter()
            .filter_map(|p| p.inline_data.as_ref())
            .find_map(|inline| {
                inline.data
                    .as_deref()
                    .filter(|d| !d.is_empty())
                    .map(|d| (inline.mime_type.as_deref(), d))
            })
    }
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::User => "user",
        Role::Model => "model",
    }
}

/// Explicit key first, then the environment. Blank values count as absent.
pub fn resolve_api_key<F>(explicit: Option<&str>, lookup: F) -> Option<String>
    where F: Fn(&str) -> Option<String>
{
    explicit
        .map(str::to_string)
        .filter(|k| !k.trim().is_empty())
        .or_else(|| {
            API_KEY_VARS.iter()
                .filter_map(|var| lookup(var))
                .find(|k| !k.trim().is_empty())
        })
}

struct Connection {
    http: HttpClient,
    api_key: String,
}

/// Gemini REST client. The HTTP client and key are resolved on the first
/// request, so a missing key only fails that request.
pub struct GeminiGateway {
    config: GatewayConfig,
    connection: OnceCell<Connection>,
}

impl GeminiGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self { config, connection: OnceCell::new() }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn connection(&self) -> Result<&Connection, GatewayError> {
        self.connection.get_or_try_init(|| {
            let api_key = resolve_api_key(self.config.api_key.as_deref(), |var|
                env::var(var).ok()
            ).ok_or_else(||
                GatewayError::CredentialMissing(
                    format!("API Key must be set via --api-key or {}", API_KEY_VARS.join("/"))
                )
            )?;
            info!("Gemini client initialised: base_url={}", self.config.base_url);
            Ok(Connection { http: HttpClient::new(), api_key })
        })
    }

    fn endpoint(&self, model: &str) -> Result<Url, GatewayError> {
        let raw = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        );
        Ok(Url::parse(&raw)?)
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest
    ) -> Result<GenerateContentResponse, GatewayError> {
        let conn = self.connection()?;
        let url = self.endpoint(model)?;
        debug!("POST {}", url);

        let resp = conn.http
            .post(url)
            .header("x-goog-api-key", &conn.api_key)
            .json(request)
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json
                ::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error.message)
                .unwrap_or(body);
            error!("Gemini request to model={} failed: {} {}", model, status, message);
            return Err(GatewayError::from_status(status.as_u16(), message));
        }

        Ok(resp.json::<GenerateContentResponse>().await?)
    }
}

#[async_trait]
impl Gateway for GeminiGateway {
    async fn generate_text(
        &self,
        model: &str,
        history: &[HistoryTurn],
        prompt: &str
    ) -> Result<String, GatewayError> {
        info!("GeminiGateway::generate_text() → model={} history_turns={}", model, history.len());
        let mut contents: Vec<GeminiContent> = history
            .iter()
            .map(|turn| GeminiContent::text(Some(role_name(turn.role)), &turn.text))
            .collect();
        contents.push(GeminiContent::text(Some("user"), prompt));

        let request = GenerateContentRequest {
            contents,
            system_instruction: Some(GeminiContent::text(None, &self.config.system_instruction)),
            generation_config: None,
        };
        let response = self.generate_content(model, &request).await?;
        Ok(response.text().unwrap_or_else(|| EMPTY_TEXT_FALLBACK.to_string()))
    }

    async fn generate_image(&self, prompt: &str) -> Result<String, GatewayError> {
        info!("GeminiGateway::generate_image() → model={}", self.config.image_model);
        let request = GenerateContentRequest {
            contents: vec![GeminiContent::text(None, prompt)],
            generation_config: Some(GenerationConfig {
                image_config: Some(ImageConfig { aspect_ratio: AspectRatio::Square }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let response = self.generate_content(&self.config.image_model, &request).await?;
        let (mime, data) = response.first_inline_data().ok_or(GatewayError::NoImage)?;
        Ok(DataUri::new(mime.unwrap_or("image/png"), data).to_string())
    }

    async fn generate_speech(&self, text: &str) -> Result<String, GatewayError> {
        let safe_text = truncate_chars(text, SPEECH_CHAR_LIMIT);
        info!(
            "GeminiGateway::generate_speech() → model={} voice={} chars={}",
            self.config.speech_model,
            self.config.voice,
            safe_text.chars().count()
        );
        let request = GenerateContentRequest {
            contents: vec![GeminiContent::text(None, safe_text)],
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: self.config.voice.clone(),
                        },
                    },
                }),
                ..Default::default()
            }),
            ..Default::default()
        };
        let response = self.generate_content(&self.config.speech_model, &request).await?;
        let (_, data) = response.first_inline_data().ok_or(GatewayError::NoAudio)?;
        Ok(DataUri::new("audio/pcm", data).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_key_beats_environment() {
        let key = resolve_api_key(Some("explicit"), |_| Some("env".into()));
        assert_eq!(key.as_deref(), Some("explicit"));
    }

    #[test]
    fn falls_back_through_env_vars() {
        let key = resolve_api_key(Some("  "), |var| {
            if var == "API_KEY" { Some("legacy".into()) } else { None }
        });
        assert_eq!(key.as_deref(), Some("legacy"));
        assert_eq!(resolve_api_key(None, |_| None), None);
    }

    #[test]
    fn text_skips_thought_parts() {
        let response: GenerateContentResponse = serde_json
            ::from_value(
                serde_json::json!({
                "candidates": [{ "content": { "role": "model", "parts": [
                    { "text": "thinking...", "thought": true },
                    { "text": "Hello " },
                    { "text": "there" }
                ]}}]
            })
            )
            .unwrap();
        assert_eq!(response.text().as_deref(), Some("Hello there"));
    }

    #[test]
    fn empty_response_has_no_text_or_inline_data() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(response.text().is_none());
        assert!(response.first_inline_data().is_none());
    }

    #[test]
    fn endpoint_joins_base_and_model() {
        let gateway = GeminiGateway::new(GatewayConfig {
            base_url: "http://localhost:9000/".into(),
            ..Default::default()
        });
        let url = gateway.endpoint("gemini-3-flash-preview").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:9000/v1beta/models/gemini-3-flash-preview:generateContent"
        );
    }
}

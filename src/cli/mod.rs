use clap::{ Parser, Subcommand };

use crate::llm::{
    GatewayConfig,
    DEFAULT_BASE_URL,
    DEFAULT_IMAGE_MODEL,
    DEFAULT_SPEECH_MODEL,
    DEFAULT_SYSTEM_INSTRUCTION,
    DEFAULT_VOICE,
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    // --- Gemini Provider Args ---
    /// Gemini API key. When unset, GEMINI_API_KEY or API_KEY is read on the first request.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of the Gemini REST API
    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Model used by image bots
    #[arg(long, env = "IMAGE_MODEL", default_value = DEFAULT_IMAGE_MODEL)]
    pub image_model: String,

    /// Model used for read-aloud speech
    #[arg(long, env = "SPEECH_MODEL", default_value = DEFAULT_SPEECH_MODEL)]
    pub speech_model: String,

    /// Prebuilt voice for speech synthesis
    #[arg(long, env = "SPEECH_VOICE", default_value = DEFAULT_VOICE)]
    pub voice: String,

    /// System instruction sent with every text request
    #[arg(long, env = "SYSTEM_INSTRUCTION", default_value = DEFAULT_SYSTEM_INSTRUCTION)]
    pub system_instruction: String,

    // --- Server Args ---
    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Port for the HTTP API (bot catalog, health). Disabled when unset.
    #[arg(long, env = "HTTP_PORT")]
    pub http_port: Option<u16>,

    /// Shared secret for signed WebSocket handshakes. Connections are open when unset.
    #[arg(long, env = "SERVER_API_KEY", hide_env_values = true)]
    pub server_api_key: Option<String>,

    /// Also play synthesized speech on this machine's speakers.
    #[arg(long, env = "LOCAL_PLAYBACK", default_value = "false")]
    pub local_playback: bool,

    /// Optional path to the TLS certificate file (PEM format). Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format). Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the WebSocket chat server (default)
    Serve,
    /// Send one prompt and print the reply
    Ask {
        /// Bot id from `bots`
        #[arg(long, default_value = "hrilagpt-pro")]
        bot: String,
        /// Write a generated image to this file
        #[arg(long)]
        out: Option<String>,
        prompt: String,
    },
    /// Read text aloud on the local speakers
    Say {
        text: String,
    },
    /// List the available bots
    Bots,
}

impl Args {
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            api_key: self.api_key.clone().filter(|k| !k.trim().is_empty()),
            base_url: self.base_url.clone(),
            image_model: self.image_model.clone(),
            speech_model: self.speech_model.clone(),
            voice: self.voice.clone(),
            system_instruction: self.system_instruction.clone(),
        }
    }

    pub fn tls_enabled(&self) -> bool {
        self.enable_tls && self.tls_cert_path.is_some() && self.tls_key_path.is_some()
    }
}

pub mod api;
pub mod auth;
pub mod session;
pub mod websocket;

use crate::audio::Speaker;
use crate::cli::Args;
use crate::llm::Gateway;
use std::error::Error;
use std::sync::Arc;
use log::{ info, warn };

/// Everything a connection needs; cloned into each connection task.
#[derive(Clone)]
pub struct ServerState {
    pub gateway: Arc<dyn Gateway>,
    pub speaker: Option<Arc<dyn Speaker>>,
    pub args: Args,
}

pub struct Server {
    state: ServerState,
}

impl Server {
    pub fn new(state: ServerState) -> Self {
        if state.args.server_api_key.as_deref().is_some_and(|k| !k.trim().is_empty()) {
            info!("Server configured with API Key authentication.");
        } else {
            warn!("Server configured WITHOUT API Key authentication. Connections are open.");
        }
        Self { state }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(http_port) = self.state.args.http_port {
            api::start_http_server(http_port, self.state.args.clone()).await?;
        }

        websocket::start_ws_server(self.state.clone()).await
    }
}

use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::server::auth::verify_handshake;
use crate::server::session::Session;
use crate::server::ServerState;

use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::tungstenite::handshake::server::{ ErrorResponse, Request, Response };
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{ accept_hdr_async, WebSocketStream };

use rustls::pki_types::{ CertificateDer, PrivateKeyDer };
use rustls::ServerConfig;
use rustls_pemfile::{ certs, pkcs8_private_keys };

use governor::{ clock::DefaultClock, state::{ InMemoryState, NotKeyed }, Quota, RateLimiter };
use lazy_static::lazy_static;

use chrono::Utc;
use futures::{ SinkExt, StreamExt };
use log::{ debug, error, info, warn };

const MAX_MESSAGE_SIZE: usize = 1024 * 1024;
const CONNECTIONS_PER_SECOND: NonZeroU32 = match NonZeroU32::new(10) {
    Some(n) => n,
    None => NonZeroU32::MIN,
};

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(CONNECTIONS_PER_SECOND));
}

enum Outgoing {
    Json(ServerMessage),
    Pong(Vec<u8>),
}

pub fn load_tls_config(
    cert_path: &str,
    key_path: &str
) -> Result<Arc<ServerConfig>, Box<dyn Error + Send + Sync>> {
    let cert_file = File::open(cert_path).map_err(|e|
        format!("Failed to open TLS certificate file '{}': {}", cert_path, e)
    )?;
    let key_file = File::open(key_path).map_err(|e|
        format!("Failed to open TLS key file '{}': {}", key_path, e)
    )?;

    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut BufReader::new(cert_file))
        .collect::<Result<_, _>>()
        .map_err(|e| format!("Failed to read certificate(s): {}", e))?;

    let key = match pkcs8_private_keys(&mut BufReader::new(key_file)).next() {
        Some(Ok(k)) => PrivateKeyDer::Pkcs8(k),
        Some(Err(e)) => {
            return Err(format!("Error reading private key: {}", e).into());
        }
        None => {
            return Err("No PKCS8 private key found in key file".into());
        }
    };

    let config = ServerConfig::builder().with_no_client_auth().with_single_cert(cert_chain, key)?;
    Ok(Arc::new(config))
}

pub async fn start_ws_server(state: ServerState) -> Result<(), Box<dyn Error + Send + Sync>> {
    let args = &state.args;
    let listener = TcpListener::bind(&args.server_addr).await?;

    let tls_acceptor = if args.enable_tls {
        match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert_path), Some(key_path)) => {
                info!(
                    "TLS enabled. Loading certificate from '{}' and key from '{}'",
                    cert_path,
                    key_path
                );
                Some(TlsAcceptor::from(load_tls_config(cert_path, key_path)?))
            }
            (Some(_), None) | (None, Some(_)) => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err("Missing TLS certificate or key path".into());
            }
            (None, None) => {
                error!("--enable-tls was set but no certificate/key paths provided.");
                return Err("TLS enabled without cert/key".into());
            }
        }
    } else {
        None
    };

    let protocol = if tls_acceptor.is_some() { "WSS" } else { "WS" };
    info!("{} server listening on: {}", protocol, args.server_addr);

    loop {
        let (stream, peer) = listener.accept().await?;

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
            continue;
        }

        info!("Incoming connection from: {}", peer);
        let state = state.clone();
        let tls_acceptor = tls_acceptor.clone();

        tokio::spawn(async move {
            let result = match tls_acceptor {
                Some(acceptor) =>
                    match acceptor.accept(stream).await {
                        Ok(tls_stream) => process_connection(peer, tls_stream, state).await,
                        Err(e) => {
                            error!("TLS handshake error for {}: {}", peer, e);
                            Err(Box::new(e) as Box<dyn Error + Send + Sync>)
                        }
                    }
                None => process_connection(peer, stream, state).await,
            };

            if let Err(e) = result {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    state: ServerState
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let secret = state.args.server_api_key.clone();
    let auth_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let header_key = req
            .headers()
            .get("X-API-Key")
            .and_then(|v| v.to_str().ok());
        match verify_handshake(secret.as_deref(), header_key, req.uri().query(), Utc::now().timestamp()) {
            Ok(()) => Ok(response),
            Err(e) => {
                warn!("{}: handshake rejected: {}", peer, e);
                let mut res = ErrorResponse::new(Some(e.to_string()));
                *res.status_mut() = tokio_tungstenite::tungstenite::http::StatusCode::UNAUTHORIZED;
                Err(res)
            }
        }
    };

    match accept_hdr_async(stream, auth_callback).await {
        Ok(ws) => {
            handle_connection(peer, ws, state).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as _)
        }
    }
}

pub async fn handle_connection<S>(peer: SocketAddr, websocket: WebSocketStream<S>, state: ServerState)
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    info!("New WebSocket connection: {}", peer);
    let (mut sink, mut rx) = websocket.split();

    let (json_tx, mut json_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outgoing>();

    let forward_tx = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(msg) = json_rx.recv().await {
            if forward_tx.send(Outgoing::Json(msg)).is_err() {
                break;
            }
        }
    });

    let writer = tokio::spawn(async move {
        while let Some(out) = out_rx.recv().await {
            let frame = match out {
                Outgoing::Pong(data) => Message::Pong(data),
                Outgoing::Json(msg) =>
                    match serde_json::to_string(&msg) {
                        Ok(json) => Message::Text(json),
                        Err(e) => {
                            error!("Failed to serialize message for {}: {}", peer, e);
                            continue;
                        }
                    }
            };
            if let Err(e) = sink.send(frame).await {
                error!("Error sending message to {}: {}", peer, e);
                break;
            }
        }
    });

    let session = Session::new(Arc::clone(&state.gateway), state.speaker.clone(), json_tx.clone());

    while let Some(msg) = rx.next().await {
        let message = match msg {
            Ok(message) => message,
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        };

        if message.len() > MAX_MESSAGE_SIZE {
            warn!("Message from {} exceeds size limit ({} > {})", peer, message.len(), MAX_MESSAGE_SIZE);
            let _ = json_tx.send(ServerMessage::Error { message: "Message too large".to_string() });
            break;
        }

        match message {
            Message::Text(text) =>
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => {
                        debug!("{} → {:?}", peer, client_msg);
                        session.handle(client_msg);
                    }
                    Err(e) => {
                        error!("Failed to parse message from {}: {}", peer, e);
                        let _ = json_tx.send(ServerMessage::Error {
                            message: format!("Failed to parse message: {}", e),
                        });
                    }
                }
            Message::Ping(data) => {
                let _ = out_tx.send(Outgoing::Pong(data));
            }
            Message::Close(_) => {
                info!("Received close frame from {}", peer);
                break;
            }
            Message::Binary(_) => warn!("Ignoring binary message from {}", peer),
            Message::Pong(_) | Message::Frame(_) => {}
        }
    }

    forwarder.abort();
    writer.abort();
    info!("WebSocket connection closed for {}", peer);
}

pub mod agent;
pub mod audio;
pub mod cli;
pub mod history;
pub mod llm;
pub mod models;
pub mod server;

use agent::{ ChatAgent, SendOutcome };
use cli::{ Args, Command };
use llm::{ DataUri, Gateway, GeminiGateway, BOTS };
use log::{ debug, info };
use models::chat::ContentType;
use server::{ Server, ServerState };
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let gateway: Arc<dyn Gateway> = Arc::new(GeminiGateway::new(args.gateway_config()));

    match args.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(args, gateway).await,
        Command::Ask { bot, out, prompt } => ask(gateway, &bot, out.as_deref(), prompt).await,
        Command::Say { text } => say(gateway, &text).await,
        Command::Bots => {
            for bot in BOTS.iter() {
                println!("{:<18} {:<18} {:<6} {}", bot.id, bot.name, format!("{:?}", bot.kind), bot.description);
            }
            Ok(())
        }
    }
}

async fn serve(args: Args, gateway: Arc<dyn Gateway>) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Server Address: {}", args.server_addr);
    info!("HTTP Port: {:?}", args.http_port);
    info!("Gemini Base URL: {}", args.base_url);
    info!("Image Model: {}", args.image_model);
    info!("Speech Model: {} (voice {})", args.speech_model, args.voice);
    info!("Local Playback: {}", args.local_playback);
    info!("TLS: {}", args.tls_enabled());
    info!("-------------------------");

    let speaker = if args.local_playback { audio::default_speaker() } else { None };
    let server = Server::new(ServerState { gateway, speaker, args });
    server.run().await
}

async fn ask(
    gateway: Arc<dyn Gateway>,
    bot_id: &str,
    out: Option<&str>,
    prompt: String
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let agent = ChatAgent::new(gateway);
    agent.select_bot(bot_id).ok_or_else(|| format!("Unknown bot: {}", bot_id))?;

    let reply = match agent.send_prompt(prompt).await {
        SendOutcome::Replied(reply) => reply,
        SendOutcome::Empty => {
            return Err("Prompt is empty".into());
        }
        other => {
            return Err(format!("No reply: {:?}", other).into());
        }
    };

    debug!("Conversation:\n{}", history::format_transcript(&agent.messages()));

    match (reply.content_type, out) {
        (ContentType::Image, Some(path)) => {
            let bytes = DataUri::parse(&reply.content)?.decode()?;
            std::fs::write(path, &bytes)?;
            println!("Saved image ({} bytes) to {}", bytes.len(), path);
        }
        (ContentType::Image, None) => {
            let uri = DataUri::parse(&reply.content)?;
            println!(
                "[{} image, {} base64 chars; pass --out image.{} to save]",
                uri.mime_type,
                uri.data.len(),
                uri.extension()
            );
        }
        _ => println!("{}", reply.content),
    }
    Ok(())
}

async fn say(gateway: Arc<dyn Gateway>, text: &str) -> Result<(), Box<dyn Error + Send + Sync>> {
    let speaker = audio::default_speaker().ok_or("Local playback is not available in this build")?;
    let data_uri = gateway.generate_speech(text).await?;
    let handle = tokio::task::spawn_blocking(move || speaker.decode_and_play(&data_uri)).await??;
    info!("Playing {:?} of speech", handle.duration());
    handle.finished().await;
    Ok(())
}

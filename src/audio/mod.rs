pub mod pcm;
pub mod player;
#[cfg(feature = "playback")]
pub mod output;

pub use pcm::{ PcmClip, SPEECH_SAMPLE_RATE };
pub use player::{ AudioBackend, AudioPlayer, OutputContext, PlaybackHandle, Speaker };
#[cfg(feature = "playback")]
pub use output::CpalBackend;

use thiserror::Error;

use crate::llm::ErrorKind;

#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Failed to decode audio: {0}")]
    Decode(String),
    #[error("Audio device error: {0}")]
    Device(String),
    #[error("Audio stream error: {0}")]
    Stream(String),
}

impl PlaybackError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::PlaybackFailure
    }
}

/// The local speaker when the binary is built with `playback`.
#[cfg(feature = "playback")]
pub fn default_speaker() -> Option<std::sync::Arc<dyn Speaker>> {
    Some(std::sync::Arc::new(AudioPlayer::new(CpalBackend)))
}

#[cfg(not(feature = "playback"))]
pub fn default_speaker() -> Option<std::sync::Arc<dyn Speaker>> {
    log::warn!("Built without the `playback` feature; local audio output is unavailable");
    None
}
